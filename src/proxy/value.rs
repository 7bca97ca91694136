//! Values passed to and returned from proxied calls.

use strum::IntoStaticStr;
use uguid::Guid;
use widestring::U16CString;

use crate::proxy::Hresult;

/// A dynamically typed argument or result.
///
/// Arguments must match the [`crate::interface::MarshalType`] of their parameter:
/// `Bool` serves both `Bool` and `VariantBool`, `Ptr` is accepted wherever a raw pointer
/// travels (`Pointer`, `Interface`, a pre-built `WideString`).
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
pub enum Value {
    /// No value
    Void,
    /// `BOOL` or `VARIANT_BOOL`
    Bool(bool),
    /// 8-bit signed
    I8(i8),
    /// 8-bit unsigned
    U8(u8),
    /// 16-bit signed
    I16(i16),
    /// 16-bit unsigned
    U16(u16),
    /// 32-bit signed
    I32(i32),
    /// 32-bit unsigned
    U32(u32),
    /// 64-bit signed
    I64(i64),
    /// 64-bit unsigned
    U64(u64),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
    /// Status code
    HResult(Hresult),
    /// Raw pointer value
    Ptr(usize),
    /// Wide string, passed as a pointer to its NUL-terminated buffer
    WideStr(U16CString),
    /// GUID, passed by reference
    Guid(Guid),
    /// Interface pointer
    Interface(usize),
}

impl Value {
    /// A wide string argument, `None` if `text` contains a NUL.
    #[must_use]
    pub fn wide(text: &str) -> Option<Value> {
        U16CString::from_str(text).ok().map(Value::WideStr)
    }

    /// Variant name, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// The value as `u32`, for any unsigned integer variant that fits.
    #[must_use]
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Value::U8(value) => Some(u32::from(value)),
            Value::U16(value) => Some(u32::from(value)),
            Value::U32(value) => Some(value),
            Value::U64(value) => u32::try_from(value).ok(),
            _ => None,
        }
    }

    /// The value as `i64`, for any integer variant that fits.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I8(value) => Some(i64::from(value)),
            Value::U8(value) => Some(i64::from(value)),
            Value::I16(value) => Some(i64::from(value)),
            Value::U16(value) => Some(i64::from(value)),
            Value::I32(value) => Some(i64::from(value)),
            Value::U32(value) => Some(i64::from(value)),
            Value::I64(value) => Some(value),
            Value::U64(value) => i64::try_from(value).ok(),
            _ => None,
        }
    }

    /// The value as a raw address, for `Ptr` and `Interface`.
    #[must_use]
    pub fn as_address(&self) -> Option<usize> {
        match *self {
            Value::Ptr(address) | Value::Interface(address) => Some(address),
            _ => None,
        }
    }

    /// The GUID, for `Guid`.
    #[must_use]
    pub fn as_guid(&self) -> Option<Guid> {
        match *self {
            Value::Guid(guid) => Some(guid),
            _ => None,
        }
    }

    /// The flag, for `Bool`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(flag) => Some(flag),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Hresult => HResult,
    U16CString => WideStr,
    Guid => Guid,
}

/// The result of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    /// The returned status, for methods returning `HRESULT`
    pub status: Option<Hresult>,
    /// The native return value
    pub value: Value,
    /// Out and in-out parameters by name, in declaration order
    pub outputs: Vec<(String, Value)>,
    pub(crate) retval: Option<usize>,
}

impl CallOutcome {
    /// The output written to parameter `name`.
    #[must_use]
    pub fn output(&self, name: &str) -> Option<&Value> {
        self.outputs
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, value)| value)
    }

    /// The logical result: the `[retval]` output if the method declares one, otherwise
    /// the native return value.
    #[must_use]
    pub fn retval(&self) -> &Value {
        self.retval
            .and_then(|index| self.outputs.get(index))
            .map_or(&self.value, |(_, value)| value)
    }
}
