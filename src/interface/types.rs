//! Parameter kinds, directions and calling conventions of interface methods.

use strum::{Display, EnumString};

/// The marshaling kind of a parameter or return value.
///
/// Every kind travels in one machine word, except 64-bit scalars on 32-bit targets which
/// take two. `Guid` is always passed by reference, `WideString` as a pointer to a
/// NUL-terminated UTF-16 buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum MarshalType {
    /// No value, only valid as a return type
    Void,
    /// Win32 `BOOL`, 4 bytes, non-zero is true
    Bool,
    /// `VARIANT_BOOL`, 2 bytes, `-1` is true
    VariantBool,
    /// Signed 8-bit integer
    I8,
    /// Unsigned 8-bit integer
    U8,
    /// Signed 16-bit integer
    I16,
    /// Unsigned 16-bit integer
    U16,
    /// Signed 32-bit integer
    I32,
    /// Unsigned 32-bit integer
    U32,
    /// Signed 64-bit integer
    I64,
    /// Unsigned 64-bit integer
    U64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// `HRESULT` status code
    HResult,
    /// Opaque pointer-sized value
    Pointer,
    /// `LPCWSTR` / `BSTR` contents
    WideString,
    /// `REFGUID`, passed by reference
    Guid,
    /// An interface pointer
    Interface,
}

impl MarshalType {
    /// Stack words the value occupies when passed by value on a target with
    /// `pointer_size`-byte words.
    #[must_use]
    pub fn words(self, pointer_size: usize) -> usize {
        match self {
            MarshalType::Void => 0,
            MarshalType::I64 | MarshalType::U64 | MarshalType::F64 if pointer_size < 8 => 2,
            _ => 1,
        }
    }

    /// Returns `true` for `F32` and `F64`.
    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, MarshalType::F32 | MarshalType::F64)
    }
}

/// Data flow direction of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum Direction {
    /// Passed by value (or by reference for `Guid` and `WideString`), not written back
    In,
    /// Caller supplies storage, callee writes it
    Out,
    /// Caller initialises storage, callee may overwrite it
    InOut,
}

impl Direction {
    /// Returns `true` if the caller supplies a value for this parameter.
    #[must_use]
    pub fn takes_input(self) -> bool {
        matches!(self, Direction::In | Direction::InOut)
    }

    /// Returns `true` if the callee writes a value back.
    #[must_use]
    pub fn produces_output(self) -> bool {
        matches!(self, Direction::Out | Direction::InOut)
    }
}

/// Calling convention of a method.
///
/// Every COM method receives the interface pointer as its first argument. On 64-bit and
/// ARM targets all three conventions collapse into the platform convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
pub enum CallingConvention {
    /// `__stdcall`, callee cleans the stack; the COM default (`STDMETHODCALLTYPE`)
    #[default]
    Stdcall,
    /// `__cdecl`, caller cleans the stack; used by vararg methods
    Cdecl,
    /// `__thiscall`, `this` in `ecx` on x86
    Thiscall,
}
