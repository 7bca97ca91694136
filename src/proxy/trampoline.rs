//! Calling a raw vtable entry with a word-sized argument list.
//!
//! Every argument travels as one `usize`; the interface pointer comes first. The callee is
//! typed by the register class of its declared return, and the result is widened to a
//! `u64` that `marshal::decode` narrows again.

use std::ffi::c_void;

use crate::{
    interface::{CallingConvention, MarshalType},
    proxy::marshal::MAX_WORDS,
    Error, Result,
};

/// Integer register class a native return value comes back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReturnWidth {
    Void,
    Byte,
    Half,
    Word,
    Double,
    Address,
}

impl ReturnWidth {
    /// The class of `ty`, `None` for kinds returned outside the integer registers.
    pub(crate) fn of(ty: MarshalType) -> Option<Self> {
        match ty {
            MarshalType::Void => Some(ReturnWidth::Void),
            MarshalType::I8 | MarshalType::U8 => Some(ReturnWidth::Byte),
            MarshalType::VariantBool | MarshalType::I16 | MarshalType::U16 => {
                Some(ReturnWidth::Half)
            }
            MarshalType::Bool | MarshalType::I32 | MarshalType::U32 | MarshalType::HResult => {
                Some(ReturnWidth::Word)
            }
            MarshalType::I64 | MarshalType::U64 => Some(ReturnWidth::Double),
            MarshalType::Pointer | MarshalType::WideString | MarshalType::Interface => {
                Some(ReturnWidth::Address)
            }
            MarshalType::F32 | MarshalType::F64 | MarshalType::Guid => None,
        }
    }
}

macro_rules! word {
    ($index:literal) => {
        usize
    };
}

macro_rules! arity {
    ($abi:literal, $ret:ty, $function:ident, $this:ident, $args:ident, [$($index:literal),*]) => {{
        let target: unsafe extern $abi fn(usize $(, word!($index))*) -> $ret =
            unsafe { std::mem::transmute($function) };
        unsafe { target($this $(, $args[$index])*) }
    }};
}

macro_rules! arities {
    ($abi:literal, $ret:ty, $function:ident, $this:ident, $args:ident) => {
        match $args.len() {
            0 => arity!($abi, $ret, $function, $this, $args, []),
            1 => arity!($abi, $ret, $function, $this, $args, [0]),
            2 => arity!($abi, $ret, $function, $this, $args, [0, 1]),
            3 => arity!($abi, $ret, $function, $this, $args, [0, 1, 2]),
            4 => arity!($abi, $ret, $function, $this, $args, [0, 1, 2, 3]),
            5 => arity!($abi, $ret, $function, $this, $args, [0, 1, 2, 3, 4]),
            6 => arity!($abi, $ret, $function, $this, $args, [0, 1, 2, 3, 4, 5]),
            7 => arity!($abi, $ret, $function, $this, $args, [0, 1, 2, 3, 4, 5, 6]),
            8 => arity!($abi, $ret, $function, $this, $args, [0, 1, 2, 3, 4, 5, 6, 7]),
            9 => arity!($abi, $ret, $function, $this, $args, [0, 1, 2, 3, 4, 5, 6, 7, 8]),
            10 => arity!($abi, $ret, $function, $this, $args, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9]),
            11 => arity!($abi, $ret, $function, $this, $args, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10]),
            _ => arity!($abi, $ret, $function, $this, $args, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]),
        }
    };
}

macro_rules! trampoline {
    ($name:ident, $abi:literal) => {
        /// # Safety
        /// `function` must point to a function of this ABI taking `this` and exactly
        /// `args.len()` word arguments, returning a value of class `ret`.
        unsafe fn $name(
            ret: ReturnWidth,
            function: *const c_void,
            this: usize,
            args: &[usize],
        ) -> u64 {
            match ret {
                ReturnWidth::Void => {
                    arities!($abi, (), function, this, args);
                    0
                }
                ReturnWidth::Byte => u64::from(arities!($abi, u8, function, this, args)),
                ReturnWidth::Half => u64::from(arities!($abi, u16, function, this, args)),
                ReturnWidth::Word => u64::from(arities!($abi, u32, function, this, args)),
                ReturnWidth::Double => arities!($abi, u64, function, this, args),
                ReturnWidth::Address => arities!($abi, usize, function, this, args) as u64,
            }
        }
    };
}

trampoline!(call_system, "system");
trampoline!(call_c, "C");
#[cfg(target_arch = "x86")]
trampoline!(call_thiscall, "thiscall");

/// Invoke `function` with `this` and `args` using `convention`, reading a `ret` result.
///
/// # Safety
/// `function` must be a live function pointer whose real signature takes `this` followed
/// by exactly `args.len()` word arguments under `convention` and returns a `ret`, and every
/// pointer word must be valid for the accesses the callee performs.
///
/// # Errors
/// Returns [`Error::NotSupported`] for more than twelve argument words, and for float or
/// GUID returns.
pub(crate) unsafe fn call(
    convention: CallingConvention,
    ret: MarshalType,
    function: *const c_void,
    this: usize,
    args: &[usize],
) -> Result<u64> {
    if args.len() > MAX_WORDS {
        return Err(Error::NotSupported(format!(
            "{} argument words, at most {MAX_WORDS} can be forwarded",
            args.len()
        )));
    }
    let Some(width) = ReturnWidth::of(ret) else {
        return Err(Error::NotSupported(format!("{ret} return by value")));
    };

    let raw = unsafe {
        match convention {
            CallingConvention::Stdcall => call_system(width, function, this, args),
            CallingConvention::Cdecl => call_c(width, function, this, args),
            #[cfg(target_arch = "x86")]
            CallingConvention::Thiscall => call_thiscall(width, function, this, args),
            #[cfg(not(target_arch = "x86"))]
            CallingConvention::Thiscall => call_system(width, function, this, args),
        }
    };
    Ok(raw)
}
