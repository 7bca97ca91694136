//! `HRESULT` status codes.

use std::fmt;

/// A COM `HRESULT`: negative values are failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hresult(pub i32);

impl Hresult {
    /// Success
    pub const S_OK: Hresult = Hresult(0);
    /// Success, with a false result
    pub const S_FALSE: Hresult = Hresult(1);
    /// Not implemented
    pub const E_NOTIMPL: Hresult = Hresult(0x8000_4001_u32 as i32);
    /// Interface not supported
    pub const E_NOINTERFACE: Hresult = Hresult(0x8000_4002_u32 as i32);
    /// Invalid pointer
    pub const E_POINTER: Hresult = Hresult(0x8000_4003_u32 as i32);
    /// Unspecified failure
    pub const E_FAIL: Hresult = Hresult(0x8000_4005_u32 as i32);
    /// Catastrophic failure
    pub const E_UNEXPECTED: Hresult = Hresult(0x8000_FFFF_u32 as i32);
    /// One or more arguments are invalid
    pub const E_INVALIDARG: Hresult = Hresult(0x8007_0057_u32 as i32);
    /// Out of memory
    pub const E_OUTOFMEMORY: Hresult = Hresult(0x8007_000E_u32 as i32);

    /// Returns `true` for success codes (`SUCCEEDED`).
    #[must_use]
    pub fn is_success(self) -> bool {
        self.0 >= 0
    }

    /// Returns `true` for failure codes (`FAILED`).
    #[must_use]
    pub fn is_failure(self) -> bool {
        self.0 < 0
    }

    /// The facility field, bits 16-26.
    #[must_use]
    pub fn facility(self) -> u16 {
        ((self.0 as u32 >> 16) & 0x1FFF) as u16
    }

    /// The code field, bits 0-15.
    #[must_use]
    pub fn code(self) -> u16 {
        (self.0 as u32 & 0xFFFF) as u16
    }
}

impl fmt::Display for Hresult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0 as u32)
    }
}

impl From<i32> for Hresult {
    fn from(value: i32) -> Self {
        Hresult(value)
    }
}
