//! Low-level byte order and safe reading utilities for archive and COFF parsing.
//!
//! This module provides endian-aware, bounds-checked reads of primitive types from byte
//! buffers. Archive linker members store their offsets big-endian, everything inside a COFF
//! object is little-endian, so both directions are exposed.
//!
//! # Key Components
//!
//! - [`crate::file::io::ByteIO`] - Trait defining endian-aware conversion for primitive types
//! - [`crate::file::io::read_le`] / [`crate::file::io::read_le_at`] - Little-endian reads
//! - [`crate::file::io::read_be`] / [`crate::file::io::read_be_at`] - Big-endian reads
//!
//! # Usage Examples
//!
//! ```rust
//! use comlink::{read_be, read_le_at};
//!
//! // The symbol count of a first linker member
//! let data = [0x00, 0x00, 0x00, 0x02];
//! let count: u32 = read_be(&data)?;
//! assert_eq!(count, 2);
//!
//! // Sequential COFF header fields
//! let data = [0x64, 0x86, 0x03, 0x00];
//! let mut offset = 0;
//! let machine: u16 = read_le_at(&data, &mut offset)?;
//! let sections: u16 = read_le_at(&data, &mut offset)?;
//! assert_eq!((machine, sections, offset), (0x8664, 3, 4));
//! # Ok::<(), comlink::Error>(())
//! ```
//!
//! # Error Handling
//!
//! All functions return [`crate::Error::OutOfBounds`] carrying the offset and width of
//! the failed read when the buffer is too short.
//!
//! # Thread Safety
//!
//! All functions are pure operations over borrowed slices and are safe to call
//! concurrently.

use crate::Result;

/// Trait for type-specific safe binary data reading operations.
///
/// Each implementation names the fixed-size byte array of the type (e.g. `[u8; 4]` for
/// `u32`) and converts it in either byte order.
pub trait ByteIO: Sized {
    /// Fixed-size byte array representing this type.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Read `Self` from little-endian bytes.
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Read `Self` from big-endian bytes.
    fn from_be_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_byte_io {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ByteIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }
            }
        )*
    };
}

impl_byte_io!(u8, i8, u16, i16, u32, i32, u64, i64, usize, isize, f32, f64);

/// Safely reads a value of type `T` in little-endian byte order from the start of a buffer.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer is shorter than `T`.
pub fn read_le<T: ByteIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a little-endian value at `offset`, advancing the offset past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the read would cross the end of the buffer.
pub fn read_le_at<T: ByteIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let bytes = take::<T>(data, offset)?;
    Ok(T::from_le_bytes(bytes))
}

/// Safely reads a value of type `T` in big-endian byte order from the start of a buffer.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer is shorter than `T`.
pub fn read_be<T: ByteIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_be_at(data, &mut offset)
}

/// Safely reads a big-endian value at `offset`, advancing the offset past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the read would cross the end of the buffer.
pub fn read_be_at<T: ByteIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let bytes = take::<T>(data, offset)?;
    Ok(T::from_be_bytes(bytes))
}

fn take<T: ByteIO>(data: &[u8], offset: &mut usize) -> Result<T::Bytes> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(out_of_bounds_error!(*offset, type_len));
    };
    if end > data.len() {
        return Err(out_of_bounds_error!(*offset, type_len));
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(out_of_bounds_error!(*offset, type_len));
    };

    *offset = end;
    Ok(read)
}
