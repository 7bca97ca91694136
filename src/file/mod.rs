//! Input data sources and low-level byte parsing.
//!
//! Import libraries and object files reach the parser either from disk or from a buffer
//! already in memory. This module abstracts over both through the
//! [`crate::file::Backend`] trait and provides the byte-level reading primitives every
//! other stage builds on.
//!
//! # Key Components
//!
//! - [`crate::file::Backend`] - Trait for different data sources (disk files, memory buffers)
//! - [`crate::file::parser::Parser`] - Cursor-based reader for headers and tables
//! - [`crate::file::io`] - Endian-aware primitive reads
//!
//! ## Backend Implementations
//! - `Physical` - Memory-mapped file backend for disk access (`memmap2`)
//! - `Memory` - In-memory buffer backend
//!
//! # Thread Safety
//!
//! Backends are immutable once created and are `Send + Sync`, so the archives borrowing
//! from them can be parsed from several threads at once.

pub mod io;
pub mod parser;

mod memory;
mod physical;

use std::path::Path;

use crate::{Error::Empty, Result};

pub(crate) use memory::Memory;
pub(crate) use physical::Physical;

/// Backend trait for file data sources.
///
/// This trait abstracts over the source of archive or object data, allowing for both
/// in-memory and on-disk representations. All implementations must be thread-safe.
pub trait Backend: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;
}

/// Memory-map the file at `path` as a non-empty backend.
pub(crate) fn open(path: &Path) -> Result<Box<dyn Backend>> {
    let physical = Physical::new(path)?;
    non_empty(physical)
}

/// Wrap an owned buffer as a non-empty backend.
pub(crate) fn from_mem(data: Vec<u8>) -> Result<Box<dyn Backend>> {
    non_empty(Memory::new(data))
}

fn non_empty<T: Backend + 'static>(backend: T) -> Result<Box<dyn Backend>> {
    if backend.len() == 0 {
        return Err(Empty);
    }

    Ok(Box::new(backend))
}

/// Bounds-checked slice shared by both backends.
fn checked_slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    let Some(offset_end) = offset.checked_add(len) else {
        return Err(out_of_bounds_error!(offset, len));
    };

    if offset_end > data.len() {
        return Err(out_of_bounds_error!(offset, len));
    }

    Ok(&data[offset..offset_end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_rejected() {
        assert!(matches!(from_mem(Vec::new()), Err(Empty)));
        assert_eq!(from_mem(vec![1, 2, 3]).unwrap().len(), 3);
    }
}
