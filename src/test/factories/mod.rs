//! Builders for synthetic archives, objects and COM objects.

pub mod archive;
pub mod coff;
pub mod com;

pub use archive::*;
pub use coff::*;
