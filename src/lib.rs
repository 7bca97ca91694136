// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
// unsafe is used in:
// - 'file/physical.rs' uses mmap to map a file into memory
// - 'proxy/trampoline.rs' transmutes vtable entries into function pointers

//! # comlink
//!
//! Bind to COM interfaces from Rust without generated bindings: read the static import
//! libraries (`.lib`) that publish interface symbols, parse the COFF objects inside them,
//! join the symbols with interface descriptions into vtable layouts, and call methods of
//! live objects through their vtable.
//!
//! ## Features
//!
//! - **📦 Zero-copy parsing** - Archives and objects borrow from one buffer or memory-mapped file
//! - **🔍 MS archive index** - First and second linker members, long names, short import records
//! - **🧩 COFF objects** - Sections, relocations, symbols with lazily resolved names
//! - **🔗 Layout linking** - Base chains expanded root-first, cached per interface
//! - **📞 Dynamic dispatch** - One trampoline for every method, typed marshaling per parameter
//!
//! ## Pipeline
//!
//! ```text
//! .lib bytes -> ArchiveReader -> Archive -> Member::parse -> CoffObject / ImportObject
//!                                                 |
//!          InterfaceSignature --> InterfaceLinker -> VTableLayout
//!                                                 |
//!                      live vtable --> ProxyBuilder -> InterfaceProxy::invoke
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use comlink::prelude::*;
//! use std::path::Path;
//!
//! let library = ArchiveReader::default().read_file(Path::new("ole32.lib"))?;
//! let archive = library.archive();
//! println!("{} members, {} symbols", archive.members().len(), archive.symbol_member_map().len());
//!
//! if let Some(member) = archive.member_for_symbol("IUnknown_QueryInterface_Proxy") {
//!     println!("defined in {}", member.name);
//! }
//!
//! let linker = InterfaceLinker::new(SignatureSet::with_builtins());
//! let layout = linker.link("IClassFactory", &[archive])?;
//! for slot in &layout.slots {
//!     println!("{:2} {}::{}", slot.index, slot.interface, slot.name());
//! }
//! # Ok::<(), comlink::Error>(())
//! ```
//!
//! ## Calling a live object
//!
//! ```rust,no_run
//! use comlink::prelude::*;
//! use std::ffi::c_void;
//!
//! # fn obtain() -> *mut c_void { std::ptr::null_mut() }
//! let linker = InterfaceLinker::new(SignatureSet::with_builtins());
//! let layout = linker.link("IUnknown", &[])?;
//!
//! // From CoCreateInstance or another factory; the caller owns the reference.
//! let object: *mut c_void = obtain();
//! let raw = unsafe { RawInterface::from_interface_ptr(object) }
//!     .ok_or(Error::NotSupported("null interface pointer".to_string()))?;
//! let proxy = ProxyBuilder::build(raw, layout)?;
//!
//! let count = unsafe { proxy.invoke("AddRef", &[]) }?;
//! println!("refcount {:?}", count.value);
//! # Ok::<(), comlink::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`] with [`Error`]. Format errors carry the
//! offending offset or name; invocation failures carry the raw [`proxy::Hresult`].

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use comlink::prelude::*;
///
/// let library = ArchiveReader::new(ArchiveConfig::strict())
///     .read_file(std::path::Path::new("uuid.lib"))?;
/// println!("{} members", library.archive().members().len());
/// # Ok::<(), comlink::Error>(())
/// ```
pub mod prelude;

/// MS `ar` archives (`.lib`), their linker members and symbol index
///
/// See [`archive::ArchiveReader`] for the entry point.
pub mod archive;

/// COFF objects and short import records found inside archives
pub mod coff;

/// Configuration of archive parsing
pub mod config;

/// Interface descriptions: method signatures in vtable order
pub mod interface;

/// Joining signatures with static symbols into vtable layouts
pub mod linker;

/// Dispatching calls through the vtable of a live object
pub mod proxy;

/// `comlink` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `comlink` Error type
///
/// The main error type for all operations in this crate, grouped into format, linking and
/// invocation errors.
pub use error::Error;

/// Parsing presets, see [`config::ArchiveConfig`]
pub use config::ArchiveConfig;

/// Low-level byte access: the cursor parser and the endian helpers it reads with.
pub use file::{
    io::{read_be, read_be_at, read_le, read_le_at, ByteIO},
    parser::Parser,
    Backend,
};
