//! # comlink Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the comlink library. Import this module to get quick access to the types needed
//! to read import libraries, link interface layouts and call through proxies.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all comlink operations
pub use crate::Error;

/// The result type used throughout comlink
pub use crate::Result;

/// Configuration for archive parsing
pub use crate::ArchiveConfig;

/// Low-level byte access
pub use crate::Parser;

// ================================================================================================
// Archives
// ================================================================================================

/// Archive entry points
pub use crate::archive::{Archive, ArchiveReader, Library};

/// Archive members and the symbol index
pub use crate::archive::{Member, MemberKind, SymbolMemberMap};

// ================================================================================================
// COFF Objects
// ================================================================================================

/// Parsed members
pub use crate::coff::{CoffObject, ImportObject, ObjectFile, ObjectKind, SymbolFacts};

/// Object tables
pub use crate::coff::{Machine, Section, SectionNumber, StorageClass, Symbol};

// ================================================================================================
// Interfaces and Layouts
// ================================================================================================

/// Interface descriptions
pub use crate::interface::{
    CallingConvention, Direction, InterfaceSignature, MarshalType, MethodSignature,
    SignatureProvider, SignatureSet,
};

/// Linking
pub use crate::linker::{InterfaceLinker, Slot, StaticSymbol, SymbolSource, VTableLayout};

// ================================================================================================
// Proxies
// ================================================================================================

/// Dispatch through live vtables
pub use crate::proxy::{CallOutcome, Hresult, InterfaceProxy, ProxyBuilder, RawInterface, Value};
