//! Interface descriptions: ordered method signatures per interface.
//!
//! Signatures come from an external IDL front end, either built directly with
//! [`InterfaceSignature::builder`] or handed over through a [`SignatureProvider`]. Each
//! interface lists only the methods it declares itself, in vtable order, and names its
//! base; the [`crate::linker`] expands the chain.
//!
//! # Key Components
//!
//! - [`MarshalType`], [`Direction`], [`CallingConvention`] - per-parameter and per-method
//!   dispatch metadata
//! - [`ParameterSpec`], [`MethodSignature`], [`InterfaceSignature`] - the description itself
//! - [`SignatureSet`] - the name keyed collection the linker reads, `IUnknown` and
//!   `IClassFactory` built in

mod set;
mod signature;
mod types;

pub use set::{SignatureProvider, SignatureSet, IID_ICLASSFACTORY, IID_IUNKNOWN};
pub use signature::{InterfaceBuilder, InterfaceSignature, MethodSignature, ParameterSpec};
pub use types::{CallingConvention, Direction, MarshalType};
