//! Joining interface signatures with static symbol data into vtable layouts.
//!
//! [`InterfaceLinker::link`] expands the base chain of an interface, numbers every method
//! root-first in declaration order and, for diagnostics, looks for the static symbol
//! implementing each method in the given [`SymbolSource`]s. Import library symbols follow
//! MIDL's proxy naming (`IFoo_Bar`, `IFoo_Bar_Proxy`) and, on x86, `__stdcall` decoration
//! (`_IFoo_Bar@12`).
//!
//! Layouts are immutable and shared; the linker caches them by interface name.
//!
//! # Usage Examples
//!
//! ```rust
//! use comlink::{
//!     interface::{InterfaceSignature, MethodSignature, SignatureSet},
//!     linker::InterfaceLinker,
//! };
//!
//! let mut set = SignatureSet::with_builtins();
//! set.insert(
//!     InterfaceSignature::builder("IFoo")
//!         .base("IUnknown")
//!         .method(MethodSignature::new("Bar"))
//!         .build()?,
//! );
//!
//! let linker = InterfaceLinker::new(set);
//! let layout = linker.link("IFoo", &[])?;
//! assert_eq!(layout.find("Bar").map(|slot| slot.index), Some(3));
//! # Ok::<(), comlink::Error>(())
//! ```

mod layout;
mod source;

use std::{collections::HashSet, sync::Arc};

use dashmap::DashMap;
use tracing::{debug, trace};

pub use layout::{Slot, StaticSymbol, VTableLayout};
pub use source::SymbolSource;

use crate::{
    interface::{CallingConvention, InterfaceSignature, MethodSignature, SignatureSet},
    Error, Result,
};

/// Builds and caches [`VTableLayout`]s from a [`SignatureSet`].
///
/// The linker is `Send + Sync`; concurrent `link` calls for the same interface may both
/// compute the layout, the first inserted one is kept.
#[derive(Debug, Default)]
pub struct InterfaceLinker {
    signatures: SignatureSet,
    cache: DashMap<String, Arc<VTableLayout>>,
}

impl InterfaceLinker {
    /// Create a linker over `signatures`.
    #[must_use]
    pub fn new(signatures: SignatureSet) -> Self {
        InterfaceLinker {
            signatures,
            cache: DashMap::new(),
        }
    }

    /// The signatures this linker resolves against.
    #[must_use]
    pub fn signatures(&self) -> &SignatureSet {
        &self.signatures
    }

    /// The layout of `interface`, from the cache if it was linked before.
    ///
    /// The cache is keyed by name only; `sources` are consulted on the first call.
    ///
    /// # Errors
    /// Returns [`Error::UnresolvedInterface`] if the interface or one of its bases is not
    /// in the signature set, and [`Error::InheritanceCycle`] if the base chain loops.
    pub fn link(
        &self,
        interface: &str,
        sources: &[&dyn SymbolSource],
    ) -> Result<Arc<VTableLayout>> {
        if let Some(layout) = self.cache.get(interface) {
            trace!(interface, "layout cache hit");
            return Ok(Arc::clone(layout.value()));
        }

        let layout = Arc::new(self.link_uncached(interface, sources)?);
        let entry = self
            .cache
            .entry(interface.to_string())
            .or_insert(layout);
        Ok(Arc::clone(entry.value()))
    }

    /// Compute the layout of `interface` without touching the cache.
    ///
    /// # Errors
    /// See [`InterfaceLinker::link`].
    pub fn link_uncached(
        &self,
        interface: &str,
        sources: &[&dyn SymbolSource],
    ) -> Result<VTableLayout> {
        let chain = self.chain(interface)?;

        let mut slots = Vec::new();
        for signature in &chain {
            for method in &signature.methods {
                let symbol = find_symbol(&signature.name, method, sources);
                slots.push(Slot {
                    index: slots.len(),
                    interface: signature.name.clone(),
                    signature: method.clone(),
                    symbol,
                });
            }
        }

        let iid = chain.last().and_then(|signature| signature.iid);
        debug!(
            interface,
            depth = chain.len(),
            slots = slots.len(),
            resolved = slots.iter().filter(|slot| slot.symbol.is_some()).count(),
            "linked interface"
        );

        Ok(VTableLayout {
            interface: interface.to_string(),
            iid,
            chain: chain.iter().map(|signature| signature.name.clone()).collect(),
            slots,
        })
    }

    /// Drop all cached layouts.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of cached layouts.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// The signatures from the root down to `interface`.
    fn chain(&self, interface: &str) -> Result<Vec<Arc<InterfaceSignature>>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = interface;

        loop {
            if !seen.insert(current) {
                return Err(Error::InheritanceCycle(current.to_string()));
            }

            let Some(signature) = self.signatures.get(current) else {
                return Err(Error::UnresolvedInterface {
                    interface: interface.to_string(),
                    missing: current.to_string(),
                });
            };
            chain.push(Arc::clone(signature));

            match &signature.base {
                Some(base) => current = base.as_str(),
                None => break,
            }
        }

        chain.reverse();
        Ok(chain)
    }
}

/// Symbol names a method implementation may be published under.
#[must_use]
pub fn candidate_symbols(interface: &str, method: &MethodSignature) -> Vec<String> {
    let base = format!("{interface}_{}", method.name);
    let mut names = vec![base.clone(), format!("{base}_Proxy")];

    if method.convention == CallingConvention::Stdcall {
        // `this` plus the arguments, 4-byte stack slots
        let bytes = 4 * (1 + method.argument_words(4));
        names.push(format!("_{base}@{bytes}"));
        names.push(format!("_{base}_Proxy@{bytes}"));
    }

    names
}

fn find_symbol(
    interface: &str,
    method: &MethodSignature,
    sources: &[&dyn SymbolSource],
) -> Option<StaticSymbol> {
    if sources.is_empty() {
        return None;
    }

    let candidates = candidate_symbols(interface, method);
    let found = sources.iter().find_map(|source| {
        candidates
            .iter()
            .find_map(|candidate| source.resolve(candidate))
    });

    match &found {
        Some(symbol) => trace!(interface, method = %method.name, symbol = symbol.symbol(), "static symbol"),
        None => trace!(interface, method = %method.name, "no static symbol"),
    }
    found
}
