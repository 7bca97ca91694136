//! The linked vtable layout of an interface.

use uguid::Guid;

use crate::interface::MethodSignature;

/// What the static libraries say about the symbol behind a slot.
///
/// This is diagnostic information; the address a proxy calls is always read from the live
/// vtable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaticSymbol {
    /// A defined code symbol in a COFF object
    Code {
        /// The matching symbol name
        symbol: String,
        /// Archive member defining it, if the source is an archive
        member: Option<String>,
        /// One-based section number
        section: u16,
        /// Offset within the section
        offset: u32,
    },
    /// Published by an import record or descriptor, resolved by the runtime loader
    Import {
        /// The matching symbol name
        symbol: String,
        /// Archive member publishing it, if the source is an archive
        member: Option<String>,
        /// DLL exporting it, when the import record names one
        dll: Option<String>,
    },
}

impl StaticSymbol {
    /// The symbol name that matched.
    #[must_use]
    pub fn symbol(&self) -> &str {
        match self {
            StaticSymbol::Code { symbol, .. } | StaticSymbol::Import { symbol, .. } => symbol,
        }
    }

    /// Returns `true` if the symbol is resolved at load time rather than statically.
    #[must_use]
    pub fn is_import(&self) -> bool {
        matches!(self, StaticSymbol::Import { .. })
    }
}

/// One vtable entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    /// Zero-based vtable index
    pub index: usize,
    /// The interface in the chain that declares the method
    pub interface: String,
    /// The method signature
    pub signature: MethodSignature,
    /// Static symbol backing the method, if one was found
    pub symbol: Option<StaticSymbol>,
}

impl Slot {
    /// The method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.signature.name
    }
}

/// The complete, ordered vtable of an interface, base methods first.
///
/// Slot indices are `0..slots.len()` without gaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VTableLayout {
    /// The most derived interface
    pub interface: String,
    /// Its IID
    pub iid: Option<Guid>,
    /// Interface names from the root down to `interface`
    pub chain: Vec<String>,
    /// All slots in vtable order
    pub slots: Vec<Slot>,
}

impl VTableLayout {
    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if there are no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The slot at `index`.
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// Find a slot by method name.
    ///
    /// `Interface::Method` selects the method declared by a specific interface of the
    /// chain; a bare name picks the most derived declaration.
    #[must_use]
    pub fn find(&self, method: &str) -> Option<&Slot> {
        match method.split_once("::") {
            Some((interface, name)) => self
                .slots
                .iter()
                .find(|slot| slot.interface == interface && slot.name() == name),
            None => self.slots.iter().rev().find(|slot| slot.name() == method),
        }
    }

    /// Returns `true` if `interface` is part of the chain.
    #[must_use]
    pub fn derives_from(&self, interface: &str) -> bool {
        self.chain.iter().any(|name| name == interface)
    }
}
