//! Where the linker looks up static symbols.

use tracing::warn;

use crate::{
    archive::{Archive, Library},
    coff::{CoffObject, ObjectFile, SymbolFacts},
    linker::layout::StaticSymbol,
};

/// Something that can say whether it defines a symbol.
///
/// Implemented for archives (lookup through the symbol index, member parsed on demand),
/// owned libraries and single objects.
pub trait SymbolSource {
    /// Describe the definition of `symbol`, `None` if absent or not a function.
    fn resolve(&self, symbol: &str) -> Option<StaticSymbol>;
}

fn from_facts(symbol: &str, member: Option<&str>, facts: SymbolFacts<'_>) -> Option<StaticSymbol> {
    match facts {
        SymbolFacts::Code { section, offset } => Some(StaticSymbol::Code {
            symbol: symbol.to_string(),
            member: member.map(str::to_string),
            section,
            offset,
        }),
        SymbolFacts::Import { dll, .. } => Some(StaticSymbol::Import {
            symbol: symbol.to_string(),
            member: member.map(str::to_string),
            dll: dll.map(str::to_string),
        }),
        SymbolFacts::Data { .. } => None,
    }
}

impl SymbolSource for Archive<'_> {
    fn resolve(&self, symbol: &str) -> Option<StaticSymbol> {
        let member = self.member_for_symbol(symbol)?;
        let object = match member.parse() {
            Ok(object) => object,
            Err(error) => {
                warn!(member = member.name, offset = member.offset, %error, "member does not parse");
                return None;
            }
        };

        let facts = object.lookup(symbol)?;
        from_facts(symbol, Some(member.name), facts)
    }
}

impl SymbolSource for Library {
    fn resolve(&self, symbol: &str) -> Option<StaticSymbol> {
        self.archive().resolve(symbol)
    }
}

impl SymbolSource for ObjectFile<'_> {
    fn resolve(&self, symbol: &str) -> Option<StaticSymbol> {
        from_facts(symbol, None, self.lookup(symbol)?)
    }
}

impl SymbolSource for CoffObject<'_> {
    fn resolve(&self, symbol: &str) -> Option<StaticSymbol> {
        from_facts(symbol, None, self.lookup(symbol)?)
    }
}
