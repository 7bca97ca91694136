//! COFF object parsing for archive members.
//!
//! Every regular member of an import library is either a full COFF object (code, data or a
//! long-format import descriptor) or a 20-byte short import record. [`ObjectFile::parse`]
//! tells them apart and hands out the symbol facts the [`crate::linker`] needs.
//!
//! # Architecture
//!
//! - [`header`] - The fixed file header and the machine type
//! - [`section`] - Section table entries, their raw data ([`relocation`] records included)
//! - [`symbol`] - Symbol records, names resolved lazily against the [`strings`] table
//! - [`import`] - Short import objects
//!
//! All structures borrow from the member content; nothing is copied except decoded
//! symbol names.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use comlink::coff::CoffObject;
//!
//! let data = std::fs::read("foo_p.obj")?;
//! let object = CoffObject::parse(&data)?;
//!
//! for symbol in object.symbols().iter().filter(|s| s.is_defined() && s.is_external()) {
//!     println!("{} ({})", symbol.name(), if symbol.is_code() { "code" } else { "data" });
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod header;
pub mod import;
pub mod relocation;
pub mod section;
pub mod strings;
pub mod symbol;

use strum::Display;
use tracing::trace;

pub use header::{CoffHeader, FileCharacteristics, Machine};
pub use import::{ImportNameType, ImportObject, ImportTarget, ImportType, IMPORT_POINTER_PREFIX};
pub use relocation::Relocation;
pub use section::{Section, SectionFlags};
pub use strings::StringTable;
pub use symbol::{SectionNumber, StorageClass, Symbol, SymbolName, SYMBOL_SIZE};

use crate::{file::parser::Parser, Result};

/// Names that only appear inside long-format import descriptor objects.
const IMPORT_DESCRIPTOR_PREFIX: &str = "__IMPORT_DESCRIPTOR_";
const NULL_IMPORT_DESCRIPTOR: &str = "__NULL_IMPORT_DESCRIPTOR";
const NULL_THUNK_DATA_SUFFIX: &str = "_NULL_THUNK_DATA";

/// Returns `true` for the bookkeeping symbols import libraries export for the linker, which
/// never name a callable function.
#[must_use]
pub fn is_import_bookkeeping(name: &str) -> bool {
    name.starts_with(IMPORT_DESCRIPTOR_PREFIX)
        || name == NULL_IMPORT_DESCRIPTOR
        || name.ends_with(NULL_THUNK_DATA_SUFFIX)
}

/// Coarse classification of an archive member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ObjectKind {
    /// An import record or descriptor, resolved by the runtime loader
    ImportDescriptor,
    /// Carries executable code
    Code,
    /// Neither of the above
    Data,
}

/// A parsed full COFF object.
#[derive(Debug, Clone)]
pub struct CoffObject<'a> {
    data: &'a [u8],
    header: CoffHeader,
    sections: Vec<Section<'a>>,
    symbols: Vec<Symbol<'a>>,
    strings: StringTable<'a>,
    kind: ObjectKind,
}

impl<'a> CoffObject<'a> {
    /// Parse a COFF object from its raw bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for truncated headers, section or symbol tables,
    /// string references outside the string table, out of range section numbers and
    /// relocation targets. A short import record is rejected as well; use
    /// [`ObjectFile::parse`] when the member type is unknown.
    pub fn parse(data: &'a [u8]) -> Result<CoffObject<'a>> {
        if ImportObject::is_import(data) {
            return Err(malformed_error!(
                "Short import record is not a COFF object"
            ));
        }

        let mut parser = Parser::new(data);
        let header = CoffHeader::read(&mut parser)?;

        let symbol_count = header.number_of_symbols as usize;
        let (symbol_table, strings) = if header.pointer_to_symbol_table == 0 || symbol_count == 0
        {
            (&[][..], StringTable::default())
        } else {
            let start = header.pointer_to_symbol_table as usize;
            let end = symbol_count
                .checked_mul(SYMBOL_SIZE)
                .and_then(|size| size.checked_add(start))
                .filter(|end| *end <= data.len())
                .ok_or_else(|| {
                    malformed_error!(
                        "Symbol table of {} records at offset {} exceeds object of {} bytes",
                        symbol_count,
                        start,
                        data.len()
                    )
                })?;
            (&data[start..end], StringTable::parse(&data[end..])?)
        };

        let section_table = CoffHeader::SIZE + usize::from(header.size_of_optional_header);
        parser.seek(section_table).map_err(|_| {
            malformed_error!(
                "Optional header of {} bytes exceeds object",
                header.size_of_optional_header
            )
        })?;

        let mut sections = Vec::with_capacity(usize::from(header.number_of_sections));
        for number in 1..=header.number_of_sections {
            sections.push(Section::read(
                &mut parser,
                number,
                &strings,
                header.number_of_symbols,
            )?);
        }

        let code_sections: Vec<bool> = sections.iter().map(Section::is_code).collect();
        let symbols = read_symbols(symbol_table, symbol_count, strings, &code_sections)?;

        let kind = classify(&sections, &symbols);
        trace!(
            machine = %header.machine,
            sections = sections.len(),
            symbols = symbols.len(),
            %kind,
            "parsed COFF object"
        );

        Ok(CoffObject {
            data,
            header,
            sections,
            symbols,
            strings,
            kind,
        })
    }

    /// The raw object bytes.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The file header.
    #[must_use]
    pub fn header(&self) -> &CoffHeader {
        &self.header
    }

    /// Target machine of the object.
    #[must_use]
    pub fn machine(&self) -> Machine {
        self.header.machine
    }

    /// Sections in table order.
    #[must_use]
    pub fn sections(&self) -> &[Section<'a>] {
        &self.sections
    }

    /// The section with the given one-based number.
    #[must_use]
    pub fn section(&self, number: u16) -> Option<&Section<'a>> {
        self.sections.get(usize::from(number).checked_sub(1)?)
    }

    /// Symbols in table order, auxiliary records excluded.
    #[must_use]
    pub fn symbols(&self) -> &[Symbol<'a>] {
        &self.symbols
    }

    /// The symbol at a raw table index (as used by relocations).
    ///
    /// Returns `None` if the index points at an auxiliary record or past the table.
    #[must_use]
    pub fn symbol_at(&self, index: usize) -> Option<&Symbol<'a>> {
        self.symbols
            .binary_search_by_key(&index, |symbol| symbol.index)
            .ok()
            .map(|position| &self.symbols[position])
    }

    /// The first symbol named `name`.
    #[must_use]
    pub fn symbol(&self, name: &str) -> Option<&Symbol<'a>> {
        self.symbols.iter().find(|symbol| symbol.name() == name)
    }

    /// Externally visible symbols defined by this object.
    pub fn exports(&self) -> impl Iterator<Item = &Symbol<'a>> {
        self.symbols
            .iter()
            .filter(|symbol| symbol.is_external() && symbol.is_defined())
    }

    /// Symbols this object expects another object to define.
    pub fn external_references(&self) -> impl Iterator<Item = &Symbol<'a>> {
        self.symbols.iter().filter(|symbol| symbol.is_external_reference())
    }

    /// The string table.
    #[must_use]
    pub fn strings(&self) -> &StringTable<'a> {
        &self.strings
    }

    /// Classification derived from sections and symbols.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// What this object says about the externally visible symbol `name`, `None` if it does
    /// not define it.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<SymbolFacts<'a>> {
        let symbol = self.exports().find(|symbol| symbol.name() == name)?;

        if self.kind == ObjectKind::ImportDescriptor {
            return Some(SymbolFacts::Import {
                dll: None,
                target: None,
            });
        }

        Some(match symbol.section_number {
            SectionNumber::Section(section) if symbol.is_code() => SymbolFacts::Code {
                section,
                offset: symbol.value,
            },
            SectionNumber::Section(section) => SymbolFacts::Data {
                section: Some(section),
                value: symbol.value,
            },
            _ => SymbolFacts::Data {
                section: None,
                value: symbol.value,
            },
        })
    }
}

fn read_symbols<'a>(
    table: &'a [u8],
    count: usize,
    strings: StringTable<'a>,
    code_sections: &[bool],
) -> Result<Vec<Symbol<'a>>> {
    let mut parser = Parser::new(table);
    let mut symbols = Vec::with_capacity(count);

    let mut index = 0;
    while index < count {
        let symbol = Symbol::read(&mut parser, index, count - index, strings, code_sections)?;
        index += 1 + symbol.aux_count();
        symbols.push(symbol);
    }

    Ok(symbols)
}

fn classify(sections: &[Section<'_>], symbols: &[Symbol<'_>]) -> ObjectKind {
    if sections.iter().any(Section::is_code) {
        return ObjectKind::Code;
    }

    let import_data = sections.iter().any(Section::is_import_data);
    let bookkeeping = symbols
        .iter()
        .any(|symbol| symbol.is_external() && is_import_bookkeeping(symbol.name()));

    if import_data || bookkeeping {
        ObjectKind::ImportDescriptor
    } else {
        ObjectKind::Data
    }
}

/// Facts about one symbol, as needed for binding decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolFacts<'a> {
    /// Defined in an executable section of a COFF object
    Code {
        /// One-based section number
        section: u16,
        /// Offset within the section
        offset: u32,
    },
    /// Defined, but not in code
    Data {
        /// One-based section number, `None` for absolute symbols
        section: Option<u16>,
        /// Symbol value
        value: u32,
    },
    /// Published by an import record or descriptor, resolved at load time
    Import {
        /// The exporting DLL, when known
        dll: Option<&'a str>,
        /// How the loader looks the symbol up, when known
        target: Option<ImportTarget<'a>>,
    },
}

/// A regular archive member, parsed.
#[derive(Debug, Clone)]
pub enum ObjectFile<'a> {
    /// A full COFF object
    Coff(CoffObject<'a>),
    /// A short import record
    Import(ImportObject<'a>),
}

impl<'a> ObjectFile<'a> {
    /// Parse member content, dispatching on the import object signature.
    ///
    /// # Errors
    /// See [`CoffObject::parse`] and [`ImportObject::parse`].
    pub fn parse(data: &'a [u8]) -> Result<ObjectFile<'a>> {
        if ImportObject::is_import(data) {
            Ok(ObjectFile::Import(ImportObject::parse(data)?))
        } else {
            Ok(ObjectFile::Coff(CoffObject::parse(data)?))
        }
    }

    /// Target machine.
    #[must_use]
    pub fn machine(&self) -> Machine {
        match self {
            ObjectFile::Coff(object) => object.machine(),
            ObjectFile::Import(import) => import.machine,
        }
    }

    /// Classification of the member.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectFile::Coff(object) => object.kind(),
            ObjectFile::Import(_) => ObjectKind::ImportDescriptor,
        }
    }

    /// What this member says about the externally visible symbol `name`, `None` if it does
    /// not define it.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<SymbolFacts<'a>> {
        match self {
            ObjectFile::Import(import) => import.defines(name).then(|| SymbolFacts::Import {
                dll: Some(import.dll),
                target: Some(import.target()),
            }),
            ObjectFile::Coff(object) => object.lookup(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::factories::{CoffBuilder, SymbolSpec};

    #[test]
    fn code_object() {
        let data = CoffBuilder::new(Machine::Amd64)
            .text(&[0xC3; 16])
            .symbol(SymbolSpec::function("Foo_QueryInterface", 1, 0))
            .symbol(SymbolSpec::function("Foo_AddRef", 1, 8))
            .symbol(SymbolSpec::external("__imp_CoTaskMemFree"))
            .build();

        let object = CoffObject::parse(&data).unwrap();
        assert_eq!(object.kind(), ObjectKind::Code);
        assert_eq!(object.sections().len(), 1);
        assert_eq!(object.exports().count(), 2);
        assert_eq!(object.external_references().count(), 1);
        assert_eq!(object.symbol_at(1).unwrap().name(), "Foo_AddRef");

        let file = ObjectFile::parse(&data).unwrap();
        assert_eq!(
            file.lookup("Foo_AddRef"),
            Some(SymbolFacts::Code {
                section: 1,
                offset: 8
            })
        );
        assert_eq!(file.lookup("__imp_CoTaskMemFree"), None);
    }

    #[test]
    fn long_names_go_through_string_table() {
        let long = "IMyVeryLongInterfaceName_SomeMethod_Proxy";
        let data = CoffBuilder::new(Machine::I386)
            .text(&[0x90; 4])
            .symbol(SymbolSpec::function(long, 1, 0))
            .build();

        let object = CoffObject::parse(&data).unwrap();
        assert!(matches!(
            object.symbols()[0].raw_name,
            SymbolName::Indirect(4)
        ));
        assert_eq!(object.symbols()[0].name(), long);
    }

    #[test]
    fn truncated_symbol_table() {
        let mut data = CoffBuilder::new(Machine::Amd64)
            .text(&[0xC3])
            .symbol(SymbolSpec::function("a", 1, 0))
            .symbol(SymbolSpec::function("b", 1, 0))
            .build();

        // Claim one more record than the object holds
        let count_offset = 12;
        let count = u32::from_le_bytes(data[count_offset..count_offset + 4].try_into().unwrap());
        data[count_offset..count_offset + 4].copy_from_slice(&(count + 50).to_le_bytes());

        let err = CoffObject::parse(&data).unwrap_err();
        assert!(err.is_format());
        assert!(err.to_string().contains("Symbol table"));
    }

    #[test]
    fn import_descriptor_object() {
        let data = CoffBuilder::new(Machine::Amd64)
            .section(".idata$2", &[0; 20], SectionFlags::CNT_INITIALIZED_DATA)
            .symbol(SymbolSpec::data("__IMPORT_DESCRIPTOR_foo", 1, 0))
            .build();

        let file = ObjectFile::parse(&data).unwrap();
        assert_eq!(file.kind(), ObjectKind::ImportDescriptor);
        assert_eq!(
            file.lookup("__IMPORT_DESCRIPTOR_foo"),
            Some(SymbolFacts::Import {
                dll: None,
                target: None
            })
        );
    }

    #[test]
    fn short_import_is_not_coff() {
        let data = crate::test::factories::short_import("Foo_Release", "foo.dll", Machine::Amd64);
        assert!(CoffObject::parse(&data).is_err());

        let file = ObjectFile::parse(&data).unwrap();
        assert_eq!(file.kind(), ObjectKind::ImportDescriptor);
        assert!(matches!(
            file.lookup("__imp_Foo_Release"),
            Some(SymbolFacts::Import {
                dll: Some("foo.dll"),
                ..
            })
        ));
    }

    #[test]
    fn bookkeeping_names() {
        assert!(is_import_bookkeeping("__IMPORT_DESCRIPTOR_ole32"));
        assert!(is_import_bookkeeping("__NULL_IMPORT_DESCRIPTOR"));
        assert!(is_import_bookkeeping("\x7fole32_NULL_THUNK_DATA"));
        assert!(!is_import_bookkeeping("Foo_QueryInterface"));
    }
}
