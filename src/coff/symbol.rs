//! Symbol table records (`IMAGE_SYMBOL`) and their auxiliary entries.
//!
//! Each record is 18 bytes. A record may be followed by `NumberOfAuxSymbols` auxiliary
//! records of the same size; those are kept as raw bytes on the owning [`Symbol`] and are
//! never surfaced as symbols of their own. Symbol indices (as used by relocations) count
//! auxiliary records, so [`Symbol::index`] is not the position in [`crate::coff::CoffObject::symbols`].

use std::sync::OnceLock;

use goblin::pe::symbol::{
    IMAGE_SYM_ABSOLUTE, IMAGE_SYM_CLASS_EXTERNAL, IMAGE_SYM_CLASS_EXTERNAL_DEF,
    IMAGE_SYM_CLASS_FILE, IMAGE_SYM_CLASS_LABEL, IMAGE_SYM_CLASS_SECTION,
    IMAGE_SYM_CLASS_STATIC, IMAGE_SYM_CLASS_WEAK_EXTERNAL, IMAGE_SYM_DEBUG,
    IMAGE_SYM_DTYPE_FUNCTION, IMAGE_SYM_UNDEFINED,
};
use strum::{Display, FromRepr};

use crate::{coff::strings::StringTable, file::parser::Parser, Result};

/// Size of one symbol (or auxiliary) record.
pub const SYMBOL_SIZE: usize = 18;

/// The name field of a symbol record.
///
/// Names of up to eight bytes are stored inline; longer ones are an offset into the string
/// table, flagged by four leading zero bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolName {
    /// Up to eight bytes, NUL padded
    Inline([u8; 8]),
    /// Offset into the string table
    Indirect(u32),
}

impl SymbolName {
    /// Classify the raw 8-byte name field.
    #[must_use]
    pub fn from_raw(raw: [u8; 8]) -> SymbolName {
        if raw[..4] == [0, 0, 0, 0] {
            SymbolName::Indirect(u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]))
        } else {
            SymbolName::Inline(raw)
        }
    }

    fn decode(&self, strings: &StringTable<'_>) -> String {
        let bytes = match self {
            SymbolName::Inline(raw) => {
                let end = raw.iter().position(|byte| *byte == 0).unwrap_or(raw.len());
                &raw[..end]
            }
            SymbolName::Indirect(offset) => strings.get_bytes(*offset).unwrap_or_default(),
        };
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// The section number field, decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionNumber {
    /// Not defined in this object, an external reference (or a common symbol)
    Undefined,
    /// An absolute value, not an address
    Absolute,
    /// Debugging information
    Debug,
    /// Defined in the section with this one-based number
    Section(u16),
}

impl SectionNumber {
    /// Decode a raw section number against the object's section count.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for reserved negative values and for numbers
    /// beyond the section table.
    pub fn from_raw(raw: i16, section_count: u16) -> Result<SectionNumber> {
        match raw {
            IMAGE_SYM_UNDEFINED => Ok(SectionNumber::Undefined),
            IMAGE_SYM_ABSOLUTE => Ok(SectionNumber::Absolute),
            IMAGE_SYM_DEBUG => Ok(SectionNumber::Debug),
            n if n > 0 && n.unsigned_abs() <= section_count => {
                Ok(SectionNumber::Section(n.unsigned_abs()))
            }
            n => Err(malformed_error!(
                "Symbol section number {} outside section table of {} entries",
                n,
                section_count
            )),
        }
    }
}

/// Storage classes of symbol records.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[repr(u8)]
pub enum StorageClass {
    Null = 0,
    Automatic = 1,
    External = IMAGE_SYM_CLASS_EXTERNAL,
    Static = IMAGE_SYM_CLASS_STATIC,
    Register = 4,
    ExternalDef = IMAGE_SYM_CLASS_EXTERNAL_DEF,
    Label = IMAGE_SYM_CLASS_LABEL,
    UndefinedLabel = 7,
    MemberOfStruct = 8,
    Argument = 9,
    StructTag = 10,
    MemberOfUnion = 11,
    UnionTag = 12,
    TypeDefinition = 13,
    UndefinedStatic = 14,
    EnumTag = 15,
    MemberOfEnum = 16,
    RegisterParam = 17,
    BitField = 18,
    Block = 100,
    Function = 101,
    EndOfStruct = 102,
    File = IMAGE_SYM_CLASS_FILE,
    Section = IMAGE_SYM_CLASS_SECTION,
    WeakExternal = IMAGE_SYM_CLASS_WEAK_EXTERNAL,
    ClrToken = 107,
    EndOfFunction = 0xFF,
}

/// One symbol record together with its auxiliary records.
///
/// The name is decoded on first access and cached.
#[derive(Debug, Clone)]
pub struct Symbol<'a> {
    /// Index of the record in the symbol table, auxiliary records counted
    pub index: usize,
    /// Undecoded name field
    pub raw_name: SymbolName,
    /// Meaning depends on section number and storage class, usually an offset into the
    /// section
    pub value: u32,
    /// Where the symbol lives
    pub section_number: SectionNumber,
    /// Base type in the low byte, derived type in bits 4-5
    pub typ: u16,
    /// Raw storage class byte
    pub storage_class: u8,
    /// The raw auxiliary records, `18 * n` bytes
    pub aux: &'a [u8],
    in_code_section: bool,
    strings: StringTable<'a>,
    name: OnceLock<String>,
}

impl<'a> Symbol<'a> {
    /// Read one symbol record and its auxiliary records.
    ///
    /// `code_sections` tells, per one-based section number minus one, whether the section
    /// holds executable code.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a string table reference outside the table,
    /// an out of range section number, or auxiliary records running past the table.
    pub(crate) fn read(
        parser: &mut Parser<'a>,
        index: usize,
        remaining_records: usize,
        strings: StringTable<'a>,
        code_sections: &[bool],
    ) -> Result<Symbol<'a>> {
        let start = parser.pos();
        let mut raw = [0u8; 8];
        raw.copy_from_slice(parser.read_bytes(8)?);
        let raw_name = SymbolName::from_raw(raw);

        if let SymbolName::Indirect(offset) = raw_name {
            if !strings.contains(offset) {
                return Err(malformed_error!(
                    "Symbol {} at offset {} names string table offset {} outside table of {} bytes",
                    index,
                    start,
                    offset,
                    strings.len()
                ));
            }
        }

        let value = parser.read_le::<u32>()?;
        let section_count = u16::try_from(code_sections.len()).unwrap_or(u16::MAX);
        let section_number = SectionNumber::from_raw(parser.read_le::<i16>()?, section_count)?;
        let typ = parser.read_le::<u16>()?;
        let storage_class = parser.read_le::<u8>()?;
        let aux_count = usize::from(parser.read_le::<u8>()?);

        if aux_count >= remaining_records {
            return Err(malformed_error!(
                "Symbol {} declares {} auxiliary records, only {} remain in the table",
                index,
                aux_count,
                remaining_records.saturating_sub(1)
            ));
        }
        let aux = parser.read_bytes(aux_count * SYMBOL_SIZE)?;

        let in_code_section = match section_number {
            SectionNumber::Section(number) => code_sections
                .get(usize::from(number) - 1)
                .copied()
                .unwrap_or(false),
            _ => false,
        };

        Ok(Symbol {
            index,
            raw_name,
            value,
            section_number,
            typ,
            storage_class,
            aux,
            in_code_section,
            strings,
            name: OnceLock::new(),
        })
    }

    /// The symbol name.
    ///
    /// Bytes that are not valid UTF-8 are replaced, the name is decoded once.
    pub fn name(&self) -> &str {
        self.name.get_or_init(|| self.raw_name.decode(&self.strings))
    }

    /// Number of auxiliary records following this symbol.
    #[must_use]
    pub fn aux_count(&self) -> usize {
        self.aux.len() / SYMBOL_SIZE
    }

    /// The decoded storage class, `None` for values outside the documented set.
    #[must_use]
    pub fn class(&self) -> Option<StorageClass> {
        StorageClass::from_repr(self.storage_class)
    }

    /// Returns `true` for external (global) and weak external symbols.
    #[must_use]
    pub fn is_external(&self) -> bool {
        matches!(
            self.class(),
            Some(StorageClass::External | StorageClass::WeakExternal)
        )
    }

    /// Returns `true` if the symbol is defined in a section of this object.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        matches!(self.section_number, SectionNumber::Section(_))
    }

    /// Returns `true` for an undefined common (uninitialized data) symbol with a size.
    #[must_use]
    pub fn is_common(&self) -> bool {
        self.section_number == SectionNumber::Undefined
            && self.class() == Some(StorageClass::External)
            && self.value != 0
    }

    /// Returns `true` for an external reference this object expects another member to
    /// satisfy.
    #[must_use]
    pub fn is_external_reference(&self) -> bool {
        self.is_external() && self.section_number == SectionNumber::Undefined && !self.is_common()
    }

    /// Returns `true` if the record is typed as a function.
    #[must_use]
    pub fn is_function(&self) -> bool {
        (self.typ >> 4) & 0x3 == IMAGE_SYM_DTYPE_FUNCTION
    }

    /// Returns `true` if the symbol is defined in an executable section.
    #[must_use]
    pub fn is_code(&self) -> bool {
        self.in_code_section
    }
}

impl PartialEq for Symbol<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.raw_name == other.raw_name
            && self.value == other.value
            && self.section_number == other.section_number
            && self.typ == other.typ
            && self.storage_class == other.storage_class
            && self.aux == other.aux
    }
}
