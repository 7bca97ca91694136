//! Short import objects (`IMPORT_OBJECT_HEADER`).
//!
//! Modern import libraries describe each imported function with a 20-byte header followed
//! by the public symbol name and the DLL name, instead of a full COFF object. The linker
//! synthesises the thunk and the `__imp_` pointer from this record; for us it marks a
//! symbol that is only reachable through the runtime loader.

use strum::{Display, FromRepr};

use crate::{coff::header::Machine, file::parser::Parser, Result};

/// Prefix of the import address table pointer the linker generates for every import.
pub const IMPORT_POINTER_PREFIX: &str = "__imp_";

/// What the import refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum ImportType {
    /// Executable code, a thunk is generated
    Code = 0,
    /// Data, only the `__imp_` pointer exists
    Data = 1,
    /// Constant, declared `CONST` in the .def file
    Const = 2,
}

/// How the name the DLL exports is derived from the public symbol name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum ImportNameType {
    /// Imported by ordinal, there is no name
    Ordinal = 0,
    /// The public symbol name as is
    Name = 1,
    /// The public name without its leading `?`, `@` or `_`
    NoPrefix = 2,
    /// As `NoPrefix`, and truncated at the first `@`
    Undecorate = 3,
    /// An explicit export name follows the DLL name
    ExportAs = 4,
}

/// How the runtime loader locates the import in its DLL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportTarget<'a> {
    /// By ordinal
    Ordinal(u16),
    /// By exported name; the hint is the expected index into the export name table
    Name {
        /// The name in the export table
        name: &'a str,
        /// Lookup hint
        hint: u16,
    },
}

/// A parsed short import object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportObject<'a> {
    /// Target machine
    pub machine: Machine,
    /// Creation time, seconds since the Unix epoch
    pub time_date_stamp: u32,
    /// Length of the strings that follow the header
    pub size_of_data: u32,
    /// Ordinal or hint, depending on the name type
    pub ordinal_or_hint: u16,
    /// Code, data or const
    pub import_type: ImportType,
    /// How the exported name is derived
    pub name_type: ImportNameType,
    /// The public symbol the archive index lists
    pub symbol: &'a str,
    /// The DLL that exports it
    pub dll: &'a str,
    /// Exported name when `name_type` is [`ImportNameType::ExportAs`]
    pub export_name: Option<&'a str>,
}

impl<'a> ImportObject<'a> {
    /// Size of the fixed header.
    pub const HEADER_SIZE: usize = 20;

    /// Returns `true` if `data` starts with the import object signature
    /// (`Sig1 == IMAGE_FILE_MACHINE_UNKNOWN`, `Sig2 == 0xFFFF`).
    #[must_use]
    pub fn is_import(data: &[u8]) -> bool {
        data.len() >= 4 && data[..4] == [0x00, 0x00, 0xFF, 0xFF]
    }

    /// Parse a short import object.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for the anonymous object family (version
    /// other than 0, e.g. `/bigobj` output), and [`crate::Error::Malformed`] for a
    /// truncated record or invalid type bits.
    pub fn parse(data: &'a [u8]) -> Result<ImportObject<'a>> {
        if !Self::is_import(data) {
            return Err(malformed_error!("Missing import object signature"));
        }
        if data.len() < Self::HEADER_SIZE {
            return Err(malformed_error!(
                "Import object header truncated to {} bytes",
                data.len()
            ));
        }

        let mut parser = Parser::new(data);
        parser.advance_by(4)?;
        let version = parser.read_le::<u16>()?;
        if version != 0 {
            return Err(crate::Error::NotSupported(format!(
                "Anonymous COFF object version {version}"
            )));
        }

        let machine = Machine::from_raw(parser.read_le()?)?;
        let time_date_stamp = parser.read_le::<u32>()?;
        let size_of_data = parser.read_le::<u32>()?;
        let ordinal_or_hint = parser.read_le::<u16>()?;
        let type_bits = parser.read_le::<u16>()?;

        let import_type = ImportType::from_repr((type_bits & 0x3) as u8)
            .ok_or_else(|| malformed_error!("Invalid import type {}", type_bits & 0x3))?;
        let name_type = ImportNameType::from_repr(((type_bits >> 2) & 0x7) as u8)
            .ok_or_else(|| malformed_error!("Invalid import name type {}", (type_bits >> 2) & 0x7))?;

        let strings = parser.read_bytes(size_of_data as usize).map_err(|_| {
            malformed_error!(
                "Import object declares {} bytes of names, {} available",
                size_of_data,
                data.len() - Self::HEADER_SIZE
            )
        })?;

        let mut names = Parser::new(strings);
        let symbol = names.read_cstr()?;
        let dll = names.read_cstr()?;
        let export_name = if name_type == ImportNameType::ExportAs {
            Some(names.read_cstr()?)
        } else {
            None
        };

        Ok(ImportObject {
            machine,
            time_date_stamp,
            size_of_data,
            ordinal_or_hint,
            import_type,
            name_type,
            symbol,
            dll,
            export_name,
        })
    }

    /// The `__imp_` pointer symbol the linker synthesises for this import.
    #[must_use]
    pub fn pointer_symbol(&self) -> String {
        format!("{IMPORT_POINTER_PREFIX}{}", self.symbol)
    }

    /// Returns `true` if the import publishes `name`, either directly or through its
    /// `__imp_` pointer.
    #[must_use]
    pub fn defines(&self, name: &str) -> bool {
        name == self.symbol || name.strip_prefix(IMPORT_POINTER_PREFIX) == Some(self.symbol)
    }

    /// How the runtime loader finds this import in [`ImportObject::dll`].
    #[must_use]
    pub fn target(&self) -> ImportTarget<'a> {
        let hint = self.ordinal_or_hint;
        let name = match self.name_type {
            ImportNameType::Ordinal => return ImportTarget::Ordinal(hint),
            ImportNameType::Name => self.symbol,
            ImportNameType::NoPrefix => strip_decoration_prefix(self.symbol),
            ImportNameType::Undecorate => {
                let stripped = strip_decoration_prefix(self.symbol);
                stripped.split('@').next().unwrap_or(stripped)
            }
            ImportNameType::ExportAs => self.export_name.unwrap_or(self.symbol),
        };
        ImportTarget::Name { name, hint }
    }
}

fn strip_decoration_prefix(name: &str) -> &str {
    name.strip_prefix(['?', '@', '_']).unwrap_or(name)
}
