//! COFF relocation records.

use goblin::pe::relocation::{
    IMAGE_REL_AMD64_ADDR32NB, IMAGE_REL_AMD64_ADDR64, IMAGE_REL_AMD64_REL32,
    IMAGE_REL_I386_DIR32, IMAGE_REL_I386_DIR32NB, IMAGE_REL_I386_REL32,
};

use crate::{coff::header::Machine, file::parser::Parser, Result};

/// A single 10-byte relocation entry of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    /// Offset of the patched location, relative to the start of the section
    pub virtual_address: u32,
    /// Zero-based index into the symbol table
    pub symbol_index: u32,
    /// Machine specific `IMAGE_REL_*` type
    pub typ: u16,
}

impl Relocation {
    /// Size of one record on disk.
    pub const SIZE: usize = 10;

    /// Read one relocation record.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the record is truncated.
    pub fn read(parser: &mut Parser<'_>) -> Result<Relocation> {
        Ok(Relocation {
            virtual_address: parser.read_le()?,
            symbol_index: parser.read_le()?,
            typ: parser.read_le()?,
        })
    }

    /// Returns `true` if the relocation stores an absolute address of its target.
    #[must_use]
    pub fn is_absolute(&self, machine: Machine) -> bool {
        match machine {
            Machine::I386 => self.typ == IMAGE_REL_I386_DIR32,
            Machine::Amd64 => self.typ == IMAGE_REL_AMD64_ADDR64,
            _ => false,
        }
    }

    /// Returns `true` if the relocation is relative to the patched location.
    #[must_use]
    pub fn is_relative(&self, machine: Machine) -> bool {
        match machine {
            Machine::I386 => self.typ == IMAGE_REL_I386_REL32,
            Machine::Amd64 => self.typ == IMAGE_REL_AMD64_REL32,
            _ => false,
        }
    }

    /// Returns `true` for image-base relative (RVA) relocations.
    #[must_use]
    pub fn is_image_relative(&self, machine: Machine) -> bool {
        match machine {
            Machine::I386 => self.typ == IMAGE_REL_I386_DIR32NB,
            Machine::Amd64 => self.typ == IMAGE_REL_AMD64_ADDR32NB,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record() {
        let data = [0x10, 0, 0, 0, 0x03, 0, 0, 0, 0x04, 0];
        let reloc = Relocation::read(&mut Parser::new(&data)).unwrap();

        assert_eq!(reloc.virtual_address, 0x10);
        assert_eq!(reloc.symbol_index, 3);
        assert!(reloc.is_relative(Machine::Amd64));
        assert!(!reloc.is_absolute(Machine::Amd64));
        assert!(!reloc.is_relative(Machine::Arm64));
    }
}
