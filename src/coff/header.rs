//! COFF file header (`IMAGE_FILE_HEADER`).

use bitflags::bitflags;
use goblin::pe::header::{
    COFF_MACHINE_ARM64, COFF_MACHINE_ARMNT, COFF_MACHINE_UNKNOWN, COFF_MACHINE_X86,
    COFF_MACHINE_X86_64,
};
use strum::{Display, FromRepr};

use crate::{file::parser::Parser, Result};

/// Machine types accepted in object and import headers.
///
/// `Unknown` is legal: the PE format documentation defines it as "applicable to any machine
/// type", and toolchains emit it for machine-independent objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[repr(u16)]
pub enum Machine {
    /// Machine independent
    Unknown = COFF_MACHINE_UNKNOWN,
    /// Intel 386 and compatible
    I386 = COFF_MACHINE_X86,
    /// ARM Thumb-2
    ArmNt = COFF_MACHINE_ARMNT,
    /// x64
    Amd64 = COFF_MACHINE_X86_64,
    /// ARM64 little endian
    Arm64 = COFF_MACHINE_ARM64,
    /// ARM64 emulation compatible
    Arm64Ec = 0xA641,
    /// ARM64X hybrid
    Arm64X = 0xA64E,
}

impl Machine {
    /// Decode a raw machine field.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for any value this crate does not handle.
    pub fn from_raw(raw: u16) -> Result<Machine> {
        Machine::from_repr(raw)
            .ok_or_else(|| malformed_error!("Unsupported machine type 0x{:04x}", raw))
    }

    /// Size in bytes of a pointer (and of one vtable slot) on this machine.
    #[must_use]
    pub fn pointer_size(self) -> usize {
        match self {
            Machine::I386 | Machine::ArmNt => 4,
            _ => 8,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// `IMAGE_FILE_*` characteristics of an object
    pub struct FileCharacteristics: u16 {
        /// Relocation information was stripped
        const RELOCS_STRIPPED = 0x0001;
        /// The file is an image
        const EXECUTABLE_IMAGE = 0x0002;
        /// COFF line numbers were stripped
        const LINE_NUMS_STRIPPED = 0x0004;
        /// Local symbols were stripped
        const LOCAL_SYMS_STRIPPED = 0x0008;
        /// Application can handle addresses beyond 2GB
        const LARGE_ADDRESS_AWARE = 0x0020;
        /// Machine is based on a 32-bit-word architecture
        const MACHINE_32BIT = 0x0100;
        /// Debugging information was stripped
        const DEBUG_STRIPPED = 0x0200;
        /// The image is a DLL
        const DLL = 0x2000;
    }
}

/// The fixed 20-byte header at the start of every COFF object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoffHeader {
    /// Target machine
    pub machine: Machine,
    /// Number of entries in the section table
    pub number_of_sections: u16,
    /// Creation time, seconds since the Unix epoch
    pub time_date_stamp: u32,
    /// File offset of the symbol table, 0 if there is none
    pub pointer_to_symbol_table: u32,
    /// Number of symbol table entries, auxiliary records included
    pub number_of_symbols: u32,
    /// Size of the optional header (0 for objects)
    pub size_of_optional_header: u16,
    /// `IMAGE_FILE_*` flags
    pub characteristics: FileCharacteristics,
}

impl CoffHeader {
    /// Size of the header on disk.
    pub const SIZE: usize = 20;

    /// Read the header at the current position of `parser`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 20 bytes remain, or
    /// [`crate::Error::Malformed`] on an unsupported machine type.
    pub fn read(parser: &mut Parser<'_>) -> Result<CoffHeader> {
        if parser.remaining() < Self::SIZE {
            return Err(malformed_error!(
                "Truncated COFF header - {} of {} bytes",
                parser.remaining(),
                Self::SIZE
            ));
        }

        let machine = Machine::from_raw(parser.read_le::<u16>()?)?;
        Ok(CoffHeader {
            machine,
            number_of_sections: parser.read_le()?,
            time_date_stamp: parser.read_le()?,
            pointer_to_symbol_table: parser.read_le()?,
            number_of_symbols: parser.read_le()?,
            size_of_optional_header: parser.read_le()?,
            characteristics: FileCharacteristics::from_bits_retain(parser.read_le()?),
        })
    }
}
