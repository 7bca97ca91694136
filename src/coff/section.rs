//! Section table entries (`IMAGE_SECTION_HEADER`) and their raw data.

use bitflags::bitflags;
use goblin::pe::section_table::{
    IMAGE_SCN_CNT_CODE, IMAGE_SCN_CNT_INITIALIZED_DATA, IMAGE_SCN_CNT_UNINITIALIZED_DATA,
    IMAGE_SCN_LNK_INFO, IMAGE_SCN_MEM_DISCARDABLE, IMAGE_SCN_MEM_EXECUTE, IMAGE_SCN_MEM_WRITE,
};

use crate::{
    coff::{relocation::Relocation, strings::StringTable},
    file::parser::Parser,
    Result,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// `IMAGE_SCN_*` section characteristics
    pub struct SectionFlags: u32 {
        /// Executable code
        const CNT_CODE = IMAGE_SCN_CNT_CODE;
        /// Initialized data
        const CNT_INITIALIZED_DATA = IMAGE_SCN_CNT_INITIALIZED_DATA;
        /// Uninitialized data, no raw bytes in the file
        const CNT_UNINITIALIZED_DATA = IMAGE_SCN_CNT_UNINITIALIZED_DATA;
        /// Comments or other linker information
        const LNK_INFO = IMAGE_SCN_LNK_INFO;
        /// Not part of the image
        const LNK_REMOVE = 0x0000_0800;
        /// COMDAT data
        const LNK_COMDAT = 0x0000_1000;
        /// The relocation count overflowed into the first relocation record
        const LNK_NRELOC_OVFL = 0x0100_0000;
        /// Can be discarded as needed
        const MEM_DISCARDABLE = IMAGE_SCN_MEM_DISCARDABLE;
        /// Can be executed
        const MEM_EXECUTE = IMAGE_SCN_MEM_EXECUTE;
        /// Can be read
        const MEM_READ = 0x4000_0000;
        /// Can be written
        const MEM_WRITE = IMAGE_SCN_MEM_WRITE;
        const _ = !0;
    }
}

/// A parsed section of a COFF object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<'a> {
    /// One-based section number, as used by symbol records
    pub number: u16,
    /// Section name, long names resolved through the string table
    pub name: &'a str,
    /// Total size when loaded (0 in objects)
    pub virtual_size: u32,
    /// Address when loaded (0 in objects)
    pub virtual_address: u32,
    /// Size of the raw data in the file
    pub size_of_raw_data: u32,
    /// File offset of the raw data
    pub pointer_to_raw_data: u32,
    /// Section characteristics
    pub flags: SectionFlags,
    /// Raw contents, empty for uninitialized data
    pub data: &'a [u8],
    /// Relocations applying to this section
    pub relocations: Vec<Relocation>,
}

impl<'a> Section<'a> {
    /// Size of one section table entry.
    pub const SIZE: usize = 40;

    /// Read the section table entry at the current parser position and load its data and
    /// relocations from the object.
    ///
    /// `symbol_count` bounds the symbol index of every relocation.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the name, the raw data, the relocation table
    /// or a relocation target lie outside the object.
    pub fn read(
        parser: &mut Parser<'a>,
        number: u16,
        strings: &StringTable<'a>,
        symbol_count: u32,
    ) -> Result<Section<'a>> {
        let entry = parser.pos();
        if parser.remaining() < Self::SIZE {
            return Err(malformed_error!(
                "Section table entry {} at offset {} is truncated",
                number,
                entry
            ));
        }

        let raw_name = parser.read_bytes(8)?;
        let virtual_size = parser.read_le::<u32>()?;
        let virtual_address = parser.read_le::<u32>()?;
        let size_of_raw_data = parser.read_le::<u32>()?;
        let pointer_to_raw_data = parser.read_le::<u32>()?;
        let pointer_to_relocations = parser.read_le::<u32>()?;
        let _pointer_to_linenumbers = parser.read_le::<u32>()?;
        let number_of_relocations = parser.read_le::<u16>()?;
        let _number_of_linenumbers = parser.read_le::<u16>()?;
        let flags = SectionFlags::from_bits_retain(parser.read_le::<u32>()?);

        let name = section_name(raw_name, strings, number)?;
        let object = parser.data();

        let data = if flags.contains(SectionFlags::CNT_UNINITIALIZED_DATA)
            || pointer_to_raw_data == 0
        {
            &[][..]
        } else {
            slice_at(object, pointer_to_raw_data, size_of_raw_data).ok_or_else(|| {
                malformed_error!(
                    "Raw data of section '{}' ({} bytes at {}) exceeds object of {} bytes",
                    name,
                    size_of_raw_data,
                    pointer_to_raw_data,
                    object.len()
                )
            })?
        };

        let relocations = read_relocations(
            object,
            name,
            pointer_to_relocations,
            number_of_relocations,
            flags,
            symbol_count,
        )?;

        Ok(Section {
            number,
            name,
            virtual_size,
            virtual_address,
            size_of_raw_data,
            pointer_to_raw_data,
            flags,
            data,
            relocations,
        })
    }

    /// Returns `true` if the section holds executable code.
    #[must_use]
    pub fn is_code(&self) -> bool {
        self.flags
            .intersects(SectionFlags::CNT_CODE | SectionFlags::MEM_EXECUTE)
    }

    /// Returns `true` for the `.idata$N` sections that make up an import descriptor.
    #[must_use]
    pub fn is_import_data(&self) -> bool {
        self.name.starts_with(".idata$")
    }
}

fn section_name<'a>(raw: &'a [u8], strings: &StringTable<'a>, number: u16) -> Result<&'a str> {
    let end = raw.iter().position(|byte| *byte == 0).unwrap_or(raw.len());
    let inline = std::str::from_utf8(&raw[..end])
        .map_err(|_| malformed_error!("Invalid UTF-8 in name of section {}", number))?;

    match inline.strip_prefix('/') {
        Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            let offset = digits.parse::<u32>().map_err(|_| {
                malformed_error!("Invalid long name reference '{}' in section {}", inline, number)
            })?;
            strings.get(offset)
        }
        _ => Ok(inline),
    }
}

fn read_relocations(
    object: &[u8],
    section: &str,
    offset: u32,
    count: u16,
    flags: SectionFlags,
    symbol_count: u32,
) -> Result<Vec<Relocation>> {
    if count == 0 {
        return Ok(Vec::new());
    }

    let mut parser = Parser::new(object);
    parser.seek(offset as usize).map_err(|_| {
        malformed_error!(
            "Relocation table of section '{}' starts outside the object at {}",
            section,
            offset
        )
    })?;

    let mut total = usize::from(count);
    if flags.contains(SectionFlags::LNK_NRELOC_OVFL) && count == u16::MAX {
        // The first record carries the real count, itself included
        let first = Relocation::read(&mut parser)?;
        total = (first.virtual_address as usize).saturating_sub(1);
    }

    if total.saturating_mul(Relocation::SIZE) > parser.remaining() {
        return Err(malformed_error!(
            "Relocation table of section '{}' ({} entries at {}) is truncated",
            section,
            total,
            offset
        ));
    }

    let mut relocations = Vec::with_capacity(total);
    for _ in 0..total {
        let relocation = Relocation::read(&mut parser)?;
        if relocation.symbol_index >= symbol_count {
            return Err(malformed_error!(
                "Relocation in section '{}' references symbol {} of {}",
                section,
                relocation.symbol_index,
                symbol_count
            ));
        }
        relocations.push(relocation);
    }

    Ok(relocations)
}

fn slice_at(data: &[u8], offset: u32, len: u32) -> Option<&[u8]> {
    let start = offset as usize;
    let end = start.checked_add(len as usize)?;
    data.get(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &[u8], raw_size: u32, raw_ptr: u32, relocs: (u32, u16), flags: u32) -> Vec<u8> {
        let mut out = Vec::with_capacity(Section::SIZE);
        let mut padded = [0u8; 8];
        padded[..name.len()].copy_from_slice(name);
        out.extend_from_slice(&padded);
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&raw_size.to_le_bytes());
        out.extend_from_slice(&raw_ptr.to_le_bytes());
        out.extend_from_slice(&relocs.0.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&relocs.1.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&flags.to_le_bytes());
        out
    }

    #[test]
    fn text_section_with_relocation() {
        let mut object = entry(b".text", 4, 40, (44, 1), IMAGE_SCN_CNT_CODE);
        object.extend_from_slice(&[0xC3, 0x90, 0x90, 0x90]);
        object.extend_from_slice(&[0, 0, 0, 0, 1, 0, 0, 0, 4, 0]);

        let section =
            Section::read(&mut Parser::new(&object), 1, &StringTable::default(), 2).unwrap();
        assert_eq!(section.name, ".text");
        assert_eq!(section.data, &[0xC3, 0x90, 0x90, 0x90]);
        assert_eq!(section.relocations.len(), 1);
        assert_eq!(section.relocations[0].symbol_index, 1);
        assert!(section.is_code());
        assert!(!section.is_import_data());
    }

    #[test]
    fn relocation_target_out_of_range() {
        let mut object = entry(b".text", 0, 0, (40, 1), IMAGE_SCN_CNT_CODE);
        object.extend_from_slice(&[0, 0, 0, 0, 9, 0, 0, 0, 4, 0]);

        let err =
            Section::read(&mut Parser::new(&object), 1, &StringTable::default(), 2).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn long_name_and_bss() {
        let strings_data = b"\x11\x00\x00\x00.idata$5\0aaaa";
        let strings = StringTable::parse(&strings_data[..]).unwrap();

        let object = entry(b"/4", 16, 0, (0, 0), IMAGE_SCN_CNT_INITIALIZED_DATA);
        let section = Section::read(&mut Parser::new(&object), 2, &strings, 0).unwrap();
        assert_eq!(section.name, ".idata$5");
        assert!(section.is_import_data());
        assert!(section.data.is_empty());

        let object = entry(b"/99", 0, 0, (0, 0), 0);
        assert!(Section::read(&mut Parser::new(&object), 1, &strings, 0).is_err());
    }

    #[test]
    fn raw_data_past_end() {
        let object = entry(b".data", 64, 40, (0, 0), IMAGE_SCN_CNT_INITIALIZED_DATA);
        let err =
            Section::read(&mut Parser::new(&object), 1, &StringTable::default(), 0).unwrap_err();
        assert!(err.to_string().contains(".data"));
    }

    #[test]
    fn overflowed_relocation_count() {
        let flags = IMAGE_SCN_CNT_CODE | 0x0100_0000;
        let mut object = entry(b".text", 0, 0, (40, u16::MAX), flags);
        // Count record: 3 including itself
        object.extend_from_slice(&[3, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        object.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0, 4, 0]);
        object.extend_from_slice(&[8, 0, 0, 0, 0, 0, 0, 0, 4, 0]);

        let section =
            Section::read(&mut Parser::new(&object), 1, &StringTable::default(), 1).unwrap();
        assert_eq!(section.relocations.len(), 2);
        assert_eq!(section.relocations[1].virtual_address, 8);
    }
}
