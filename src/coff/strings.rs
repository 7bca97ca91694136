//! The COFF string table that follows the symbol table.
//!
//! Layout: a little-endian `u32` holding the total table size (the size field included),
//! followed by NUL-terminated strings. Offsets used by symbol and section names count from
//! the start of the size field, so no valid offset is below 4.

use crate::{file::io::read_le, Result};

/// Borrowed view of a string table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringTable<'a> {
    /// The table bytes, size field included; empty when the object has no table
    data: &'a [u8],
}

impl<'a> StringTable<'a> {
    /// Parse the string table at the start of `data` (everything after the symbol table).
    ///
    /// An object that ends right after its symbol table has no string table; that yields an
    /// empty table, and any lookup into it fails.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the declared size exceeds the remaining data.
    pub fn parse(data: &'a [u8]) -> Result<StringTable<'a>> {
        if data.len() < 4 {
            return Ok(StringTable::default());
        }

        let size = read_le::<u32>(data)? as usize;
        if size < 4 {
            return Ok(StringTable::default());
        }
        if size > data.len() {
            return Err(malformed_error!(
                "String table declares {} bytes, only {} available",
                size,
                data.len()
            ));
        }

        Ok(StringTable {
            data: &data[..size],
        })
    }

    /// Total size of the table including the size field, 0 when absent.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the object carries no string table.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if `offset` points at a string inside the table.
    #[must_use]
    pub fn contains(&self, offset: u32) -> bool {
        let offset = offset as usize;
        offset >= 4 && offset < self.data.len()
    }

    /// Raw bytes of the string at `offset`, without its terminator.
    ///
    /// A string running into the end of the table without a terminator ends there.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `offset` lies outside the table.
    pub fn get_bytes(&self, offset: u32) -> Result<&'a [u8]> {
        if !self.contains(offset) {
            return Err(malformed_error!(
                "String table offset {} outside table of {} bytes",
                offset,
                self.data.len()
            ));
        }

        let tail = &self.data[offset as usize..];
        let end = tail.iter().position(|byte| *byte == 0).unwrap_or(tail.len());
        Ok(&tail[..end])
    }

    /// The UTF-8 string at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `offset` lies outside the table or the string is
    /// not valid UTF-8.
    pub fn get(&self, offset: u32) -> Result<&'a str> {
        let bytes = self.get_bytes(offset)?;
        std::str::from_utf8(bytes)
            .map_err(|_| malformed_error!("Invalid UTF-8 in string table at offset {}", offset))
    }
}
