//! The archive symbol index: the two `/` linker members and the resolved name map.

use std::collections::HashMap;

use crate::{file::parser::Parser, Result};

/// The first linker member.
///
/// Layout: big-endian `u32` symbol count, that many big-endian `u32` member header
/// offsets, then the NUL-terminated symbol names in the same order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstLinkerMember<'a> {
    /// `(symbol, member header offset)` in file order
    pub entries: Vec<(&'a str, u32)>,
}

impl<'a> FirstLinkerMember<'a> {
    /// Parse the content of the first linker member.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the offset array or the name list is shorter
    /// than the declared symbol count.
    pub fn parse(data: &'a [u8]) -> Result<FirstLinkerMember<'a>> {
        let mut parser = Parser::new(data);
        let count = parser.read_be::<u32>().map_err(|_| {
            malformed_error!("First linker member of {} bytes has no symbol count", data.len())
        })? as usize;

        if count.saturating_mul(4) > parser.remaining() {
            return Err(malformed_error!(
                "First linker member declares {} symbols, offset table truncated",
                count
            ));
        }

        let mut offsets = Vec::with_capacity(count);
        for _ in 0..count {
            offsets.push(parser.read_be::<u32>()?);
        }

        let mut entries = Vec::with_capacity(count);
        for (position, offset) in offsets.into_iter().enumerate() {
            let name = parser.read_cstr().map_err(|_| {
                malformed_error!(
                    "First linker member names end after {} of {} symbols",
                    position,
                    count
                )
            })?;
            entries.push((name, offset));
        }

        Ok(FirstLinkerMember { entries })
    }
}

/// The second (Microsoft) linker member.
///
/// Layout: little-endian `u32` member count, that many little-endian `u32` member header
/// offsets, `u32` symbol count, that many `u16` one-based indices into the offset table,
/// then the NUL-terminated names, sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondLinkerMember<'a> {
    /// Header offsets of all regular members, in archive order
    pub offsets: Vec<u32>,
    /// `(symbol, one-based index into offsets)`, sorted by symbol
    pub entries: Vec<(&'a str, u16)>,
}

impl<'a> SecondLinkerMember<'a> {
    /// Parse the content of the second linker member.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a table is truncated or an index does not
    /// point into the offset table.
    pub fn parse(data: &'a [u8]) -> Result<SecondLinkerMember<'a>> {
        let mut parser = Parser::new(data);
        let member_count = parser.read_le::<u32>()? as usize;
        if member_count.saturating_mul(4) > parser.remaining() {
            return Err(malformed_error!(
                "Second linker member declares {} members, offset table truncated",
                member_count
            ));
        }

        let mut offsets = Vec::with_capacity(member_count);
        for _ in 0..member_count {
            offsets.push(parser.read_le::<u32>()?);
        }

        let symbol_count = parser.read_le::<u32>()? as usize;
        if symbol_count.saturating_mul(2) > parser.remaining() {
            return Err(malformed_error!(
                "Second linker member declares {} symbols, index table truncated",
                symbol_count
            ));
        }

        let mut indices = Vec::with_capacity(symbol_count);
        for _ in 0..symbol_count {
            let index = parser.read_le::<u16>()?;
            if index == 0 || usize::from(index) > member_count {
                return Err(malformed_error!(
                    "Second linker member index {} outside {} members",
                    index,
                    member_count
                ));
            }
            indices.push(index);
        }

        let mut entries = Vec::with_capacity(symbol_count);
        for index in indices {
            entries.push((parser.read_cstr()?, index));
        }

        Ok(SecondLinkerMember { offsets, entries })
    }

    /// `(symbol, member header offset)` pairs.
    pub fn resolved(&self) -> impl Iterator<Item = (&'a str, u32)> + '_ {
        self.entries.iter().filter_map(|(name, index)| {
            let slot = usize::from(*index).checked_sub(1)?;
            self.offsets.get(slot).map(|offset| (*name, *offset))
        })
    }
}

/// Symbol name to index of the defining member in [`crate::archive::Archive::members`].
///
/// Built once while reading the archive; every value is a valid member index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolMemberMap<'a> {
    map: HashMap<&'a str, usize>,
}

impl<'a> SymbolMemberMap<'a> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        SymbolMemberMap {
            map: HashMap::with_capacity(capacity),
        }
    }

    /// Insert a mapping unless the symbol is already present; returns the existing member
    /// index on a conflict.
    pub(crate) fn insert_first(&mut self, symbol: &'a str, member: usize) -> Option<usize> {
        match self.map.entry(symbol) {
            std::collections::hash_map::Entry::Occupied(existing) => Some(*existing.get()),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(member);
                None
            }
        }
    }

    /// Index of the member defining `symbol`.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<usize> {
        self.map.get(symbol).copied()
    }

    /// Returns `true` if the index lists `symbol`.
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        self.map.contains_key(symbol)
    }

    /// Number of indexed symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if no symbol is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// All `(symbol, member index)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, usize)> + '_ {
        self.map.iter().map(|(name, index)| (*name, *index))
    }

    /// Symbols defined by the member at `member`.
    pub fn symbols_of(&self, member: usize) -> impl Iterator<Item = &'a str> + '_ {
        self.iter()
            .filter(move |(_, index)| *index == member)
            .map(|(name, _)| name)
    }
}
