//! Archive members.

use strum::Display;

use crate::{coff::ObjectFile, Result};

use super::header::MEMBER_HEADER_SIZE;

/// Role of a member within the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum MemberKind {
    /// The first `/` member, big-endian symbol index
    FirstLinker,
    /// The second `/` member, little-endian symbol index
    SecondLinker,
    /// The `//` long names member
    LongNames,
    /// The ARM64EC `/<ECSYMBOLS>/` index
    EcSymbols,
    /// A regular member: COFF object or short import
    Object,
}

/// One member of an archive, content borrowed from the archive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member<'a> {
    /// Decoded name; long names resolved, trailing `/` removed. Special members keep their
    /// raw name (`/`, `//`, `/<ECSYMBOLS>/`)
    pub name: &'a str,
    /// Modification time, seconds since the Unix epoch
    pub date: Option<u64>,
    /// Owner user id
    pub user_id: Option<u64>,
    /// Owner group id
    pub group_id: Option<u64>,
    /// File mode
    pub mode: Option<u64>,
    /// Byte offset of the member header within the archive
    pub offset: usize,
    /// The member content, padding excluded
    pub content: &'a [u8],
    /// Role of the member
    pub kind: MemberKind,
}

impl<'a> Member<'a> {
    /// Content size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Byte offset of the content within the archive.
    #[must_use]
    pub fn data_offset(&self) -> usize {
        self.offset + MEMBER_HEADER_SIZE
    }

    /// Parse the member content as a COFF object or short import.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for special members and anonymous objects,
    /// or the format error of the object parser.
    pub fn parse(&self) -> Result<ObjectFile<'a>> {
        if self.kind != MemberKind::Object {
            return Err(crate::Error::NotSupported(format!(
                "{} member at offset {} is not an object",
                self.kind, self.offset
            )));
        }

        ObjectFile::parse(self.content)
    }
}
