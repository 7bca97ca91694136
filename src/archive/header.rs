//! The 60-byte `ar` member header and member name decoding.

use tracing::warn;

use crate::{config::ArchiveConfig, file::parser::Parser, Result};

/// Signature at the start of every archive.
pub const ARCHIVE_MAGIC: &[u8; 8] = b"!<arch>\n";

/// Signature of GNU thin archives, which reference members by path.
pub const THIN_ARCHIVE_MAGIC: &[u8; 8] = b"!<thin>\n";

/// Size of a member header.
pub const MEMBER_HEADER_SIZE: usize = 60;

/// Terminator of every member header.
pub const HEADER_END: &[u8; 2] = b"`\n";

/// The decoded fields of a member header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberHeader<'a> {
    /// The name field, trailing spaces removed; still undecoded (`name/`, `/N`, `/`, `//`)
    pub raw_name: &'a str,
    /// Modification time, seconds since the Unix epoch
    pub date: Option<u64>,
    /// Owner user id
    pub user_id: Option<u64>,
    /// Owner group id
    pub group_id: Option<u64>,
    /// File mode, octal in the header
    pub mode: Option<u64>,
    /// Content size in bytes, padding excluded
    pub size: usize,
}

impl<'a> MemberHeader<'a> {
    /// Read a member header at the current position.
    ///
    /// Blank date, id and mode fields are accepted. A wrong end marker is logged, or
    /// rejected when [`ArchiveConfig::strict_header_markers`] is set.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a truncated header, a non-numeric field or a
    /// blank size.
    pub fn read(parser: &mut Parser<'a>, config: &ArchiveConfig) -> Result<MemberHeader<'a>> {
        let offset = parser.pos();
        if parser.remaining() < MEMBER_HEADER_SIZE {
            return Err(malformed_error!(
                "Truncated member header at offset {} - {} of {} bytes",
                offset,
                parser.remaining(),
                MEMBER_HEADER_SIZE
            ));
        }

        let raw_name = parser.read_ascii_field(16)?;
        let date = parser.read_ascii_number(12, 10)?;
        let user_id = parser.read_ascii_number(6, 10)?;
        let group_id = parser.read_ascii_number(6, 10)?;
        let mode = parser.read_ascii_number(8, 8)?;
        let size = parser
            .read_ascii_number(10, 10)?
            .ok_or_else(|| malformed_error!("Member header at offset {} has no size", offset))?;

        let end = parser.read_bytes(2)?;
        if end != HEADER_END {
            if config.strict_header_markers {
                return Err(malformed_error!(
                    "Member header at offset {} ends with {:02x?} instead of `\\n",
                    offset,
                    end
                ));
            }
            warn!(offset, marker = ?end, "unexpected member header end marker");
        }

        let size = usize::try_from(size)
            .map_err(|_| malformed_error!("Member size {} at offset {} too large", size, offset))?;

        Ok(MemberHeader {
            raw_name,
            date,
            user_id,
            group_id,
            mode,
            size,
        })
    }
}

/// Classification of a raw member name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RawName<'a> {
    /// `/`, a linker member
    Linker,
    /// `//`
    LongNames,
    /// `/<ECSYMBOLS>/`
    EcSymbols,
    /// `/N`, an offset into the long names member
    Long(usize),
    /// `name/`
    Short(&'a str),
}

impl<'a> RawName<'a> {
    pub(crate) fn classify(raw: &'a str, offset: usize) -> Result<RawName<'a>> {
        match raw {
            "/" => return Ok(RawName::Linker),
            "//" => return Ok(RawName::LongNames),
            "/<ECSYMBOLS>/" => return Ok(RawName::EcSymbols),
            _ => {}
        }

        if let Some(digits) = raw.strip_prefix('/') {
            return digits
                .parse::<usize>()
                .map(RawName::Long)
                .map_err(|_| malformed_error!("Invalid member name '{}' at offset {}", raw, offset));
        }

        match raw.strip_suffix('/') {
            Some(name) if !name.is_empty() => Ok(RawName::Short(name)),
            _ => Err(malformed_error!(
                "Invalid member name '{}' at offset {}",
                raw,
                offset
            )),
        }
    }
}

/// The `//` member: NUL (or `/\n`) terminated names referenced by `/N` headers.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct LongNames<'a> {
    data: Option<&'a [u8]>,
}

impl<'a> LongNames<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        LongNames { data: Some(data) }
    }

    pub(crate) fn get(&self, index: usize, header_offset: usize) -> Result<&'a str> {
        let Some(data) = self.data else {
            return Err(malformed_error!(
                "Member at offset {} uses long name /{} but the archive has no long names member",
                header_offset,
                index
            ));
        };

        let Some(tail) = data.get(index..).filter(|tail| !tail.is_empty()) else {
            return Err(malformed_error!(
                "Long name offset {} outside long names member of {} bytes (member at {})",
                index,
                data.len(),
                header_offset
            ));
        };

        let end = tail
            .iter()
            .position(|byte| *byte == 0 || *byte == b'\n')
            .unwrap_or(tail.len());
        let raw = &tail[..end];
        let raw = raw.strip_suffix(b"/").unwrap_or(raw);

        std::str::from_utf8(raw).map_err(|_| {
            malformed_error!(
                "Invalid UTF-8 in long name at offset {} (member at {})",
                index,
                header_offset
            )
        })
    }
}
