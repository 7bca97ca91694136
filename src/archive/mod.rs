//! Reading `.lib` import libraries (the `ar` container with Microsoft linker members).
//!
//! An archive is the `!<arch>\n` signature followed by members, each a 60-byte ASCII
//! header plus content padded to an even offset. Three member names are special:
//!
//! - `/` - the first (big-endian) and second (little-endian) linker members, the symbol
//!   index mapping public symbols to member header offsets
//! - `//` - the long names member, referenced by `/N` names
//! - `/<ECSYMBOLS>/` - the ARM64EC symbol index
//!
//! Everything else is a regular member: a COFF object or a short import record. Member
//! content is sliced out of the archive buffer and only parsed when asked for, through
//! [`Member::parse`] or [`Archive::parse_objects`].
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use comlink::archive::ArchiveReader;
//! use std::path::Path;
//!
//! let library = ArchiveReader::default().read_file(Path::new("uuid.lib"))?;
//! let archive = library.archive();
//!
//! if let Some(member) = archive.member_for_symbol("IID_IUnknown") {
//!     println!("defined in {} at offset {}", member.name, member.offset);
//! }
//! # Ok::<(), comlink::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! [`Archive`] and [`Library`] are immutable after construction and `Send + Sync`.
//! [`Archive::par_parse_objects`] parses all members on the rayon pool.

mod header;
mod index;
mod member;

use std::{collections::HashMap, path::Path};

use ouroboros::self_referencing;
use rayon::prelude::*;
use tracing::{debug, warn};

pub use header::{MemberHeader, ARCHIVE_MAGIC, HEADER_END, MEMBER_HEADER_SIZE, THIN_ARCHIVE_MAGIC};
pub use index::{FirstLinkerMember, SecondLinkerMember, SymbolMemberMap};
pub use member::{Member, MemberKind};

use header::{LongNames, RawName};

use crate::{
    coff::{ImportObject, ObjectFile},
    config::ArchiveConfig,
    file::{self, parser::Parser, Backend},
    Error, Result,
};

/// Reads archives according to an [`ArchiveConfig`].
///
/// # Examples
///
/// ```rust,no_run
/// use comlink::{archive::ArchiveReader, ArchiveConfig};
///
/// let data = std::fs::read("ole32.lib")?;
/// let archive = ArchiveReader::new(ArchiveConfig::strict()).read(&data)?;
/// println!("{} members, {} symbols", archive.members().len(), archive.symbol_member_map().len());
/// # Ok::<(), comlink::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveReader {
    config: ArchiveConfig,
}

struct RawMember<'a> {
    offset: usize,
    header: MemberHeader<'a>,
    name: RawName<'a>,
    content: &'a [u8],
}

impl ArchiveReader {
    /// Create a reader with the given configuration.
    #[must_use]
    pub fn new(config: ArchiveConfig) -> Self {
        ArchiveReader { config }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Memory-map and read the archive at `path`.
    ///
    /// # Errors
    /// Returns [`Error::FileError`] if the file can not be opened, [`Error::Empty`] for an
    /// empty file, or any error of [`ArchiveReader::read`].
    pub fn read_file(&self, path: &Path) -> Result<Library> {
        debug!(path = %path.display(), "reading archive");
        self.load(file::open(path)?)
    }

    /// Read an archive from an owned buffer.
    ///
    /// # Errors
    /// Returns [`Error::Empty`] for an empty buffer, or any error of [`ArchiveReader::read`].
    pub fn read_mem(&self, data: Vec<u8>) -> Result<Library> {
        self.load(file::from_mem(data)?)
    }

    fn load(&self, backend: Box<dyn Backend>) -> Result<Library> {
        Library::try_new(backend, |backend| self.read(backend.data()))
    }

    /// Read the archive in `data`.
    ///
    /// # Errors
    /// Returns [`Error::NotSupported`] for thin archives, and [`Error::Malformed`] for a
    /// missing signature, truncated or inconsistent member headers, unresolvable long names,
    /// and symbol index entries that do not point at a regular member.
    pub fn read<'a>(&self, data: &'a [u8]) -> Result<Archive<'a>> {
        if data.starts_with(THIN_ARCHIVE_MAGIC) {
            return Err(Error::NotSupported(
                "Thin archives reference members outside the file".to_string(),
            ));
        }
        if !data.starts_with(ARCHIVE_MAGIC) {
            return Err(malformed_error!("Missing !<arch> signature"));
        }

        let raw = self.scan(data)?;

        if self.config.require_symbol_index
            && !matches!(raw.first(), Some(RawMember { name: RawName::Linker, .. }))
        {
            return Err(malformed_error!(
                "Archive does not start with a symbol index member"
            ));
        }

        let long_names = raw
            .iter()
            .find(|member| member.name == RawName::LongNames)
            .map_or_else(LongNames::default, |member| LongNames::new(member.content));

        let mut members = Vec::new();
        let mut special = Vec::new();
        let mut linker_members = 0;

        for entry in &raw {
            let (name, kind) = match entry.name {
                RawName::Linker => {
                    linker_members += 1;
                    let kind = match linker_members {
                        1 => MemberKind::FirstLinker,
                        2 => MemberKind::SecondLinker,
                        _ => {
                            return Err(malformed_error!(
                                "Unexpected third linker member at offset {}",
                                entry.offset
                            ))
                        }
                    };
                    (entry.header.raw_name, kind)
                }
                RawName::LongNames => (entry.header.raw_name, MemberKind::LongNames),
                RawName::EcSymbols => (entry.header.raw_name, MemberKind::EcSymbols),
                RawName::Long(index) => (long_names.get(index, entry.offset)?, MemberKind::Object),
                RawName::Short(name) => (name, MemberKind::Object),
            };

            let member = Member {
                name,
                date: entry.header.date,
                user_id: entry.header.user_id,
                group_id: entry.header.group_id,
                mode: entry.header.mode,
                offset: entry.offset,
                content: entry.content,
                kind,
            };

            if kind == MemberKind::Object {
                members.push(member);
            } else {
                special.push(member);
            }
        }

        let by_offset: HashMap<usize, usize> = members
            .iter()
            .enumerate()
            .map(|(index, member)| (member.offset, index))
            .collect();

        let first_linker = special
            .iter()
            .find(|member| member.kind == MemberKind::FirstLinker)
            .map(|member| FirstLinkerMember::parse(member.content))
            .transpose()?;
        let second_linker = special
            .iter()
            .find(|member| member.kind == MemberKind::SecondLinker)
            .map(|member| SecondLinkerMember::parse(member.content))
            .transpose()?;

        let symbols = match &first_linker {
            Some(first) => self.index_symbols(first, &by_offset)?,
            None => {
                debug!("archive has no symbol index");
                SymbolMemberMap::default()
            }
        };

        if let Some(second) = &second_linker {
            if self.config.verify_second_linker {
                verify_second_linker(second, &symbols, &by_offset)?;
            }
        }

        debug!(
            members = members.len(),
            special = special.len(),
            symbols = symbols.len(),
            "read archive"
        );

        Ok(Archive {
            data,
            members,
            special,
            symbols,
            first_linker,
            second_linker,
        })
    }

    fn scan<'a>(&self, data: &'a [u8]) -> Result<Vec<RawMember<'a>>> {
        let mut parser = Parser::new(data);
        parser.seek(ARCHIVE_MAGIC.len())?;

        let mut raw = Vec::new();
        while parser.has_more_data() {
            if raw.len() >= self.config.max_members {
                return Err(malformed_error!(
                    "Archive has more than {} members",
                    self.config.max_members
                ));
            }

            let offset = parser.pos();
            let header = MemberHeader::read(&mut parser, &self.config)?;
            let available = parser.remaining();
            let content = parser.read_bytes(header.size).map_err(|_| {
                malformed_error!(
                    "Member '{}' at offset {} declares {} bytes, {} available",
                    header.raw_name,
                    offset,
                    header.size,
                    available
                )
            })?;

            if header.size % 2 == 1 && parser.has_more_data() {
                let padding = parser.read_le::<u8>()?;
                if padding != b'\n' {
                    if self.config.strict_header_markers {
                        return Err(malformed_error!(
                            "Padding byte 0x{:02x} after member at offset {}",
                            padding,
                            offset
                        ));
                    }
                    warn!(offset, padding, "unexpected member padding byte");
                }
            }

            let name = RawName::classify(header.raw_name, offset)?;
            raw.push(RawMember {
                offset,
                header,
                name,
                content,
            });
        }

        Ok(raw)
    }

    fn index_symbols<'a>(
        &self,
        first: &FirstLinkerMember<'a>,
        by_offset: &HashMap<usize, usize>,
    ) -> Result<SymbolMemberMap<'a>> {
        let mut symbols = SymbolMemberMap::with_capacity(first.entries.len());

        for &(name, offset) in &first.entries {
            let Some(&index) = by_offset.get(&(offset as usize)) else {
                return Err(malformed_error!(
                    "Symbol '{}' refers to offset {} which is not a member header",
                    name,
                    offset
                ));
            };

            match symbols.insert_first(name, index) {
                None => {}
                Some(existing) if existing == index => {}
                Some(existing) => {
                    if !self.config.allow_duplicate_symbols {
                        return Err(malformed_error!(
                            "Duplicate symbol '{}' in members {} and {}",
                            name,
                            existing,
                            index
                        ));
                    }
                    warn!(symbol = name, existing, index, "duplicate symbol, keeping first");
                }
            }
        }

        Ok(symbols)
    }
}

fn verify_second_linker(
    second: &SecondLinkerMember<'_>,
    symbols: &SymbolMemberMap<'_>,
    by_offset: &HashMap<usize, usize>,
) -> Result<()> {
    if let Some(offset) = second
        .offsets
        .iter()
        .find(|offset| !by_offset.contains_key(&(**offset as usize)))
    {
        return Err(malformed_error!(
            "Second linker member lists offset {} which is not a member header",
            offset
        ));
    }

    let mut seen = 0;
    for (name, offset) in second.resolved() {
        let member = by_offset.get(&(offset as usize)).copied();
        if member.is_none() || symbols.get(name) != member {
            return Err(malformed_error!(
                "Second linker member maps '{}' to offset {}, first linker member disagrees",
                name,
                offset
            ));
        }
        seen += 1;
    }

    if seen < symbols.len() {
        return Err(malformed_error!(
            "Second linker member lists {} symbols, first lists {}",
            seen,
            symbols.len()
        ));
    }

    Ok(())
}

/// A parsed archive borrowing its input.
#[derive(Debug, Clone)]
pub struct Archive<'a> {
    data: &'a [u8],
    members: Vec<Member<'a>>,
    special: Vec<Member<'a>>,
    symbols: SymbolMemberMap<'a>,
    first_linker: Option<FirstLinkerMember<'a>>,
    second_linker: Option<SecondLinkerMember<'a>>,
}

impl<'a> Archive<'a> {
    /// Read `data` with the default configuration.
    ///
    /// # Errors
    /// See [`ArchiveReader::read`].
    pub fn parse(data: &'a [u8]) -> Result<Archive<'a>> {
        ArchiveReader::default().read(data)
    }

    /// The archive bytes.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Regular members in archive order.
    #[must_use]
    pub fn members(&self) -> &[Member<'a>] {
        &self.members
    }

    /// Linker, long names and EC symbol members in archive order.
    #[must_use]
    pub fn special_members(&self) -> &[Member<'a>] {
        &self.special
    }

    /// The symbol index.
    #[must_use]
    pub fn symbol_member_map(&self) -> &SymbolMemberMap<'a> {
        &self.symbols
    }

    /// The decoded first linker member, if present.
    #[must_use]
    pub fn first_linker(&self) -> Option<&FirstLinkerMember<'a>> {
        self.first_linker.as_ref()
    }

    /// The decoded second linker member, if present.
    #[must_use]
    pub fn second_linker(&self) -> Option<&SecondLinkerMember<'a>> {
        self.second_linker.as_ref()
    }

    /// The member the index names for `symbol`.
    #[must_use]
    pub fn member_for_symbol(&self, symbol: &str) -> Option<&Member<'a>> {
        self.symbols
            .get(symbol)
            .and_then(|index| self.members.get(index))
    }

    /// Parse every regular member, one result per member in archive order.
    ///
    /// A member that fails to parse does not affect its siblings.
    #[must_use]
    pub fn parse_objects(&self) -> Vec<Result<ObjectFile<'a>>> {
        self.members.iter().map(Member::parse).collect()
    }

    /// [`Archive::parse_objects`] on the rayon thread pool.
    #[must_use]
    pub fn par_parse_objects(&self) -> Vec<Result<ObjectFile<'a>>> {
        self.members.par_iter().map(Member::parse).collect()
    }

    /// All short import records of the archive.
    ///
    /// Import records that fail to parse are logged and skipped.
    #[must_use]
    pub fn imports(&self) -> Vec<ImportObject<'a>> {
        self.members
            .iter()
            .filter(|member| ImportObject::is_import(member.content))
            .filter_map(|member| match ImportObject::parse(member.content) {
                Ok(import) => Some(import),
                Err(error) => {
                    warn!(member = member.name, offset = member.offset, %error, "skipping import record");
                    None
                }
            })
            .collect()
    }
}

#[self_referencing]
/// An archive together with the buffer or memory-mapped file it was read from.
///
/// Returned by [`ArchiveReader::read_file`] and [`ArchiveReader::read_mem`].
pub struct Library {
    /// The archive bytes
    data: Box<dyn Backend>,
    #[borrows(data)]
    #[covariant]
    /// The parsed archive, borrowing from `data`
    archive: Archive<'this>,
}

impl Library {
    /// The parsed archive.
    #[must_use]
    pub fn archive(&self) -> &Archive<'_> {
        self.borrow_archive()
    }

    /// The raw archive bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.borrow_data().data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        coff::{Machine, ObjectKind},
        test::factories::{short_import, ArchiveBuilder, CoffBuilder, SymbolSpec},
    };

    fn code_member(symbols: &[&str]) -> Vec<u8> {
        let mut builder = CoffBuilder::new(Machine::Amd64).text(&[0xC3; 8]);
        for symbol in symbols {
            builder = builder.symbol(SymbolSpec::function(symbol, 1, 0));
        }
        builder.build()
    }

    #[test]
    fn members_and_index() {
        let data = ArchiveBuilder::new()
            .member("foo.dll", short_import("Foo_Release", "foo.dll", Machine::Amd64))
            .member("foo_p.obj", code_member(&["Foo_QueryInterface", "Foo_AddRef"]))
            .symbol("Foo_Release", 0)
            .symbol("__imp_Foo_Release", 0)
            .symbol("Foo_QueryInterface", 1)
            .symbol("Foo_AddRef", 1)
            .build();

        let archive = Archive::parse(&data).unwrap();
        assert_eq!(archive.members().len(), 2);
        assert_eq!(archive.special_members().len(), 1);
        assert_eq!(archive.symbol_member_map().len(), 4);
        assert_eq!(archive.member_for_symbol("Foo_AddRef").unwrap().name, "foo_p.obj");

        for (_, index) in archive.symbol_member_map().iter() {
            assert!(index < archive.members().len());
        }

        let member = archive.member_for_symbol("Foo_QueryInterface").unwrap();
        assert_eq!(member.parse().unwrap().kind(), ObjectKind::Code);
        assert_eq!(archive.imports().len(), 1);
    }

    #[test]
    fn long_member_names_and_second_linker() {
        let data = ArchiveBuilder::new()
            .member("a_very_long_object_name.obj", code_member(&["Long_Method"]))
            .member("short.obj", code_member(&["Short_Method"]))
            .symbol("Long_Method", 0)
            .symbol("Short_Method", 1)
            .second_linker(true)
            .build();

        let archive = ArchiveReader::new(ArchiveConfig::strict()).read(&data).unwrap();
        assert_eq!(archive.members()[0].name, "a_very_long_object_name.obj");
        assert_eq!(archive.members()[1].name, "short.obj");
        assert!(archive.second_linker().is_some());

        let kinds: Vec<_> = archive.special_members().iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![MemberKind::FirstLinker, MemberKind::SecondLinker, MemberKind::LongNames]
        );
    }

    #[test]
    fn bad_signature() {
        assert!(Archive::parse(b"!<arc>\n").unwrap_err().is_format());
        assert!(matches!(
            Archive::parse(b"!<thin>\n"),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn truncated_member() {
        let mut data = ArchiveBuilder::new()
            .member("foo.obj", code_member(&["Foo_Bar"]))
            .symbol("Foo_Bar", 0)
            .build();
        data.truncate(data.len() - 10);
        assert!(Archive::parse(&data).unwrap_err().is_format());
    }

    #[test]
    fn duplicate_symbols() {
        let data = ArchiveBuilder::new()
            .member("a.obj", code_member(&["Dup"]))
            .member("b.obj", code_member(&["Dup"]))
            .symbol("Dup", 0)
            .symbol("Dup", 1)
            .build();

        assert!(Archive::parse(&data).unwrap_err().is_format());

        let archive = ArchiveReader::new(ArchiveConfig::lenient()).read(&data).unwrap();
        assert_eq!(archive.symbol_member_map().get("Dup"), Some(0));
    }

    #[test]
    fn missing_index() {
        let data = ArchiveBuilder::new()
            .member("a.obj", code_member(&["Foo"]))
            .without_index()
            .build();

        assert!(Archive::parse(&data).is_err());
        let archive = ArchiveReader::new(ArchiveConfig::lenient()).read(&data).unwrap();
        assert_eq!(archive.members().len(), 1);
        assert!(archive.symbol_member_map().is_empty());
    }

    #[test]
    fn corrupt_member_is_isolated() {
        let data = ArchiveBuilder::new()
            .member("good.obj", code_member(&["Good"]))
            .member("bad.obj", vec![0x64, 0x86, 0x01])
            .symbol("Good", 0)
            .build();

        let archive = Archive::parse(&data).unwrap();
        let results = archive.parse_objects();
        assert!(results[0].is_ok());
        assert!(results[1].as_ref().unwrap_err().is_format());

        let parallel = archive.par_parse_objects();
        assert_eq!(parallel.len(), 2);
        assert!(parallel[0].is_ok() && parallel[1].is_err());
    }

    #[test]
    fn owned_library() {
        let data = ArchiveBuilder::new()
            .member("foo.obj", code_member(&["Foo_Bar"]))
            .symbol("Foo_Bar", 0)
            .build();
        let len = data.len();

        let library = ArchiveReader::default().read_mem(data).unwrap();
        assert_eq!(library.data().len(), len);
        assert!(library.archive().member_for_symbol("Foo_Bar").is_some());
        assert!(matches!(
            ArchiveReader::default().read_mem(Vec::new()),
            Err(Error::Empty)
        ));
    }
}
