//! Builder for synthetic `.lib` archives with Microsoft linker members.

use crate::archive::{ARCHIVE_MAGIC, MEMBER_HEADER_SIZE};

/// Builds an archive: first linker member, optional second linker member, long names
/// member when needed, then the regular members.
pub struct ArchiveBuilder {
    members: Vec<(String, Vec<u8>)>,
    symbols: Vec<(String, usize)>,
    index: bool,
    second_linker: bool,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        ArchiveBuilder {
            members: Vec::new(),
            symbols: Vec::new(),
            index: true,
            second_linker: false,
        }
    }

    pub fn member(mut self, name: &str, content: Vec<u8>) -> Self {
        self.members.push((name.to_string(), content));
        self
    }

    /// Index `symbol` as defined by the member at position `member`
    pub fn symbol(mut self, symbol: &str, member: usize) -> Self {
        self.symbols.push((symbol.to_string(), member));
        self
    }

    pub fn second_linker(mut self, enabled: bool) -> Self {
        self.second_linker = enabled;
        self
    }

    pub fn without_index(mut self) -> Self {
        self.index = false;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let names_size: usize = self.symbols.iter().map(|(name, _)| name.len() + 1).sum();
        let first_size = 4 + 4 * self.symbols.len() + names_size;
        let second_size = 4 + 4 * self.members.len() + 4 + 2 * self.symbols.len() + names_size;

        let mut long_names = Vec::new();
        let mut header_names = Vec::new();
        for (name, _) in &self.members {
            if name.len() < 16 {
                header_names.push(format!("{name}/"));
            } else {
                header_names.push(format!("/{}", long_names.len()));
                long_names.extend_from_slice(name.as_bytes());
                long_names.push(0);
            }
        }

        let mut offset = ARCHIVE_MAGIC.len();
        if self.index {
            offset += padded(first_size);
            if self.second_linker {
                offset += padded(second_size);
            }
        }
        if !long_names.is_empty() {
            offset += padded(long_names.len());
        }

        let mut member_offsets = Vec::with_capacity(self.members.len());
        for (_, content) in &self.members {
            member_offsets.push(offset as u32);
            offset += padded(content.len());
        }

        let mut out = ARCHIVE_MAGIC.to_vec();
        if self.index {
            let mut first = (self.symbols.len() as u32).to_be_bytes().to_vec();
            for (_, member) in &self.symbols {
                first.extend_from_slice(&member_offsets[*member].to_be_bytes());
            }
            for (name, _) in &self.symbols {
                first.extend_from_slice(name.as_bytes());
                first.push(0);
            }
            push_member(&mut out, "/", &first);

            if self.second_linker {
                let mut sorted = self.symbols.clone();
                sorted.sort();

                let mut second = (self.members.len() as u32).to_le_bytes().to_vec();
                for member_offset in &member_offsets {
                    second.extend_from_slice(&member_offset.to_le_bytes());
                }
                second.extend_from_slice(&(sorted.len() as u32).to_le_bytes());
                for (_, member) in &sorted {
                    second.extend_from_slice(&(*member as u16 + 1).to_le_bytes());
                }
                for (name, _) in &sorted {
                    second.extend_from_slice(name.as_bytes());
                    second.push(0);
                }
                push_member(&mut out, "/", &second);
            }
        }

        if !long_names.is_empty() {
            push_member(&mut out, "//", &long_names);
        }

        for ((_, content), name) in self.members.iter().zip(&header_names) {
            push_member(&mut out, name, content);
        }

        out
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn padded(size: usize) -> usize {
    MEMBER_HEADER_SIZE + size + size % 2
}

/// The 60-byte header of a member named `name` (already encoded, e.g. `foo.dll/`)
pub fn member_header(name: &str, size: usize) -> Vec<u8> {
    let mut out = format!(
        "{name:<16}{:<12}{:<6}{:<6}{:<8}{size:<10}",
        "1700000000", "", "", "0"
    )
    .into_bytes();
    out.extend_from_slice(b"`\n");
    out
}

fn push_member(out: &mut Vec<u8>, name: &str, content: &[u8]) {
    out.extend_from_slice(&member_header(name, content.len()));
    out.extend_from_slice(content);
    if content.len() % 2 == 1 {
        out.push(b'\n');
    }
}
