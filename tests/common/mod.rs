//! Byte-level builders for the integration tests.
//!
//! Kept independent of the crate's own types so the tests check the parser against
//! hand-laid-out bytes.

#![allow(dead_code)]

pub const MACHINE_AMD64: u16 = 0x8664;

pub const SCN_CODE: u32 = 0x0000_0020 | 0x2000_0000 | 0x4000_0000;
pub const SCN_DATA: u32 = 0x0000_0040 | 0x4000_0000 | 0x8000_0000;

pub const CLASS_EXTERNAL: u8 = 2;
pub const TYPE_FUNCTION: u16 = 0x20;

/// One symbol table record without auxiliary records.
pub struct Sym<'a> {
    pub name: &'a str,
    pub value: u32,
    pub section: i16,
    pub typ: u16,
    pub class: u8,
}

impl<'a> Sym<'a> {
    pub fn function(name: &'a str, section: i16) -> Self {
        Sym {
            name,
            value: 0,
            section,
            typ: TYPE_FUNCTION,
            class: CLASS_EXTERNAL,
        }
    }

    pub fn data(name: &'a str, section: i16) -> Self {
        Sym {
            name,
            value: 0,
            section,
            typ: 0,
            class: CLASS_EXTERNAL,
        }
    }

    pub fn undefined(name: &'a str) -> Self {
        Sym {
            name,
            value: 0,
            section: 0,
            typ: 0,
            class: CLASS_EXTERNAL,
        }
    }
}

/// A COFF object: header, section table, raw data, symbols, string table.
///
/// `sections` are `(name, data, characteristics)`; names must fit in eight bytes.
pub fn coff(machine: u16, sections: &[(&str, &[u8], u32)], symbols: &[Sym<'_>]) -> Vec<u8> {
    let mut strings: Vec<u8> = Vec::new();
    let mut raw_offset = 20 + 40 * sections.len();

    let mut table = Vec::new();
    let mut raw = Vec::new();
    for (name, data, flags) in sections {
        let mut field = [0u8; 8];
        field[..name.len()].copy_from_slice(name.as_bytes());
        table.extend_from_slice(&field);
        table.extend_from_slice(&[0u8; 8]);
        table.extend_from_slice(&(data.len() as u32).to_le_bytes());
        table.extend_from_slice(&(raw_offset as u32).to_le_bytes());
        table.extend_from_slice(&[0u8; 12]);
        table.extend_from_slice(&flags.to_le_bytes());
        raw.extend_from_slice(data);
        raw_offset += data.len();
    }

    let mut symtab = Vec::new();
    for symbol in symbols {
        let mut field = [0u8; 8];
        if symbol.name.len() <= 8 {
            field[..symbol.name.len()].copy_from_slice(symbol.name.as_bytes());
        } else {
            let offset = 4 + strings.len() as u32;
            field[4..].copy_from_slice(&offset.to_le_bytes());
            strings.extend_from_slice(symbol.name.as_bytes());
            strings.push(0);
        }
        symtab.extend_from_slice(&field);
        symtab.extend_from_slice(&symbol.value.to_le_bytes());
        symtab.extend_from_slice(&symbol.section.to_le_bytes());
        symtab.extend_from_slice(&symbol.typ.to_le_bytes());
        symtab.push(symbol.class);
        symtab.push(0);
    }

    let mut out = Vec::new();
    out.extend_from_slice(&machine.to_le_bytes());
    out.extend_from_slice(&(sections.len() as u16).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(raw_offset as u32).to_le_bytes());
    out.extend_from_slice(&(symbols.len() as u32).to_le_bytes());
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&table);
    out.extend_from_slice(&raw);
    out.extend_from_slice(&symtab);
    out.extend_from_slice(&((strings.len() + 4) as u32).to_le_bytes());
    out.extend_from_slice(&strings);
    out
}

/// A short import record importing `symbol` by name from `dll`.
pub fn short_import(machine: u16, symbol: &str, dll: &str) -> Vec<u8> {
    let mut out = vec![0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00];
    out.extend_from_slice(&machine.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&((symbol.len() + dll.len() + 2) as u32).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    // IMPORT_OBJECT_CODE, IMPORT_OBJECT_NAME
    out.extend_from_slice(&(1u16 << 2).to_le_bytes());
    out.extend_from_slice(symbol.as_bytes());
    out.push(0);
    out.extend_from_slice(dll.as_bytes());
    out.push(0);
    out
}

fn header(name: &str, size: usize) -> Vec<u8> {
    let mut out = format!("{name:<16}{:<12}{:<6}{:<6}{:<8}{size:<10}", "0", "", "", "644")
        .into_bytes();
    out.extend_from_slice(b"`\n");
    out
}

fn push(out: &mut Vec<u8>, name: &str, content: &[u8]) {
    out.extend_from_slice(&header(name, content.len()));
    out.extend_from_slice(content);
    if content.len() % 2 == 1 {
        out.push(b'\n');
    }
}

/// An archive with a first linker member over `symbols` (name, member position) and the
/// given members; names of sixteen characters or more go through `//`.
pub fn archive(members: &[(&str, Vec<u8>)], symbols: &[(&str, usize)]) -> Vec<u8> {
    let padded = |size: usize| 60 + size + size % 2;

    let names: usize = symbols.iter().map(|(name, _)| name.len() + 1).sum();
    let index_size = 4 + 4 * symbols.len() + names;

    let mut long_names = Vec::new();
    let mut header_names = Vec::new();
    for (name, _) in members {
        if name.len() < 16 {
            header_names.push(format!("{name}/"));
        } else {
            header_names.push(format!("/{}", long_names.len()));
            long_names.extend_from_slice(name.as_bytes());
            long_names.extend_from_slice(b"/\n");
        }
    }

    let mut offset = 8 + padded(index_size);
    if !long_names.is_empty() {
        offset += padded(long_names.len());
    }
    let mut offsets = Vec::new();
    for (_, content) in members {
        offsets.push(offset as u32);
        offset += padded(content.len());
    }

    let mut index = (symbols.len() as u32).to_be_bytes().to_vec();
    for (_, member) in symbols {
        index.extend_from_slice(&offsets[*member].to_be_bytes());
    }
    for (name, _) in symbols {
        index.extend_from_slice(name.as_bytes());
        index.push(0);
    }

    let mut out = b"!<arch>\n".to_vec();
    push(&mut out, "/", &index);
    if !long_names.is_empty() {
        push(&mut out, "//", &long_names);
    }
    for ((_, content), name) in members.iter().zip(&header_names) {
        push(&mut out, name, content);
    }
    out
}
