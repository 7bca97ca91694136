//! Byte-level builders for synthetic COFF objects and short import records.

use crate::coff::{Machine, SectionFlags};

/// A symbol record to emit.
#[derive(Debug, Clone)]
pub struct SymbolSpec {
    pub name: String,
    pub value: u32,
    pub section: i16,
    pub typ: u16,
    pub class: u8,
    pub aux: u8,
}

impl SymbolSpec {
    /// External function defined at `offset` in section `section`
    pub fn function(name: &str, section: i16, offset: u32) -> Self {
        SymbolSpec {
            name: name.to_string(),
            value: offset,
            section,
            typ: 0x20,
            class: 2,
            aux: 0,
        }
    }

    /// External data symbol
    pub fn data(name: &str, section: i16, value: u32) -> Self {
        SymbolSpec {
            name: name.to_string(),
            value,
            section,
            typ: 0,
            class: 2,
            aux: 0,
        }
    }

    /// Undefined external reference
    pub fn external(name: &str) -> Self {
        SymbolSpec {
            name: name.to_string(),
            value: 0,
            section: 0,
            typ: 0x20,
            class: 2,
            aux: 0,
        }
    }

    /// Static (file local) symbol, e.g. a section symbol
    pub fn local(name: &str, section: i16) -> Self {
        SymbolSpec {
            name: name.to_string(),
            value: 0,
            section,
            typ: 0,
            class: 3,
            aux: 0,
        }
    }

    pub fn with_aux(mut self, count: u8) -> Self {
        self.aux = count;
        self
    }
}

/// Builds a COFF object: header, section table, raw data, symbol table, string table.
pub struct CoffBuilder {
    machine: Machine,
    sections: Vec<(String, Vec<u8>, SectionFlags)>,
    symbols: Vec<SymbolSpec>,
}

impl CoffBuilder {
    pub fn new(machine: Machine) -> Self {
        CoffBuilder {
            machine,
            sections: Vec::new(),
            symbols: Vec::new(),
        }
    }

    /// Adds an executable `.text` section
    pub fn text(self, code: &[u8]) -> Self {
        self.section(
            ".text",
            code,
            SectionFlags::CNT_CODE | SectionFlags::MEM_EXECUTE | SectionFlags::MEM_READ,
        )
    }

    pub fn section(mut self, name: &str, data: &[u8], flags: SectionFlags) -> Self {
        self.sections.push((name.to_string(), data.to_vec(), flags));
        self
    }

    pub fn symbol(mut self, symbol: SymbolSpec) -> Self {
        self.symbols.push(symbol);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut strings = StringTableBuilder::default();

        let section_table = 20;
        let mut raw_offset = section_table + self.sections.len() * 40;
        let mut table = Vec::new();
        let mut raw = Vec::new();
        for (name, data, flags) in &self.sections {
            table.extend_from_slice(&strings.section_name(name));
            table.extend_from_slice(&0u32.to_le_bytes());
            table.extend_from_slice(&0u32.to_le_bytes());
            table.extend_from_slice(&(data.len() as u32).to_le_bytes());
            let pointer = if data.is_empty() { 0 } else { raw_offset as u32 };
            table.extend_from_slice(&pointer.to_le_bytes());
            table.extend_from_slice(&0u32.to_le_bytes());
            table.extend_from_slice(&0u32.to_le_bytes());
            table.extend_from_slice(&0u16.to_le_bytes());
            table.extend_from_slice(&0u16.to_le_bytes());
            table.extend_from_slice(&flags.bits().to_le_bytes());
            raw.extend_from_slice(data);
            raw_offset += data.len();
        }

        let mut symtab = Vec::new();
        let mut records = 0u32;
        for symbol in &self.symbols {
            symtab.extend_from_slice(&strings.symbol_name(&symbol.name));
            symtab.extend_from_slice(&symbol.value.to_le_bytes());
            symtab.extend_from_slice(&symbol.section.to_le_bytes());
            symtab.extend_from_slice(&symbol.typ.to_le_bytes());
            symtab.push(symbol.class);
            symtab.push(symbol.aux);
            symtab.extend(std::iter::repeat(0u8).take(usize::from(symbol.aux) * 18));
            records += 1 + u32::from(symbol.aux);
        }

        let symbol_pointer = if records == 0 { 0 } else { raw_offset as u32 };

        let mut out = Vec::new();
        out.extend_from_slice(&(self.machine as u16).to_le_bytes());
        out.extend_from_slice(&(self.sections.len() as u16).to_le_bytes());
        out.extend_from_slice(&0x6500_0000u32.to_le_bytes());
        out.extend_from_slice(&symbol_pointer.to_le_bytes());
        out.extend_from_slice(&records.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&table);
        out.extend_from_slice(&raw);
        out.extend_from_slice(&symtab);
        out.extend_from_slice(&strings.finish());
        out
    }
}

#[derive(Default)]
struct StringTableBuilder {
    data: Vec<u8>,
}

impl StringTableBuilder {
    fn add(&mut self, name: &str) -> u32 {
        let offset = 4 + self.data.len() as u32;
        self.data.extend_from_slice(name.as_bytes());
        self.data.push(0);
        offset
    }

    fn symbol_name(&mut self, name: &str) -> [u8; 8] {
        let mut field = [0u8; 8];
        if name.len() <= 8 {
            field[..name.len()].copy_from_slice(name.as_bytes());
        } else {
            let offset = self.add(name);
            field[4..].copy_from_slice(&offset.to_le_bytes());
        }
        field
    }

    fn section_name(&mut self, name: &str) -> [u8; 8] {
        let mut field = [0u8; 8];
        if name.len() <= 8 {
            field[..name.len()].copy_from_slice(name.as_bytes());
        } else {
            let reference = format!("/{}", self.add(name));
            field[..reference.len()].copy_from_slice(reference.as_bytes());
        }
        field
    }

    fn finish(&self) -> Vec<u8> {
        let mut out = ((self.data.len() + 4) as u32).to_le_bytes().to_vec();
        out.extend_from_slice(&self.data);
        out
    }
}

/// A short import record for a code symbol, imported by name.
pub fn short_import(symbol: &str, dll: &str, machine: Machine) -> Vec<u8> {
    let mut out = vec![0x00, 0x00, 0xFF, 0xFF];
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(machine as u16).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&((symbol.len() + dll.len() + 2) as u32).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(1u16 << 2).to_le_bytes());
    out.extend_from_slice(symbol.as_bytes());
    out.push(0);
    out.extend_from_slice(dll.as_bytes());
    out.push(0);
    out
}
