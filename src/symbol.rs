//! The symbol-table view: a typed projection of `SHT_SYMTAB` section bytes,
//! derived from the region tree on demand rather than stored in it (§3.6).
//!
//! Grounded on the teacher crate's convention of pairing a closed enum
//! (here, [`SymbolBinding`], which rejects unrecognized values per §4.7)
//! against an open one ([`SymbolType`], which preserves them). The 32-bit
//! and 64-bit symbol record layouts differ in field order (§4.7), which this
//! module accounts for explicitly rather than overlaying one struct on both.

use crate::error::Error;
use crate::ident::ElfClass;
use crate::open_enum;
use crate::primitive::Endian;
use crate::region::Elf;
use crate::section::{Section, SectionIndex, SectionType};
use crate::strtab;

open_enum! {
    /// A symbol's type (the low nibble of `st_info`).
    pub enum SymbolType : u8 {
        /// Type not specified.
        NoType = 0,
        /// Associated with a data object.
        Object = 1,
        /// Associated with a function or executable code.
        Func = 2,
        /// Associated with a section; typically for relocation.
        Section = 3,
        /// Gives the name of the source file.
        File = 4,
        /// Labels an uninitialized common block.
        Common = 5,
        /// Associated with a thread-local storage entity.
        Tls = 6,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// A symbol's binding (the high nibble of `st_info`).
///
/// Unlike [`SymbolType`], this is treated as a genuinely closed set per
/// §4.7: an unrecognized binding nibble is a decode error ([`Error::BadSymbol`]),
/// not a value to preserve.
pub enum SymbolBinding {
    /// Not visible outside the object file.
    Local,
    /// Visible to all object files being combined.
    Global,
    /// Global, but with lower precedence than an ordinary global symbol.
    Weak,
}

impl SymbolBinding {
    /// Decode the high nibble of `st_info`.
    ///
    /// The source's split used `(info & 0xF) >> 4`, which always yields
    /// zero; the correct expression is `info >> 4` (see design notes).
    pub fn from_info(info: u8) -> Result<Self, Error> {
        match info >> 4 {
            0 => Ok(Self::Local),
            1 => Ok(Self::Global),
            2 => Ok(Self::Weak),
            other => Err(Error::BadSymbol { found: other }),
        }
    }

    fn to_nibble(self) -> u8 {
        match self {
            Self::Local => 0,
            Self::Global => 1,
            Self::Weak => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One entry of a symbol table.
pub struct Symbol {
    /// The symbol's name, resolved against the associated string table.
    pub name: String,
    /// The raw name-table byte offset this symbol was decoded with.
    pub name_index: u32,
    /// The symbol's type.
    pub sym_type: SymbolType,
    /// The symbol's binding.
    pub bind: SymbolBinding,
    /// Symbol visibility and other processor-specific flags (`st_other`).
    pub other: u8,
    /// The symbol's section-index field, with reserved-range semantics.
    pub section_index: SectionIndex,
    /// The index into the enclosing `Elf::sections()` list this symbol is
    /// defined in, if `section_index` names an ordinary section (not a
    /// reserved range) and that index is in bounds.
    pub section: Option<usize>,
    /// The symbol's value (often a virtual address).
    pub value: u64,
    /// The symbol's size in bytes, if known.
    pub size: u64,
}

impl Symbol {
    fn info_byte(&self) -> u8 {
        (self.bind.to_nibble() << 4) | (self.sym_type.to_raw() & 0x0F)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// All symbols decoded from one `SHT_SYMTAB` section.
pub struct ParsedSymbolTable {
    /// Index into `Elf::sections()` of the `SHT_SYMTAB` section these
    /// symbols came from.
    pub section: usize,
    /// Index into `Elf::sections()` of the associated string table
    /// (`sh_link`), if it resolved to an in-bounds section.
    pub strtab_section: Option<usize>,
    /// The decoded symbols, in file order.
    pub symbols: Vec<Symbol>,
}

const SYM32_SIZE: usize = 16;
const SYM64_SIZE: usize = 24;

/// Parses the symbol-table view out of a region tree.
pub struct SymbolTableView;

impl SymbolTableView {
    /// Decode every `SHT_SYMTAB` section in `elf` into its typed symbol list.
    pub fn parse_symbol_tables(elf: &Elf) -> Result<Vec<ParsedSymbolTable>, Error> {
        let sections = elf.sections();
        let endian = elf.data.endian();
        let mut tables = Vec::new();
        for (idx, section) in sections.iter().enumerate() {
            if section.sh_type != SectionType::SymTab {
                continue;
            }
            let strtab_section = resolve_link(&sections, section.link);
            let strtab_bytes: &[u8] = strtab_section
                .and_then(|i| sections.get(i))
                .map(|s| s.contents.as_slice())
                .unwrap_or(&[]);
            let symbols = parse_symbols(elf.class, endian, &section.contents, strtab_bytes, &sections)?;
            tables.push(ParsedSymbolTable { section: idx, strtab_section, symbols });
        }
        Ok(tables)
    }
}

/// `sh_link` is a 1-based index into the section list; 0 or out-of-range
/// means "no associated section".
fn resolve_link(sections: &[Section], link: u32) -> Option<usize> {
    if link == 0 {
        return None;
    }
    let idx = (link - 1) as usize;
    if idx < sections.len() {
        Some(idx)
    } else {
        None
    }
}

fn parse_symbols(
    class: ElfClass,
    endian: Endian,
    contents: &[u8],
    strtab_bytes: &[u8],
    sections: &[Section],
) -> Result<Vec<Symbol>, Error> {
    let entry_size = match class {
        ElfClass::Elf32 => SYM32_SIZE,
        ElfClass::Elf64 => SYM64_SIZE,
    };
    if entry_size == 0 {
        return Ok(Vec::new());
    }
    let count = contents.len() / entry_size;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let base = i * entry_size;
        let (name_index, info, other, shndx, value, size) = match class {
            ElfClass::Elf32 => {
                let name_index = endian.read_u32(contents, base)?;
                let value = endian.read_u32(contents, base + 4)? as u64;
                let size = endian.read_u32(contents, base + 8)? as u64;
                let info = contents[base + 12];
                let other = contents[base + 13];
                let shndx = endian.read_u16(contents, base + 14)?;
                (name_index, info, other, shndx, value, size)
            }
            ElfClass::Elf64 => {
                let name_index = endian.read_u32(contents, base)?;
                let info = contents[base + 4];
                let other = contents[base + 5];
                let shndx = endian.read_u16(contents, base + 6)?;
                let value = endian.read_u64(contents, base + 8)?;
                let size = endian.read_u64(contents, base + 16)?;
                (name_index, info, other, shndx, value, size)
            }
        };
        let sym_type = SymbolType::from_raw(info & 0x0F);
        let bind = SymbolBinding::from_info(info)?;
        let section_index = SectionIndex::from_raw(shndx);
        let section = match section_index {
            SectionIndex::Index(n) if n > 0 => {
                let idx = (n - 1) as usize;
                if idx < sections.len() { Some(idx) } else { None }
            }
            _ => None,
        };
        let name = String::from_utf8_lossy(strtab::lookup(strtab_bytes, name_index as usize)).into_owned();
        out.push(Symbol {
            name,
            name_index,
            sym_type,
            bind,
            other,
            section_index,
            section,
            value,
            size,
        });
    }
    Ok(out)
}

/// The byte slice `sections[symbol.section].contents[value..value+size]`,
/// or `None` if the enclosing section is absent, the symbol has zero size,
/// or the range exceeds the section's bounds (§4.7).
pub fn find_definition<'a>(symbol: &Symbol, sections: &'a [Section]) -> Option<&'a [u8]> {
    let section = sections.get(symbol.section?)?;
    if symbol.size == 0 {
        return None;
    }
    let start = usize::try_from(symbol.value).ok()?;
    let len = usize::try_from(symbol.size).ok()?;
    let end = start.checked_add(len)?;
    section.contents.get(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::{DataEncoding, ElfClass, ElfOsAbi};
    use crate::machine::Machine;
    use crate::region::DataRegion;
    use crate::section::{SectionFlags, SectionType};

    fn sym64_bytes(name: u32, info: u8, other: u8, shndx: u16, value: u64, size: u64) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&name.to_le_bytes());
        v.push(info);
        v.push(other);
        v.extend_from_slice(&shndx.to_le_bytes());
        v.extend_from_slice(&value.to_le_bytes());
        v.extend_from_slice(&size.to_le_bytes());
        v
    }

    #[test]
    fn binding_split_uses_high_nibble() {
        // info = 0x12 -> type 2 (STT_FUNC), bind 1 (STB_GLOBAL).
        assert_eq!(SymbolBinding::from_info(0x12).unwrap(), SymbolBinding::Global);
        assert_eq!(SymbolType::from_raw(0x12 & 0x0F), SymbolType::Func);
    }

    #[test]
    fn unrecognized_binding_errors() {
        assert_eq!(
            SymbolBinding::from_info(0xF0).unwrap_err(),
            Error::BadSymbol { found: 0xF }
        );
    }

    #[test]
    fn find_definition_returns_expected_slice() {
        let section = Section {
            name: ".data".into(),
            sh_type: SectionType::ProgBits,
            flags: SectionFlags::ALLOC,
            addr: 0,
            size: 10,
            link: 0,
            info: 0,
            addralign: 1,
            entsize: 0,
            contents: b"ABCDEFGHIJ".to_vec(),
        };
        let symbol = Symbol {
            name: "s".into(),
            name_index: 0,
            sym_type: SymbolType::Object,
            bind: SymbolBinding::Global,
            other: 0,
            section_index: SectionIndex::Index(1),
            section: Some(0),
            value: 4,
            size: 6,
        };
        assert_eq!(find_definition(&symbol, &[section.clone()]), Some(b"EFGHIJ".as_slice()));

        let zero_size = Symbol { size: 0, ..symbol };
        assert_eq!(find_definition(&zero_size, &[section]), None);
    }

    #[test]
    fn parses_three_symbols_with_resolved_names() {
        let strtab_bytes = {
            let (bytes, _) = strtab::build(&["foo", "bar", "baz"]);
            bytes
        };
        let (_, map) = strtab::build(&["foo", "bar", "baz"]);
        let mut contents = Vec::new();
        contents.extend(sym64_bytes(0, 0, 0, 0, 0, 0)); // STN_UNDEF entry
        contents.extend(sym64_bytes(map["foo"], 0x12, 0, 1, 0x1000, 4)); // STT_FUNC, STB_GLOBAL
        contents.extend(sym64_bytes(map["bar"], 0x01, 0, 1, 0x2000, 8)); // STT_OBJECT, STB_LOCAL

        let strtab_section = Section {
            name: ".strtab".into(),
            sh_type: SectionType::StrTab,
            flags: SectionFlags::empty(),
            addr: 0,
            size: strtab_bytes.len() as u64,
            link: 0,
            info: 0,
            addralign: 1,
            entsize: 0,
            contents: strtab_bytes,
        };
        let code_section = Section {
            name: ".text".into(),
            sh_type: SectionType::ProgBits,
            flags: SectionFlags::ALLOC | SectionFlags::EXECINSTR,
            addr: 0x1000,
            size: 0x1000,
            link: 0,
            info: 0,
            addralign: 16,
            entsize: 0,
            contents: vec![0; 0x1000],
        };
        let symtab_section = Section {
            name: ".symtab".into(),
            sh_type: SectionType::SymTab,
            flags: SectionFlags::empty(),
            addr: 0,
            size: contents.len() as u64,
            link: 2, // 1-based: sections[1] == .strtab
            info: 0,
            addralign: 8,
            entsize: SYM64_SIZE as u64,
            contents,
        };

        let elf = Elf {
            class: ElfClass::Elf64,
            data: DataEncoding::Lsb,
            version: 1,
            os_abi: ElfOsAbi::SystemV,
            abi_version: 0,
            ty: crate::ident::ObjectType::Relocatable,
            machine: Machine::X86_64,
            entry: 0,
            flags: 0,
            regions: vec![
                DataRegion::Section(code_section),
                DataRegion::Section(strtab_section),
                DataRegion::Section(symtab_section),
            ],
        };

        let tables = SymbolTableView::parse_symbol_tables(&elf).unwrap();
        assert_eq!(tables.len(), 1);
        let symbols = &tables[0].symbols;
        assert_eq!(symbols.len(), 3);
        assert_eq!(symbols[1].name, "foo");
        assert_eq!(symbols[1].sym_type, SymbolType::Func);
        assert_eq!(symbols[1].bind, SymbolBinding::Global);
        assert_eq!(symbols[2].name, "bar");
    }
}
