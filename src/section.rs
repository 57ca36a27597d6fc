//! Sections: the link-time view of a file's contents.
//!
//! Grounded on the teacher crate's `header/section/mod.rs`, which defines
//! `ElfSectionHeaderType` as a closed-looking but actually open `#[repr(u32)]`
//! enum plus per-architecture extensions pulled in from `arch::*`. This crate
//! keeps the open-range shape (`open_enum!`) but drops the per-architecture
//! section-type variants — they're inspection detail the region-tree model
//! doesn't need to interpret, only preserve, and `Ext(raw)` already does that.

use bitflags::bitflags;

use crate::open_enum;

open_enum! {
    /// A section's type (`sh_type`).
    pub enum SectionType : u32 {
        /// Inactive; no associated section.
        Null = 0,
        /// Program-defined contents (code, data, ...).
        ProgBits = 1,
        /// A symbol table.
        SymTab = 2,
        /// A string table.
        StrTab = 3,
        /// Relocation entries with explicit addends.
        Rela = 4,
        /// A symbol hash table.
        Hash = 5,
        /// Dynamic linking information.
        Dynamic = 6,
        /// Auxiliary information (notes).
        Note = 7,
        /// Occupies no file space (e.g. `.bss`).
        NoBits = 8,
        /// Relocation entries without explicit addends.
        Rel = 9,
        /// Reserved, unspecified semantics.
        ShLib = 10,
        /// A minimal symbol table for dynamic linking.
        DynSym = 11,
    }
}

bitflags! {
    /// A section's flags (`sh_flags`). Stored as a 64-bit word regardless of
    /// class; 32-bit files simply never set the high bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SectionFlags: u64 {
        /// Writable at runtime.
        const WRITE = 0x1;
        /// Occupies memory during execution.
        const ALLOC = 0x2;
        /// Executable machine instructions.
        const EXECINSTR = 0x4;
        /// Might be merged to eliminate duplication.
        const MERGE = 0x10;
        /// Contains null-terminated strings.
        const STRINGS = 0x20;
        /// `sh_info` holds a section header table index.
        const INFO_LINK = 0x40;
        /// Preserve order after combining.
        const LINK_ORDER = 0x80;
        /// OS-specific handling required.
        const OS_NONCONFORMING = 0x100;
        /// Member of a section group.
        const GROUP = 0x200;
        /// Holds thread-local storage.
        const TLS = 0x400;
    }
}

/// Reserved values of a symbol's section-index field (`st_shndx`), per the
/// `SHN_*` constants. Modeled as a tagged variant rather than a bare integer
/// so the processor- and OS-reserved ranges are distinguishable from an
/// ordinary section index, per the design notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionIndex {
    /// `SHN_UNDEF` (0): undefined, missing, or irrelevant section reference.
    Undef,
    /// The first processor-reserved index (`SHN_LOPROC`, 0xff00).
    LoProc,
    /// A processor-reserved index strictly between `LOPROC` and `HIPROC`.
    CustomProc(u16),
    /// The last processor-reserved index (`SHN_HIPROC`, 0xff1f).
    HiProc,
    /// The first OS-reserved index (`SHN_LOOS`, 0xff20).
    LoOs,
    /// An OS-reserved index strictly between `LOOS` and `HIOS`.
    CustomOs(u16),
    /// The last OS-reserved index (`SHN_HIOS`, 0xff3f).
    HiOs,
    /// `SHN_ABS` (0xfff1): the corresponding symbol has an absolute value.
    Abs,
    /// `SHN_COMMON` (0xfff2): the symbol labels a common block that hasn't been allocated.
    Common,
    /// An ordinary 1-based index into the section header table.
    Index(u16),
}

impl SectionIndex {
    const LOPROC: u16 = 0xff00;
    const HIPROC: u16 = 0xff1f;
    const LOOS: u16 = 0xff20;
    const HIOS: u16 = 0xff3f;
    const ABS: u16 = 0xfff1;
    const COMMON: u16 = 0xfff2;

    /// Decode a raw 16-bit `st_shndx`/`sh_link` value into its reserved-range tag.
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => Self::Undef,
            Self::LOPROC => Self::LoProc,
            Self::HIPROC => Self::HiProc,
            Self::LOOS => Self::LoOs,
            Self::HIOS => Self::HiOs,
            Self::ABS => Self::Abs,
            Self::COMMON => Self::Common,
            v if v > Self::LOPROC && v < Self::HIPROC => Self::CustomProc(v),
            v if v > Self::LOOS && v < Self::HIOS => Self::CustomOs(v),
            v => Self::Index(v),
        }
    }

    /// Encode back to the raw 16-bit wire value.
    pub fn to_raw(self) -> u16 {
        match self {
            Self::Undef => 0,
            Self::LoProc => Self::LOPROC,
            Self::CustomProc(v) => v,
            Self::HiProc => Self::HIPROC,
            Self::LoOs => Self::LOOS,
            Self::CustomOs(v) => v,
            Self::HiOs => Self::HIOS,
            Self::Abs => Self::ABS,
            Self::Common => Self::COMMON,
            Self::Index(v) => v,
        }
    }

    /// A [`Display`](std::fmt::Display) view of this index that resolves
    /// machine- and OS/ABI-gated reserved-range aliases (`LCOMMON`,
    /// `SCOMMON`, ...) via [`crate::arch::processor_reserved_alias`], falling
    /// back to a generic range label when no alias applies.
    pub fn display(self, machine: crate::machine::Machine, os_abi: crate::ident::ElfOsAbi) -> SectionIndexDisplay {
        SectionIndexDisplay { index: self, machine, os_abi }
    }
}

/// Renders a [`SectionIndex`] with machine/OS-gated reserved-range aliases
/// resolved, as returned by [`SectionIndex::display`].
pub struct SectionIndexDisplay {
    index: SectionIndex,
    machine: crate::machine::Machine,
    os_abi: crate::ident::ElfOsAbi,
}

impl std::fmt::Display for SectionIndexDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(alias) = crate::arch::processor_reserved_alias(self.index, self.machine, self.os_abi) {
            return write!(f, "{alias}");
        }
        match self.index {
            SectionIndex::Undef => write!(f, "UND"),
            SectionIndex::Abs => write!(f, "ABS"),
            SectionIndex::Common => write!(f, "COMMON"),
            SectionIndex::LoProc | SectionIndex::CustomProc(_) | SectionIndex::HiProc => {
                write!(f, "PROC({:#x})", self.index.to_raw())
            }
            SectionIndex::LoOs | SectionIndex::CustomOs(_) | SectionIndex::HiOs => {
                write!(f, "OS({:#x})", self.index.to_raw())
            }
            SectionIndex::Index(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A section: a named chunk of file content with a type, flags, and
/// cross-references to other sections or symbols.
pub struct Section {
    /// The section's name, resolved from the section-name table at parse time.
    pub name: String,
    /// The section's type.
    pub sh_type: SectionType,
    /// The section's flags.
    pub flags: SectionFlags,
    /// Virtual address at which the first byte of the section resides, if
    /// the section is to appear in memory (else 0).
    pub addr: u64,
    /// The nominal size of the section, in bytes. For `SHT_NOBITS` sections
    /// this may be nonzero even though no file bytes are resident.
    pub size: u64,
    /// A section-type-dependent cross-reference, typically a section index.
    pub link: u32,
    /// A section-type-dependent cross-reference, typically extra interpretation flags.
    pub info: u32,
    /// Required alignment; must be zero or a power of two.
    pub addralign: u64,
    /// Size of each fixed-size entry if this section holds a table, else 0.
    pub entsize: u64,
    /// The section's file-resident content. Empty for `SHT_NOBITS`.
    pub contents: Vec<u8>,
}

impl Section {
    /// The number of bytes this section actually occupies in the file.
    ///
    /// Per §3.4: for `SHT_NOBITS` this is always zero regardless of the
    /// nominal `size`; for every other type it equals `contents.len()`.
    pub fn file_size(&self) -> usize {
        if self.sh_type == SectionType::NoBits {
            0
        } else {
            self.contents.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::ElfOsAbi;
    use crate::machine::Machine;

    #[test]
    fn display_resolves_machine_gated_alias() {
        let index = SectionIndex::from_raw(0xff02);
        assert_eq!(index.display(Machine::X86_64, ElfOsAbi::SystemV).to_string(), "LCOMMON");
    }

    #[test]
    fn display_falls_back_to_generic_label_without_an_alias() {
        let index = SectionIndex::from_raw(0xff08);
        assert_eq!(index.display(Machine::X86_64, ElfOsAbi::SystemV).to_string(), "PROC(0xff08)");
        assert_eq!(SectionIndex::Undef.display(Machine::X86_64, ElfOsAbi::SystemV).to_string(), "UND");
        assert_eq!(SectionIndex::Index(3).display(Machine::X86_64, ElfOsAbi::SystemV).to_string(), "3");
    }

    #[test]
    fn section_index_reserved_ranges() {
        assert_eq!(SectionIndex::from_raw(0), SectionIndex::Undef);
        assert_eq!(SectionIndex::from_raw(0xfff1), SectionIndex::Abs);
        assert_eq!(SectionIndex::from_raw(0xfff2), SectionIndex::Common);
        assert_eq!(SectionIndex::from_raw(0xff00), SectionIndex::LoProc);
        assert_eq!(SectionIndex::from_raw(0xff1f), SectionIndex::HiProc);
        assert_eq!(SectionIndex::from_raw(0xff08), SectionIndex::CustomProc(0xff08));
        assert_eq!(SectionIndex::from_raw(0xff20), SectionIndex::LoOs);
        assert_eq!(SectionIndex::from_raw(0xff3f), SectionIndex::HiOs);
        assert_eq!(SectionIndex::from_raw(0xff30), SectionIndex::CustomOs(0xff30));
        assert_eq!(SectionIndex::from_raw(5), SectionIndex::Index(5));
    }

    #[test]
    fn section_index_round_trips() {
        for raw in [0u16, 1, 0xff00, 0xff08, 0xff1f, 0xff20, 0xff30, 0xff3f, 0xfff1, 0xfff2, 9000] {
            assert_eq!(SectionIndex::from_raw(raw).to_raw(), raw);
        }
    }

    #[test]
    fn nobits_has_zero_file_size_even_with_nonzero_nominal_size() {
        let section = Section {
            name: ".bss".into(),
            sh_type: SectionType::NoBits,
            flags: SectionFlags::ALLOC | SectionFlags::WRITE,
            addr: 0x1000,
            size: 256,
            link: 0,
            info: 0,
            addralign: 8,
            entsize: 0,
            contents: Vec::new(),
        };
        assert_eq!(section.file_size(), 0);
    }

    #[test]
    fn progbits_file_size_matches_contents() {
        let section = Section {
            name: ".text".into(),
            sh_type: SectionType::ProgBits,
            flags: SectionFlags::ALLOC | SectionFlags::EXECINSTR,
            addr: 0,
            size: 4,
            link: 0,
            info: 0,
            addralign: 16,
            entsize: 0,
            contents: vec![0x90, 0x90, 0x90, 0xc3],
        };
        assert_eq!(section.file_size(), 4);
    }
}
