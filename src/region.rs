//! The region tree: the central data structure unifying the section (link-time)
//! and segment (load-time) views of an ELF file into one in-order sequence.
//!
//! Grounded on the teacher crate's "lens-style traversal" shape generalized
//! per the design notes into explicit visitor functions: [`Elf::sections`]
//! materializes the in-order list of sections (including the synthetic
//! `.shstrtab` placeholder), [`Elf::map_sections`] is the delete-by-`None`
//! filter/map operator, and [`Elf::find_section`]/[`Elf::remove_section`] are
//! derived from the same traversal, per §4.4.

use std::collections::HashMap;

use crate::ident::{DataEncoding, ElfClass, ElfOsAbi, ObjectType};
use crate::machine::Machine;
use crate::section::{Section, SectionFlags, SectionType};
use crate::segment::Segment;

#[derive(Debug, Clone, PartialEq, Eq)]
/// One node of the region tree.
///
/// There is exactly one [`DataRegion::ElfHeader`], one
/// [`DataRegion::SegmentHeaders`], one [`DataRegion::SectionHeaders`], and
/// one [`DataRegion::SectionNameTable`] across the whole tree (§3.2); the
/// renderer enforces this by construction rather than by runtime check, so
/// callers who hand-build an `Elf` are responsible for the invariant.
pub enum DataRegion {
    /// Placeholder for the fixed-size ELF header.
    ElfHeader,
    /// Placeholder for the program-header table.
    SegmentHeaders,
    /// Placeholder for the section-header table.
    SectionHeaders,
    /// Placeholder for the `.shstrtab` section; its contents are regenerated
    /// from the current set of section names at render time.
    SectionNameTable,
    /// A program segment, containing a nested region sequence.
    Segment(Segment),
    /// A section.
    Section(Section),
    /// Opaque bytes claimed by neither a section nor a header table.
    Raw(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A quick profile of an `Elf`'s shape, returned by [`Elf::summary`].
pub struct Summary {
    /// The file's class.
    pub class: ElfClass,
    /// The file's target machine.
    pub machine: Machine,
    /// Number of sections in the tree, including the synthetic `.shstrtab`.
    pub section_count: usize,
    /// Number of top-level and nested segments in the tree.
    pub segment_count: usize,
    /// Number of `SHT_SYMTAB` sections present.
    pub symtab_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A parsed, editable ELF file image.
pub struct Elf {
    /// 32-bit vs 64-bit address width.
    pub class: ElfClass,
    /// Byte order of multi-byte fields.
    pub data: DataEncoding,
    /// Format version; always 1 for files this crate can parse.
    pub version: u8,
    /// OS/ABI extension in use, if any.
    pub os_abi: ElfOsAbi,
    /// ABI version, interpreted relative to `os_abi`.
    pub abi_version: u8,
    /// The object file's type.
    pub ty: ObjectType,
    /// The target machine.
    pub machine: Machine,
    /// The entry point virtual address.
    pub entry: u64,
    /// Processor-specific flags.
    pub flags: u32,
    /// The ordered region sequence.
    pub regions: Vec<DataRegion>,
}

impl Elf {
    /// Build the `.shstrtab` contents and name -> offset map from the
    /// current set of section names in the tree, per §4.3. This always
    /// includes an entry for `.shstrtab` itself, at whatever point the
    /// [`DataRegion::SectionNameTable`] placeholder occupies in the tree.
    pub fn build_name_table(&self) -> (Vec<u8>, HashMap<String, u32>) {
        let mut names = Vec::new();
        collect_names(&self.regions, &mut names);
        crate::strtab::build(&names)
    }

    /// The in-order list of sections, including a materialized `.shstrtab`
    /// section wherever [`DataRegion::SectionNameTable`] occurs.
    pub fn sections(&self) -> Vec<Section> {
        let (name_table, _) = self.build_name_table();
        let mut out = Vec::new();
        collect_sections(&self.regions, &name_table, &mut out);
        out
    }

    /// Find a section by name, including the synthetic `.shstrtab`.
    pub fn find_section(&self, name: &str) -> Option<Section> {
        self.sections().into_iter().find(|s| s.name == name)
    }

    /// Remove every [`DataRegion::Section`] (at any depth) with the given
    /// name. Returns `true` if any section was removed. The synthetic
    /// `.shstrtab` placeholder cannot be removed this way since it is not a
    /// `DataRegion::Section` node.
    pub fn remove_section(&mut self, name: &str) -> bool {
        remove_named(&mut self.regions, name)
    }

    /// Apply `f` to every section in the tree, at any depth. A section for
    /// which `f` returns `None` is deleted from the tree.
    pub fn map_sections(&mut self, mut f: impl FnMut(Section) -> Option<Section>) {
        map_sections_in(&mut self.regions, &mut f);
    }

    /// Total number of segments in the tree, including ones nested inside
    /// other segments.
    pub fn segment_count(&self) -> usize {
        count_segments(&self.regions)
    }

    /// A quick profile of this file's shape.
    pub fn summary(&self) -> Summary {
        let sections = self.sections();
        Summary {
            class: self.class,
            machine: self.machine,
            section_count: sections.len(),
            segment_count: self.segment_count(),
            symtab_count: sections.iter().filter(|s| s.sh_type == SectionType::SymTab).count(),
        }
    }
}

fn collect_names(regions: &[DataRegion], names: &mut Vec<String>) {
    for region in regions {
        match region {
            DataRegion::Section(s) => names.push(s.name.clone()),
            DataRegion::SectionNameTable => names.push(".shstrtab".to_string()),
            DataRegion::Segment(seg) => collect_names(&seg.regions, names),
            DataRegion::ElfHeader
            | DataRegion::SegmentHeaders
            | DataRegion::SectionHeaders
            | DataRegion::Raw(_) => {}
        }
    }
}

fn collect_sections(regions: &[DataRegion], name_table: &[u8], out: &mut Vec<Section>) {
    for region in regions {
        match region {
            DataRegion::Section(s) => out.push(s.clone()),
            DataRegion::SectionNameTable => out.push(Section {
                name: ".shstrtab".to_string(),
                sh_type: SectionType::StrTab,
                flags: SectionFlags::empty(),
                addr: 0,
                size: name_table.len() as u64,
                link: 0,
                info: 0,
                addralign: 1,
                entsize: 0,
                contents: name_table.to_vec(),
            }),
            DataRegion::Segment(seg) => collect_sections(&seg.regions, name_table, out),
            DataRegion::ElfHeader | DataRegion::SegmentHeaders | DataRegion::SectionHeaders | DataRegion::Raw(_) => {}
        }
    }
}

fn remove_named(regions: &mut Vec<DataRegion>, name: &str) -> bool {
    let mut removed = false;
    for region in regions.iter_mut() {
        if let DataRegion::Segment(seg) = region {
            removed |= remove_named(&mut seg.regions, name);
        }
    }
    let before = regions.len();
    regions.retain(|r| !matches!(r, DataRegion::Section(s) if s.name == name));
    removed || regions.len() != before
}

fn map_sections_in(regions: &mut Vec<DataRegion>, f: &mut impl FnMut(Section) -> Option<Section>) {
    let drained: Vec<DataRegion> = regions.drain(..).collect();
    let mut rebuilt = Vec::with_capacity(drained.len());
    for region in drained {
        match region {
            DataRegion::Section(s) => {
                if let Some(s) = f(s) {
                    rebuilt.push(DataRegion::Section(s));
                }
            }
            DataRegion::Segment(mut seg) => {
                map_sections_in(&mut seg.regions, f);
                rebuilt.push(DataRegion::Segment(seg));
            }
            other => rebuilt.push(other),
        }
    }
    *regions = rebuilt;
}

fn count_segments(regions: &[DataRegion]) -> usize {
    let mut count = 0;
    for region in regions {
        if let DataRegion::Segment(seg) = region {
            count += 1;
            count += count_segments(&seg.regions);
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::DataEncoding;
    use crate::section::{SectionFlags, SectionType};

    fn sample_elf() -> Elf {
        Elf {
            class: ElfClass::Elf32,
            data: DataEncoding::Lsb,
            version: 1,
            os_abi: ElfOsAbi::SystemV,
            abi_version: 0,
            ty: ObjectType::Relocatable,
            machine: Machine::X86_64,
            entry: 0,
            flags: 0,
            regions: vec![
                DataRegion::ElfHeader,
                DataRegion::Section(Section {
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
                }),
                DataRegion::Section(Section {
                    name: ".data".into(),
                    sh_type: SectionType::ProgBits,
                    flags: SectionFlags::ALLOC | SectionFlags::WRITE,
                    addr: 0,
                    size: 4,
                    link: 0,
                    info: 0,
                    addralign: 4,
                    entsize: 0,
                    contents: vec![1, 2, 3, 4],
                }),
                DataRegion::SectionNameTable,
                DataRegion::SectionHeaders,
            ],
        }
    }

    #[test]
    fn sections_includes_synthetic_shstrtab() {
        let elf = sample_elf();
        let names: Vec<_> = elf.sections().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec![".text", ".data", ".shstrtab"]);
    }

    #[test]
    fn remove_by_name_drops_the_section_and_its_name() {
        let mut elf = sample_elf();
        assert!(elf.remove_section(".data"));
        let names: Vec<_> = elf.sections().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec![".text", ".shstrtab"]);
        let (name_table, _) = elf.build_name_table();
        assert!(!name_table.windows(5).any(|w| w == b".data"));
    }

    #[test]
    fn map_sections_can_delete_by_returning_none() {
        let mut elf = sample_elf();
        elf.map_sections(|s| if s.name == ".text" { None } else { Some(s) });
        let names: Vec<_> = elf.sections().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec![".data", ".shstrtab"]);
    }

    #[test]
    fn summary_reports_counts() {
        let elf = sample_elf();
        let summary = elf.summary();
        assert_eq!(summary.section_count, 3);
        assert_eq!(summary.segment_count, 0);
        assert_eq!(summary.symtab_count, 0);
    }
}
