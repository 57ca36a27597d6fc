//! The renderer: walks a region tree back into bytes, recomputing every
//! header table, the name table, and segment/section file offsets from
//! scratch every time (§4.6).
//!
//! Grounded on the teacher crate's `writer`-flavored helpers for encoding
//! fixed-size records, generalized into the two-pass shape the region tree
//! actually needs: a layout pass that walks the tree purely to learn where
//! everything will land (byte lengths of sections, segments, and the
//! regenerated name table are all known up front; only their *position*
//! depends on what precedes them), followed by an emission pass that builds
//! the header tables from that layout and writes the final bytes.

use typed_builder::TypedBuilder;

use crate::error::Error;
use crate::ident::Identifier;
use crate::primitive::{Endian, Width, Width32, Width64};
use crate::region::{DataRegion, Elf};
use crate::section::Section;
use crate::segment::{SegmentFlags, SegmentType};

#[derive(Debug, Clone, Default, TypedBuilder)]
/// Caller-tunable knobs for [`Renderer::render_with`].
pub struct RenderOptions {
    #[builder(default)]
    /// Also return the finalized per-segment offset/size table alongside
    /// the bytes, so a caller can inspect the computed file layout without
    /// re-parsing the output.
    pub include_segment_table: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The finalized file offset and size of one rendered segment.
pub struct SegmentMeta {
    /// The segment's type.
    pub p_type: SegmentType,
    /// The segment's permission flags.
    pub flags: SegmentFlags,
    /// Virtual address at which this segment is to be loaded.
    pub vaddr: u64,
    /// Physical address, where relevant.
    pub paddr: u64,
    /// Required alignment.
    pub align: u64,
    /// Size in memory, in bytes.
    pub memsz: u64,
    /// The segment's final file offset.
    pub offset: usize,
    /// The segment's final file size.
    pub filesz: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The output of a render: the encoded bytes, and optionally the finalized
/// per-segment layout table.
pub struct Rendered {
    /// The encoded ELF image.
    pub bytes: Vec<u8>,
    /// The finalized segment layout, if [`RenderOptions::include_segment_table`] was set.
    pub segments: Option<Vec<SegmentMeta>>,
}

/// Encodes a region tree back into ELF bytes.
pub struct Renderer;

struct ClassSizes {
    ehdr: usize,
    phdr: usize,
    shdr: usize,
    word: usize,
}

fn class_sizes(class: crate::ident::ElfClass) -> ClassSizes {
    match class {
        crate::ident::ElfClass::Elf32 => ClassSizes {
            ehdr: Width32::EHDR_SIZE,
            phdr: Width32::PHDR_SIZE,
            shdr: Width32::SHDR_SIZE,
            word: Width32::WORD_SIZE,
        },
        crate::ident::ElfClass::Elf64 => ClassSizes {
            ehdr: Width64::EHDR_SIZE,
            phdr: Width64::PHDR_SIZE,
            shdr: Width64::SHDR_SIZE,
            word: Width64::WORD_SIZE,
        },
    }
}

fn align_up(offset: usize, align: u64) -> usize {
    if align <= 1 {
        return offset;
    }
    let align = align as usize;
    let rem = offset % align;
    if rem == 0 {
        offset
    } else {
        offset + (align - rem)
    }
}

struct SegmentLayout {
    p_type: SegmentType,
    flags: SegmentFlags,
    vaddr: u64,
    paddr: u64,
    align: u64,
    memsz: u64,
    offset: usize,
    filesz: usize,
}

#[derive(Default)]
struct Layout {
    phoff: usize,
    shoff: usize,
    shstrndx: u16,
    section_offsets: Vec<usize>,
    segments: Vec<SegmentLayout>,
    ehdr_seen: u32,
    phdr_seen: u32,
    shdr_seen: u32,
    name_table_seen: u32,
}

#[allow(clippy::too_many_arguments)]
fn walk(
    regions: &[DataRegion],
    offset: &mut usize,
    sizes: &ClassSizes,
    name_table_len: usize,
    section_index: &mut u16,
    layout: &mut Layout,
) {
    for region in regions {
        match region {
            DataRegion::ElfHeader => {
                layout.ehdr_seen += 1;
                *offset += sizes.ehdr;
            }
            DataRegion::SegmentHeaders => {
                layout.phdr_seen += 1;
                layout.phoff = *offset;
                // Actual length is added by the second, table-size-aware walk.
            }
            DataRegion::SectionHeaders => {
                layout.shdr_seen += 1;
                layout.shoff = *offset;
            }
            DataRegion::SectionNameTable => {
                layout.name_table_seen += 1;
                layout.shstrndx = *section_index;
                *section_index += 1;
                layout.section_offsets.push(*offset);
                *offset += name_table_len;
            }
            DataRegion::Section(s) => {
                let padded = align_up(*offset, s.addralign);
                *offset = padded;
                layout.section_offsets.push(*offset);
                *section_index += 1;
                *offset += s.file_size();
            }
            DataRegion::Segment(seg) => {
                let idx = layout.segments.len();
                layout.segments.push(SegmentLayout {
                    p_type: seg.p_type,
                    flags: seg.flags,
                    vaddr: seg.vaddr,
                    paddr: seg.paddr,
                    align: seg.align,
                    memsz: seg.memsz,
                    offset: *offset,
                    filesz: 0,
                });
                let start = *offset;
                walk(&seg.regions, offset, sizes, name_table_len, section_index, layout);
                layout.segments[idx].filesz = *offset - start;
            }
            DataRegion::Raw(bytes) => {
                *offset += bytes.len();
            }
        }
    }
}

impl Renderer {
    /// Render with default options.
    pub fn render(elf: &Elf) -> Result<Rendered, Error> {
        Self::render_with(elf, &RenderOptions::builder().build())
    }

    /// Render, honoring `options`.
    pub fn render_with(elf: &Elf, options: &RenderOptions) -> Result<Rendered, Error> {
        log::debug!("rendering ELF with {} top-level regions", elf.regions.len());
        let sizes = class_sizes(elf.class);
        let endian = elf.data.endian();
        let (name_table, name_offsets) = elf.build_name_table();
        let sections_flat = elf.sections();
        let phnum = elf.segment_count();
        let shnum = sections_flat.len();
        let phdr_table_len = phnum * sizes.phdr;
        let shdr_table_len = shnum * sizes.shdr;

        let mut layout = Layout::default();
        let mut offset = 0usize;
        let mut section_index = 0u16;
        walk(&elf.regions, &mut offset, &sizes, name_table.len(), &mut section_index, &mut layout);

        if layout.ehdr_seen > 1 || layout.phdr_seen > 1 || layout.shdr_seen > 1 || layout.name_table_seen > 1 {
            panic!("InvalidTree: more than one instance of a singleton region");
        }

        // SegmentHeaders/SectionHeaders occupy fixed-size table space that
        // wasn't counted during the walk (their length depends on counts
        // only known globally); re-walk with that space now accounted for.
        let mut layout = Layout::default();
        let mut offset = 0usize;
        let mut section_index = 0u16;
        walk_with_tables(
            &elf.regions,
            &mut offset,
            &sizes,
            name_table.len(),
            phdr_table_len,
            shdr_table_len,
            &mut section_index,
            &mut layout,
        );

        let (mut pre_load, rest): (Vec<SegmentLayout>, Vec<SegmentLayout>) =
            layout.segments.into_iter().partition(|s| s.p_type.is_pre_load());
        pre_load.extend(rest);
        let ordered_segments = pre_load;

        // ELF header.
        let ident = Identifier { class: elf.class, data: elf.data, os_abi: elf.os_abi, abi_version: elf.abi_version };
        let mut bytes = Vec::with_capacity(offset);
        let mut header = Vec::with_capacity(sizes.ehdr);
        header.extend_from_slice(&ident.render());
        endian.write_u16(&mut header, elf.ty.to_raw());
        endian.write_u16(&mut header, elf.machine.to_raw());
        endian.write_u32(&mut header, crate::ident::CURRENT_VERSION as u32);
        write_word(&mut header, elf.class, endian, elf.entry);
        write_word(&mut header, elf.class, endian, layout.phoff as u64);
        write_word(&mut header, elf.class, endian, layout.shoff as u64);
        endian.write_u32(&mut header, elf.flags);
        endian.write_u16(&mut header, sizes.ehdr as u16);
        endian.write_u16(&mut header, sizes.phdr as u16);
        endian.write_u16(&mut header, phnum as u16);
        endian.write_u16(&mut header, sizes.shdr as u16);
        endian.write_u16(&mut header, shnum as u16);
        endian.write_u16(&mut header, layout.shstrndx);

        // Program header table.
        let mut phdr_table = Vec::with_capacity(phdr_table_len);
        for seg in &ordered_segments {
            write_program_header(&mut phdr_table, elf.class, endian, seg);
        }

        // Section header table.
        let mut shdr_table = Vec::with_capacity(shdr_table_len);
        for (section, &sh_offset) in sections_flat.iter().zip(layout.section_offsets.iter()) {
            write_section_header(&mut shdr_table, elf.class, endian, &name_offsets, section, sh_offset);
        }

        emit(&elf.regions, &mut bytes, &header, &phdr_table, &shdr_table, &name_table);

        let segments = options.include_segment_table.then(|| {
            ordered_segments
                .into_iter()
                .map(|s| SegmentMeta {
                    p_type: s.p_type,
                    flags: s.flags,
                    vaddr: s.vaddr,
                    paddr: s.paddr,
                    align: s.align,
                    memsz: s.memsz,
                    offset: s.offset,
                    filesz: s.filesz,
                })
                .collect()
        });

        Ok(Rendered { bytes, segments })
    }
}

#[allow(clippy::too_many_arguments)]
fn walk_with_tables(
    regions: &[DataRegion],
    offset: &mut usize,
    sizes: &ClassSizes,
    name_table_len: usize,
    phdr_table_len: usize,
    shdr_table_len: usize,
    section_index: &mut u16,
    layout: &mut Layout,
) {
    for region in regions {
        match region {
            DataRegion::ElfHeader => *offset += sizes.ehdr,
            DataRegion::SegmentHeaders => {
                layout.phoff = *offset;
                *offset += phdr_table_len;
            }
            DataRegion::SectionHeaders => {
                layout.shoff = *offset;
                *offset += shdr_table_len;
            }
            DataRegion::SectionNameTable => {
                layout.shstrndx = *section_index;
                *section_index += 1;
                layout.section_offsets.push(*offset);
                *offset += name_table_len;
            }
            DataRegion::Section(s) => {
                let padded = align_up(*offset, s.addralign);
                *offset = padded;
                layout.section_offsets.push(*offset);
                *section_index += 1;
                *offset += s.file_size();
            }
            DataRegion::Segment(seg) => {
                let idx = layout.segments.len();
                layout.segments.push(SegmentLayout {
                    p_type: seg.p_type,
                    flags: seg.flags,
                    vaddr: seg.vaddr,
                    paddr: seg.paddr,
                    align: seg.align,
                    memsz: seg.memsz,
                    offset: *offset,
                    filesz: 0,
                });
                let start = *offset;
                walk_with_tables(
                    &seg.regions,
                    offset,
                    sizes,
                    name_table_len,
                    phdr_table_len,
                    shdr_table_len,
                    section_index,
                    layout,
                );
                layout.segments[idx].filesz = *offset - start;
            }
            DataRegion::Raw(bytes) => *offset += bytes.len(),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn emit(
    regions: &[DataRegion],
    out: &mut Vec<u8>,
    header: &[u8],
    phdr_table: &[u8],
    shdr_table: &[u8],
    name_table: &[u8],
) {
    for region in regions {
        match region {
            DataRegion::ElfHeader => out.extend_from_slice(header),
            DataRegion::SegmentHeaders => out.extend_from_slice(phdr_table),
            DataRegion::SectionHeaders => out.extend_from_slice(shdr_table),
            DataRegion::SectionNameTable => out.extend_from_slice(name_table),
            DataRegion::Section(s) => {
                let padded = align_up(out.len(), s.addralign);
                out.resize(padded, 0);
                out.extend_from_slice(&s.contents[..s.file_size()]);
            }
            DataRegion::Segment(seg) => emit(&seg.regions, out, header, phdr_table, shdr_table, name_table),
            DataRegion::Raw(bytes) => out.extend_from_slice(bytes),
        }
    }
}

fn write_word(out: &mut Vec<u8>, class: crate::ident::ElfClass, endian: Endian, value: u64) {
    match class {
        crate::ident::ElfClass::Elf32 => Width32::write_word(out, value, endian),
        crate::ident::ElfClass::Elf64 => Width64::write_word(out, value, endian),
    }
}

fn write_program_header(out: &mut Vec<u8>, class: crate::ident::ElfClass, endian: Endian, seg: &SegmentLayout) {
    match class {
        crate::ident::ElfClass::Elf32 => {
            endian.write_u32(out, seg.p_type.to_raw());
            endian.write_u32(out, seg.offset as u32);
            endian.write_u32(out, seg.vaddr as u32);
            endian.write_u32(out, seg.paddr as u32);
            endian.write_u32(out, seg.filesz as u32);
            endian.write_u32(out, seg.memsz as u32);
            endian.write_u32(out, seg.flags.bits());
            endian.write_u32(out, seg.align as u32);
        }
        crate::ident::ElfClass::Elf64 => {
            endian.write_u32(out, seg.p_type.to_raw());
            endian.write_u32(out, seg.flags.bits());
            endian.write_u64(out, seg.offset as u64);
            endian.write_u64(out, seg.vaddr);
            endian.write_u64(out, seg.paddr);
            endian.write_u64(out, seg.filesz as u64);
            endian.write_u64(out, seg.memsz);
            endian.write_u64(out, seg.align);
        }
    }
}

fn write_section_header(
    out: &mut Vec<u8>,
    class: crate::ident::ElfClass,
    endian: Endian,
    name_offsets: &std::collections::HashMap<String, u32>,
    section: &Section,
    offset: usize,
) {
    let name = name_offsets.get(&section.name).copied().unwrap_or(0);
    endian.write_u32(out, name);
    endian.write_u32(out, section.sh_type.to_raw());
    write_word(out, class, endian, section.flags.bits());
    write_word(out, class, endian, section.addr);
    write_word(out, class, endian, offset as u64);
    write_word(out, class, endian, section.size);
    endian.write_u32(out, section.link);
    endian.write_u32(out, section.info);
    write_word(out, class, endian, section.addralign);
    write_word(out, class, endian, section.entsize);
}
