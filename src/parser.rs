//! The parser: reads the ELF header, section-header table, and program-header
//! table, then folds their byte ranges into a single region tree (§4.5).
//!
//! Grounded on the teacher crate's header-reading style (one function per
//! header field group, `FromReader`-flavored) but restructured around the
//! region-tree fold the upstream spec is actually about, which the teacher
//! crate never attempted (it only ever models the flat header/section/
//! program-header triple, not their overlap).

use typed_builder::TypedBuilder;

use crate::error::Error;
use crate::ident::{DataEncoding, ElfClass, Identifier, ObjectType, CURRENT_VERSION};
use crate::machine::Machine;
use crate::primitive::{read_bytes, Endian, Width, Width32, Width64};
use crate::region::{DataRegion, Elf};
use crate::section::{Section, SectionFlags, SectionType};
use crate::segment::{Segment, SegmentFlags, SegmentType};
use crate::strtab;

#[derive(Debug, Clone, Default, TypedBuilder)]
/// Caller-tunable knobs for [`Parser::parse_with`].
///
/// There is exactly one knob today: unknown values never cause a parse
/// failure (they always round-trip as `Ext(raw)`, per §4.2/§7), but a
/// caller doing forensic analysis on a possibly-corrupt file may want a log
/// line every time one is encountered.
pub struct ParserOptions {
    #[builder(default)]
    /// Emit a `log::warn!` whenever an unknown object/segment/section type
    /// is decoded, instead of accepting it silently.
    pub warn_on_unknown_types: bool,
}

/// Reads ELF byte buffers into a [`Elf`] region tree.
pub struct Parser;

struct FoldSizes {
    ehdr: usize,
    phdr_table: usize,
    shdr_table: usize,
    name_table: usize,
}

fn region_len(region: &DataRegion, sizes: &FoldSizes) -> usize {
    match region {
        DataRegion::ElfHeader => sizes.ehdr,
        DataRegion::SegmentHeaders => sizes.phdr_table,
        DataRegion::SectionHeaders => sizes.shdr_table,
        DataRegion::SectionNameTable => sizes.name_table,
        DataRegion::Segment(seg) => seg.regions.iter().map(|r| region_len(r, sizes)).sum(),
        DataRegion::Section(s) => s.file_size(),
        DataRegion::Raw(b) => b.len(),
    }
}

fn leaf_label(region: &DataRegion) -> String {
    match region {
        DataRegion::ElfHeader => "ELF header".to_string(),
        DataRegion::SegmentHeaders => "program header table".to_string(),
        DataRegion::SectionHeaders => "section header table".to_string(),
        DataRegion::SectionNameTable => ".shstrtab".to_string(),
        DataRegion::Section(s) => format!("section {:?}", s.name),
        DataRegion::Segment(_) => "segment".to_string(),
        DataRegion::Raw(_) => "raw span".to_string(),
    }
}

/// Split the region at top-level offset `at`, if it falls strictly inside a
/// `Raw` span; recurse into segments; no-op if `at` already lands on a
/// boundary. Any other leaf straddled by `at` is an unrecoverable overlap.
fn split_at_offset(regions: &mut Vec<DataRegion>, at: usize, sizes: &FoldSizes) -> Result<(), Error> {
    let mut cum = 0usize;
    for i in 0..regions.len() {
        let len = region_len(&regions[i], sizes);
        let region_end = cum + len;
        if at == cum || at == region_end {
            return Ok(());
        }
        if at > cum && at < region_end {
            return match &regions[i] {
                DataRegion::Raw(_) => {
                    if let DataRegion::Raw(bytes) = std::mem::replace(&mut regions[i], DataRegion::Raw(Vec::new())) {
                        let local = at - cum;
                        let (left, right) = bytes.split_at(local);
                        regions.splice(i..=i, [DataRegion::Raw(left.to_vec()), DataRegion::Raw(right.to_vec())]);
                    }
                    Ok(())
                }
                DataRegion::Segment(_) => {
                    if let DataRegion::Segment(seg) = &mut regions[i] {
                        split_at_offset(&mut seg.regions, at - cum, sizes)
                    } else {
                        unreachable!()
                    }
                }
                other => Err(Error::Overlap {
                    left: leaf_label(other),
                    right: "segment boundary".to_string(),
                    at,
                }),
            };
        }
        cum = region_end;
    }
    if at == cum {
        return Ok(());
    }
    Err(Error::Truncated { offset: at, needed: 0, available: 0 })
}

/// Insert a "special" (non-segment) leaf at `target_offset`, splitting the
/// covering `Raw` region into prefix/leaf/suffix per §4.5 step 7.
fn insert_at(
    regions: &mut Vec<DataRegion>,
    target_offset: usize,
    target_len: usize,
    leaf: DataRegion,
    sizes: &FoldSizes,
) -> Result<(), Error> {
    let mut cum = 0usize;
    for i in 0..regions.len() {
        let len = region_len(&regions[i], sizes);
        let region_end = cum + len;
        if target_offset == cum && target_len == 0 {
            regions.insert(i, leaf);
            return Ok(());
        }
        if target_offset >= cum && target_offset < region_end {
            let is_raw = matches!(regions[i], DataRegion::Raw(_));
            let is_segment = matches!(regions[i], DataRegion::Segment(_));
            if is_raw {
                let local_start = target_offset - cum;
                if local_start + target_len > len {
                    return Err(Error::Truncated {
                        offset: target_offset,
                        needed: target_len,
                        available: len - local_start,
                    });
                }
                if let DataRegion::Raw(bytes) = std::mem::replace(&mut regions[i], DataRegion::Raw(Vec::new())) {
                    let prefix = bytes[..local_start].to_vec();
                    let suffix = bytes[local_start + target_len..].to_vec();
                    let mut replacement = Vec::new();
                    if !prefix.is_empty() {
                        replacement.push(DataRegion::Raw(prefix));
                    }
                    replacement.push(leaf);
                    if !suffix.is_empty() {
                        replacement.push(DataRegion::Raw(suffix));
                    }
                    regions.splice(i..=i, replacement);
                }
                return Ok(());
            } else if is_segment {
                if target_offset + target_len > region_end {
                    return Err(Error::Overlap {
                        left: leaf_label(&regions[i]),
                        right: leaf_label(&leaf),
                        at: target_offset,
                    });
                }
                if let DataRegion::Segment(seg) = &mut regions[i] {
                    return insert_at(&mut seg.regions, target_offset - cum, target_len, leaf, sizes);
                }
                unreachable!()
            } else {
                return Err(Error::Overlap {
                    left: leaf_label(&regions[i]),
                    right: leaf_label(&leaf),
                    at: target_offset,
                });
            }
        }
        cum = region_end;
    }
    if target_offset == cum && target_len == 0 {
        regions.push(leaf);
        return Ok(());
    }
    Err(Error::Truncated { offset: target_offset, needed: target_len, available: 0 })
}

/// Wrap the contiguous sub-sequence of already-placed regions spanning
/// `[offset, offset+length)` inside `segment`, recursing into an existing
/// segment first if the whole range already lies inside one (§4.5 step 7).
fn insert_segment(
    regions: &mut Vec<DataRegion>,
    offset: usize,
    length: usize,
    mut segment: Segment,
    sizes: &FoldSizes,
) -> Result<(), Error> {
    let mut cum = 0usize;
    for i in 0..regions.len() {
        let len = region_len(&regions[i], sizes);
        let region_end = cum + len;
        if offset >= cum && offset + length <= region_end {
            if let DataRegion::Segment(inner) = &mut regions[i] {
                return insert_segment(&mut inner.regions, offset - cum, length, segment, sizes);
            }
            break;
        }
        cum = region_end;
    }

    split_at_offset(regions, offset, sizes)?;
    split_at_offset(regions, offset + length, sizes)?;

    let mut cum = 0usize;
    let mut start_idx = None;
    let mut end_idx = None;
    for i in 0..=regions.len() {
        if cum == offset {
            start_idx = Some(i);
        }
        if cum == offset + length {
            end_idx = Some(i);
            break;
        }
        if i == regions.len() {
            break;
        }
        cum += region_len(&regions[i], sizes);
    }
    let start_idx = start_idx.ok_or(Error::Truncated { offset, needed: length, available: 0 })?;
    let end_idx = end_idx.ok_or(Error::Truncated { offset: offset + length, needed: 0, available: 0 })?;

    segment.regions = regions.splice(start_idx..end_idx, std::iter::empty()).collect();
    regions.insert(start_idx, DataRegion::Segment(segment));
    Ok(())
}

fn read_word(class: ElfClass, endian: Endian, buf: &[u8], offset: usize) -> Result<u64, Error> {
    match class {
        ElfClass::Elf32 => Width32::read_word(buf, offset, endian),
        ElfClass::Elf64 => Width64::read_word(buf, offset, endian),
    }
}

struct RawShdr {
    name: u32,
    sh_type: u32,
    flags: u64,
    addr: u64,
    offset: usize,
    size: usize,
    link: u32,
    info: u32,
    addralign: u64,
    entsize: u64,
}

fn read_section_header(
    class: ElfClass,
    endian: Endian,
    buf: &[u8],
    base: usize,
) -> Result<RawShdr, Error> {
    let name = endian.read_u32(buf, base)?;
    let sh_type = endian.read_u32(buf, base + 4)?;
    let word = |off: usize| read_word(class, endian, buf, off);
    let word_size = match class {
        ElfClass::Elf32 => 4,
        ElfClass::Elf64 => 8,
    };
    let flags = word(base + 8)?;
    let addr = word(base + 8 + word_size)?;
    let offset = word(base + 8 + 2 * word_size)? as usize;
    let size = word(base + 8 + 3 * word_size)? as usize;
    let link = endian.read_u32(buf, base + 8 + 4 * word_size)?;
    let info = endian.read_u32(buf, base + 12 + 4 * word_size)?;
    let addralign = word(base + 16 + 4 * word_size)?;
    let entsize = word(base + 16 + 5 * word_size)?;
    Ok(RawShdr { name, sh_type, flags, addr, offset, size, link, info, addralign, entsize })
}

struct RawPhdr {
    p_type: u32,
    flags: u32,
    offset: usize,
    vaddr: u64,
    paddr: u64,
    filesz: usize,
    memsz: u64,
    align: u64,
}

fn read_program_header_32(endian: Endian, buf: &[u8], base: usize) -> Result<RawPhdr, Error> {
    let p_type = endian.read_u32(buf, base)?;
    let offset = endian.read_u32(buf, base + 4)? as usize;
    let vaddr = endian.read_u32(buf, base + 8)? as u64;
    let paddr = endian.read_u32(buf, base + 12)? as u64;
    let filesz = endian.read_u32(buf, base + 16)? as usize;
    let memsz = endian.read_u32(buf, base + 20)? as u64;
    let flags = endian.read_u32(buf, base + 24)?;
    let align = endian.read_u32(buf, base + 28)? as u64;
    Ok(RawPhdr { p_type, flags, offset, vaddr, paddr, filesz, memsz, align })
}

fn read_program_header_64(endian: Endian, buf: &[u8], base: usize) -> Result<RawPhdr, Error> {
    let p_type = endian.read_u32(buf, base)?;
    let flags = endian.read_u32(buf, base + 4)?;
    let offset = endian.read_u64(buf, base + 8)? as usize;
    let vaddr = endian.read_u64(buf, base + 16)?;
    let paddr = endian.read_u64(buf, base + 24)?;
    let filesz = endian.read_u64(buf, base + 32)? as usize;
    let memsz = endian.read_u64(buf, base + 40)?;
    let align = endian.read_u64(buf, base + 48)?;
    Ok(RawPhdr { p_type, flags, offset, vaddr, paddr, filesz, memsz, align })
}

impl Parser {
    /// Parse an ELF image with default options.
    pub fn parse(buf: &[u8]) -> Result<Elf, Error> {
        Self::parse_with(buf, &ParserOptions::builder().build())
    }

    /// Parse an ELF image, honoring `options`.
    pub fn parse_with(buf: &[u8], options: &ParserOptions) -> Result<Elf, Error> {
        log::debug!("parsing {} byte ELF image", buf.len());
        let ident = Identifier::parse(buf)?;
        let class = ident.class;
        let endian = ident.data.endian();

        let (ehdr_size, phdr_size, shdr_size) = match class {
            ElfClass::Elf32 => (Width32::EHDR_SIZE, Width32::PHDR_SIZE, Width32::SHDR_SIZE),
            ElfClass::Elf64 => (Width64::EHDR_SIZE, Width64::PHDR_SIZE, Width64::SHDR_SIZE),
        };
        let word_size = match class {
            ElfClass::Elf32 => Width32::WORD_SIZE,
            ElfClass::Elf64 => Width64::WORD_SIZE,
        };

        let mut off = 16usize;
        let ty_raw = endian.read_u16(buf, off)?;
        off += 2;
        let machine_raw = endian.read_u16(buf, off)?;
        off += 2;
        let version32 = endian.read_u32(buf, off)?;
        off += 4;
        if version32 as u8 != CURRENT_VERSION {
            return Err(Error::BadVersion { found: version32 as u8 });
        }
        let entry = read_word(class, endian, buf, off)?;
        off += word_size;
        let phoff = read_word(class, endian, buf, off)? as usize;
        off += word_size;
        let shoff = read_word(class, endian, buf, off)? as usize;
        off += word_size;
        let flags = endian.read_u32(buf, off)?;
        off += 4;
        let ehsize = endian.read_u16(buf, off)?;
        off += 2;
        let phentsize = endian.read_u16(buf, off)?;
        off += 2;
        let phnum = endian.read_u16(buf, off)?;
        off += 2;
        let shentsize = endian.read_u16(buf, off)?;
        off += 2;
        let shnum = endian.read_u16(buf, off)?;
        off += 2;
        let shstrndx = endian.read_u16(buf, off)?;

        if ehsize as usize != ehdr_size || phentsize as usize != phdr_size || shentsize as usize != shdr_size {
            return Err(Error::BadHeaderSize { ehsize, phentsize, shentsize });
        }

        let ty = ObjectType::from_raw(ty_raw);
        let machine = Machine::from_raw(machine_raw);
        if options.warn_on_unknown_types {
            if let ObjectType::Ext(raw) = ty {
                log::warn!("unknown e_type {raw:#06x}");
            }
            if let Machine::Ext(raw) = machine {
                log::warn!("unknown e_machine {raw:#06x}");
            }
        }

        let mut raw_shdrs = Vec::with_capacity(shnum as usize);
        for i in 0..shnum as usize {
            raw_shdrs.push(read_section_header(class, endian, buf, shoff + i * shdr_size)?);
        }

        let (name_table_off, name_table_size) = raw_shdrs
            .get(shstrndx as usize)
            .map(|s| (s.offset, s.size))
            .unwrap_or((0, 0));
        let name_table_bytes = read_bytes(buf, name_table_off, name_table_size)?;

        let mut section_leaves: Vec<(usize, usize, DataRegion)> = Vec::new();
        for (i, raw) in raw_shdrs.iter().enumerate() {
            if i == shstrndx as usize {
                continue;
            }
            let sh_type = SectionType::from_raw(raw.sh_type);
            if options.warn_on_unknown_types {
                if let SectionType::Ext(v) = sh_type {
                    log::warn!("unknown sh_type {v:#010x}");
                }
            }
            let name = String::from_utf8_lossy(strtab::lookup(name_table_bytes, raw.name as usize)).into_owned();
            let file_size = if sh_type == SectionType::NoBits { 0 } else { raw.size };
            let contents = if file_size == 0 { Vec::new() } else { read_bytes(buf, raw.offset, file_size)?.to_vec() };
            let section = Section {
                name,
                sh_type,
                flags: SectionFlags::from_bits_retain(raw.flags),
                addr: raw.addr,
                size: raw.size as u64,
                link: raw.link,
                info: raw.info,
                addralign: raw.addralign,
                entsize: raw.entsize,
                contents,
            };
            section_leaves.push((raw.offset, file_size, DataRegion::Section(section)));
        }

        let mut leaves = vec![(0usize, ehdr_size, DataRegion::ElfHeader)];
        if phnum > 0 {
            leaves.push((phoff, phnum as usize * phdr_size, DataRegion::SegmentHeaders));
        }
        if shnum > 0 {
            leaves.push((shoff, shnum as usize * shdr_size, DataRegion::SectionHeaders));
        }
        if (shstrndx as usize) < raw_shdrs.len() {
            leaves.push((name_table_off, name_table_size, DataRegion::SectionNameTable));
        }
        leaves.extend(section_leaves);
        leaves.sort_by_key(|(offset, _, _)| *offset);

        let sizes = FoldSizes {
            ehdr: ehdr_size,
            phdr_table: phnum as usize * phdr_size,
            shdr_table: shnum as usize * shdr_size,
            name_table: name_table_size,
        };

        let mut regions = vec![DataRegion::Raw(buf.to_vec())];
        for (offset, len, leaf) in leaves {
            insert_at(&mut regions, offset, len, leaf, &sizes)?;
        }

        for i in 0..phnum as usize {
            let base = phoff + i * phdr_size;
            let raw = match class {
                ElfClass::Elf32 => read_program_header_32(endian, buf, base)?,
                ElfClass::Elf64 => read_program_header_64(endian, buf, base)?,
            };
            let p_type = SegmentType::from_raw(raw.p_type);
            if options.warn_on_unknown_types {
                if let SegmentType::Ext(v) = p_type {
                    log::warn!("unknown p_type {v:#010x}");
                }
            }
            let segment = Segment {
                p_type,
                flags: SegmentFlags::from_bits_retain(raw.flags),
                vaddr: raw.vaddr,
                paddr: raw.paddr,
                align: raw.align,
                memsz: raw.memsz,
                regions: Vec::new(),
            };
            insert_segment(&mut regions, raw.offset, raw.filesz, segment, &sizes)?;
        }

        Ok(Elf {
            class,
            data: ident.data,
            version: CURRENT_VERSION,
            os_abi: ident.os_abi,
            abi_version: ident.abi_version,
            ty,
            machine,
            entry,
            flags,
            regions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Renderer;

    /// Hand-builds a minimal valid 32-bit LSB ET_REL image with just an
    /// ELF header, section-header table, and `.shstrtab` — S1 from the spec.
    fn minimal_32() -> Vec<u8> {
        let elf = Elf {
            class: ElfClass::Elf32,
            data: DataEncoding::Lsb,
            version: CURRENT_VERSION,
            os_abi: crate::ident::ElfOsAbi::SystemV,
            abi_version: 0,
            ty: ObjectType::Relocatable,
            machine: Machine::X86_64,
            entry: 0,
            flags: 0,
            regions: vec![
                DataRegion::ElfHeader,
                DataRegion::SectionHeaders,
                DataRegion::SectionNameTable,
            ],
        };
        Renderer::render(&elf).unwrap().bytes
    }

    #[test]
    fn parses_minimal_image_back_into_expected_shape() {
        let bytes = minimal_32();
        let elf = Parser::parse(&bytes).unwrap();
        assert_eq!(elf.class, ElfClass::Elf32);
        assert_eq!(elf.data, DataEncoding::Lsb);
        let has_header = elf.regions.iter().any(|r| matches!(r, DataRegion::ElfHeader));
        let has_shdrs = elf.regions.iter().any(|r| matches!(r, DataRegion::SectionHeaders));
        let has_name_table = elf.regions.iter().any(|r| matches!(r, DataRegion::SectionNameTable));
        assert!(has_header && has_shdrs && has_name_table);
    }

    #[test]
    fn render_of_parsed_minimal_image_is_byte_identical() {
        let bytes = minimal_32();
        let elf = Parser::parse(&bytes).unwrap();
        let rendered = Renderer::render(&elf).unwrap().bytes;
        assert_eq!(rendered, bytes);
    }

    #[test]
    fn rejects_truncated_buffer() {
        let bytes = vec![0x7f, 0x45, 0x4c, 0x46, 1, 1, 1];
        assert!(Parser::parse(&bytes).is_err());
    }

    #[test]
    fn rejects_bad_header_sizes() {
        let mut bytes = minimal_32();
        // Corrupt e_phentsize (32-bit header, offset 16+2+2+4+4+4+4+4+2 = 42).
        bytes[42] = 0xff;
        assert!(matches!(Parser::parse(&bytes), Err(Error::BadHeaderSize { .. })));
    }
}
