//! Segments: the load-time view of a file's contents.
//!
//! A segment doesn't carry its own file offset or file size as persistent
//! state — per §3.3, those are recomputed by the renderer from the bytes
//! actually emitted for the segment's nested regions every time the tree is
//! rendered. What the parser captures from the program header at fold time
//! (offset, filesz) is consumed immediately to select which already-placed
//! regions the segment wraps; after that it's derived, not stored.

use bitflags::bitflags;

use crate::open_enum;
use crate::region::DataRegion;

open_enum! {
    /// A segment's type (`p_type`).
    pub enum SegmentType : u32 {
        /// Unused entry.
        Null = 0,
        /// Loadable segment.
        Load = 1,
        /// Dynamic linking information.
        Dynamic = 2,
        /// Path to an interpreter.
        Interp = 3,
        /// Auxiliary information (notes).
        Note = 4,
        /// Reserved, unspecified semantics.
        ShLib = 5,
        /// The program header table itself, if present in the file's memory image.
        Phdr = 6,
        /// Thread-local storage template.
        Tls = 7,
    }
}

bitflags! {
    /// A segment's flags (`p_flags`): the R/W/X permission bits a loader
    /// applies to the mapped memory.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SegmentFlags: u32 {
        /// Executable.
        const X = 0x1;
        /// Writable.
        const W = 0x2;
        /// Readable.
        const R = 0x4;
    }
}

impl SegmentType {
    /// True for `PT_PHDR` and `PT_INTERP`, the two types the renderer
    /// emits before all other program-header entries for loader
    /// compatibility (§4.6, §8 property 7).
    pub fn is_pre_load(self) -> bool {
        matches!(self, SegmentType::Phdr | SegmentType::Interp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A program segment: a contiguous byte range describing how part of the
/// file maps into memory at load time, plus the region sequence it contains.
pub struct Segment {
    /// The segment's type.
    pub p_type: SegmentType,
    /// The segment's permission flags.
    pub flags: SegmentFlags,
    /// Virtual address at which this segment is to be loaded.
    pub vaddr: u64,
    /// Physical address, where relevant.
    pub paddr: u64,
    /// Required alignment; must be zero, one, or a power of two, with
    /// `vaddr ≡ offset (mod align)`.
    pub align: u64,
    /// Size in memory, in bytes; may exceed the file-resident byte count
    /// when the segment's tail is `.bss`-like.
    pub memsz: u64,
    /// The file-resident region sequence this segment wraps.
    pub regions: Vec<DataRegion>,
}

impl Segment {
    /// Construct a new, empty segment of the given type.
    pub fn new(p_type: SegmentType, flags: SegmentFlags) -> Self {
        Self {
            p_type,
            flags,
            vaddr: 0,
            paddr: 0,
            align: 0,
            memsz: 0,
            regions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_load_types() {
        assert!(SegmentType::Phdr.is_pre_load());
        assert!(SegmentType::Interp.is_pre_load());
        assert!(!SegmentType::Load.is_pre_load());
        assert!(!SegmentType::Dynamic.is_pre_load());
    }

    #[test]
    fn unknown_segment_type_round_trips() {
        let ty = SegmentType::from_raw(0x6474_e550);
        assert_eq!(ty, SegmentType::Ext(0x6474_e550));
        assert_eq!(ty.to_raw(), 0x6474_e550);
    }

    #[test]
    fn segment_flags_bits() {
        let flags = SegmentFlags::R | SegmentFlags::X;
        assert!(flags.contains(SegmentFlags::R));
        assert!(!flags.contains(SegmentFlags::W));
    }
}
