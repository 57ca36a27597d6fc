//! Machine-specific aliases for reserved section indices.
//!
//! Grounded on the teacher crate's `arch/` directory, which keeps one file
//! per architecture holding that architecture's constant tables (see
//! `arch/mips.rs`'s `ElfHeaderFlagMIPSArchitecture`). This crate doesn't need
//! full per-architecture relocation or section-type tables — those are
//! inspection detail outside this spec's scope — but §4.2 does require
//! pretty-printing a handful of machine- and OS/ABI-gated aliases within the
//! processor-reserved section-index range (`SHN_LOPROC..=SHN_HIPROC`).

use crate::ident::ElfOsAbi;
use crate::machine::Machine;
use crate::section::SectionIndex;

/// A human-readable alias for a reserved section index, if the combination
/// of machine, OS/ABI, and raw index value names one.
///
/// Only [`SectionIndex::LoProc`], [`SectionIndex::HiProc`], and
/// [`SectionIndex::CustomProc`] ever have aliases; every other variant
/// returns `None`.
pub fn processor_reserved_alias(index: SectionIndex, machine: Machine, os_abi: ElfOsAbi) -> Option<&'static str> {
    let raw = match index {
        SectionIndex::LoProc | SectionIndex::CustomProc(_) | SectionIndex::HiProc => index.to_raw(),
        _ => return None,
    };
    match (machine, os_abi, raw) {
        (Machine::X86_64, _, 0xff02) => Some("LCOMMON"),
        (Machine::Mips, _, 0xff03) => Some("SCOMMON"),
        (Machine::Mips, _, 0xff04) => Some("SUNDEFINED"),
        (Machine::Ia64, ElfOsAbi::HpUx, 0xff00) => Some("ANSI_COMMON"),
        (Machine::Tic6x, _, 0xff00) => Some("SCOMMON"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x86_64_lcommon() {
        let idx = SectionIndex::from_raw(0xff02);
        assert_eq!(processor_reserved_alias(idx, Machine::X86_64, ElfOsAbi::SystemV), Some("LCOMMON"));
    }

    #[test]
    fn mips_scommon_and_sundefined() {
        assert_eq!(
            processor_reserved_alias(SectionIndex::from_raw(0xff03), Machine::Mips, ElfOsAbi::SystemV),
            Some("SCOMMON")
        );
        assert_eq!(
            processor_reserved_alias(SectionIndex::from_raw(0xff04), Machine::Mips, ElfOsAbi::SystemV),
            Some("SUNDEFINED")
        );
    }

    #[test]
    fn ia64_hpux_ansi_common_is_gated_on_os_abi() {
        let idx = SectionIndex::from_raw(0xff00);
        assert_eq!(processor_reserved_alias(idx, Machine::Ia64, ElfOsAbi::HpUx), Some("ANSI_COMMON"));
        assert_eq!(processor_reserved_alias(idx, Machine::Ia64, ElfOsAbi::SystemV), None);
    }

    #[test]
    fn tic6x_scommon() {
        let idx = SectionIndex::from_raw(0xff00);
        assert_eq!(processor_reserved_alias(idx, Machine::Tic6x, ElfOsAbi::SystemV), Some("SCOMMON"));
    }

    #[test]
    fn non_reserved_index_has_no_alias() {
        assert_eq!(
            processor_reserved_alias(SectionIndex::from_raw(5), Machine::X86_64, ElfOsAbi::SystemV),
            None
        );
    }
}
