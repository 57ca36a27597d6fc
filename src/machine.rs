//! The target machine (`e_machine`) enum.
//!
//! Grounded on the teacher crate's `arch` module, which keeps one file per
//! architecture under `src/arch/`. This crate doesn't need per-architecture
//! relocation/flag tables (those are out of scope per §1, "relocation
//! application" is an external collaborator), but it does need to know which
//! architecture a file targets to resolve the machine-specific reserved
//! section-index aliases in [`crate::arch`].

use crate::open_enum;

open_enum! {
    /// The target instruction set architecture.
    pub enum Machine : u16 {
        /// No machine.
        None = 0,
        /// AT&T WE 32100.
        M32 = 1,
        /// SPARC.
        Sparc = 2,
        /// Intel 80386.
        I386 = 3,
        /// Motorola 68000.
        M68k = 4,
        /// Motorola 88000.
        M88k = 5,
        /// Intel 80860.
        I860 = 7,
        /// MIPS I Architecture.
        Mips = 8,
        /// IBM System/370 Processor.
        S370 = 9,
        /// HP PA-RISC.
        PaRisc = 15,
        /// SPARC Version 9.
        SparcV9 = 43,
        /// PowerPC.
        PowerPc = 20,
        /// 64-bit PowerPC.
        PowerPc64 = 21,
        /// IBM System/390 Processor.
        S390 = 22,
        /// ARM.
        Arm = 40,
        /// Hitachi SH.
        SuperH = 42,
        /// Intel IA-64 processor architecture.
        Ia64 = 50,
        /// AMD x86-64 architecture.
        X86_64 = 62,
        /// TMS320C6000 Family (TI C6x/TIC6X).
        Tic6x = 140,
        /// AArch64.
        Aarch64 = 183,
        /// RISC-V.
        RiscV = 243,
        /// Linux BPF — in-kernel virtual machine.
        Bpf = 247,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_machine_round_trips() {
        assert_eq!(Machine::from_raw(62), Machine::X86_64);
        assert_eq!(Machine::X86_64.to_raw(), 62);
    }

    #[test]
    fn unknown_machine_preserved() {
        let m = Machine::from_raw(9001);
        assert_eq!(m, Machine::Ext(9001));
        assert_eq!(m.to_raw(), 9001);
    }
}
