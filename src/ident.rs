//! The 16-byte ELF identifier and the closed, file-wide enums it carries:
//! class, data encoding, object type, and OS/ABI.
//!
//! Grounded on the teacher crate's `header/elf/identification.rs`, which
//! models these as `FromPrimitive`/`ToPrimitive` enums read one byte at a
//! time from the front of the file. `ElfClass` and `DataEncoding` are
//! genuinely closed sets (an unrecognized byte is a parse error, not an
//! unknown value to preserve), so they keep `num-derive`'s generated
//! conversions rather than the `open_enum!` escape hatch.

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive as _;

use crate::error::Error;
use crate::open_enum;

/// Magic bytes at the start of every ELF file: `\x7FELF`.
pub const MAGIC: [u8; 4] = [0x7f, 0x45, 0x4c, 0x46];

/// The format version recognized by this crate. ELF has only ever defined
/// version 1 ("current"); anything else is rejected at parse time.
pub const CURRENT_VERSION: u8 = 1;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
/// The file's class: whether addresses, offsets, and sizes are 32 or 64 bits wide.
pub enum ElfClass {
    /// `ELFCLASS32`
    Elf32 = 1,
    /// `ELFCLASS64`
    Elf64 = 2,
}

impl ElfClass {
    /// Decode the class byte, or [`Error::BadClass`] if it isn't 1 or 2.
    pub fn from_byte(byte: u8) -> Result<Self, Error> {
        Self::from_u8(byte).ok_or(Error::BadClass { found: byte })
    }

    /// Encode back to the wire byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for ElfClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElfClass::Elf32 => write!(f, "ELF32"),
            ElfClass::Elf64 => write!(f, "ELF64"),
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
/// The file's data encoding (byte order for multi-byte fields).
pub enum DataEncoding {
    /// `ELFDATA2LSB` — little-endian.
    Lsb = 1,
    /// `ELFDATA2MSB` — big-endian.
    Msb = 2,
}

impl DataEncoding {
    /// Decode the data-encoding byte, or [`Error::BadData`] if it isn't 1 or 2.
    pub fn from_byte(byte: u8) -> Result<Self, Error> {
        Self::from_u8(byte).ok_or(Error::BadData { found: byte })
    }

    /// Encode back to the wire byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// The corresponding [`crate::primitive::Endian`] for multi-byte reads/writes.
    pub fn endian(self) -> crate::primitive::Endian {
        match self {
            DataEncoding::Lsb => crate::primitive::Endian::Little,
            DataEncoding::Msb => crate::primitive::Endian::Big,
        }
    }
}

impl std::fmt::Display for DataEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataEncoding::Lsb => write!(f, "little-endian"),
            DataEncoding::Msb => write!(f, "big-endian"),
        }
    }
}

open_enum! {
    /// The file's OS/ABI byte (`e_ident[EI_OSABI]`).
    pub enum ElfOsAbi : u8 {
        /// Unix System V ABI, also used to mean "unspecified".
        SystemV = 0,
        /// HP-UX
        HpUx = 1,
        /// NetBSD
        NetBsd = 2,
        /// Object uses GNU ELF extensions.
        Gnu = 3,
        /// Sun Solaris
        Solaris = 6,
        /// IBM AIX
        Aix = 7,
        /// SGI Irix
        Irix = 8,
        /// FreeBSD
        FreeBsd = 9,
        /// Compaq TRU64 UNIX
        Tru64 = 10,
        /// Novell Modesto
        NovellModesto = 11,
        /// OpenBSD
        OpenBsd = 12,
        /// Open VMS
        OpenVms = 13,
        /// HP Non-Stop Kernel
        NonStopKernel = 14,
        /// Amiga Research OS
        Aros = 15,
        /// FenixOS
        FenixOs = 16,
        /// Nuxi CloudABI
        CloudAbi = 17,
        /// Stratus Technologies OpenVOS
        OpenVos = 18,
        /// ARM EABI
        ArmAeabi = 64,
        /// ARM
        Arm = 97,
        /// Standalone (embedded) application
        Standalone = 255,
    }
}

open_enum! {
    /// The object file's type (`e_type`): relocatable, executable, shared, or core.
    pub enum ObjectType : u16 {
        /// No file type.
        None = 0,
        /// Relocatable file.
        Relocatable = 1,
        /// Executable file.
        Executable = 2,
        /// Shared object file.
        Shared = 3,
        /// Core file.
        Core = 4,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The 16-byte ELF identifier: magic, class, data encoding, version, OS/ABI,
/// ABI version, and 7 reserved pad bytes.
pub struct Identifier {
    /// The file's class. See [`ElfClass`].
    pub class: ElfClass,
    /// The file's data encoding. See [`DataEncoding`].
    pub data: DataEncoding,
    /// The OS/ABI extension in use, if any.
    pub os_abi: ElfOsAbi,
    /// The version of `os_abi`'s ABI this object targets.
    pub abi_version: u8,
}

impl Identifier {
    /// Parse the 16-byte identifier from the start of `buf`.
    pub fn parse(buf: &[u8]) -> Result<Self, Error> {
        let bytes = crate::primitive::read_bytes(buf, 0, 16)?;
        let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if magic != MAGIC {
            return Err(Error::BadMagic { found: magic });
        }
        let class = ElfClass::from_byte(bytes[4])?;
        let data = DataEncoding::from_byte(bytes[5])?;
        let version = bytes[6];
        if version != CURRENT_VERSION {
            return Err(Error::BadVersion { found: version });
        }
        let os_abi = ElfOsAbi::from_raw(bytes[7]);
        let abi_version = bytes[8];
        // bytes[9..16] are the 7 reserved pad bytes; ignored per spec.
        Ok(Self { class, data, os_abi, abi_version })
    }

    /// Render the 16-byte identifier.
    pub fn render(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..4].copy_from_slice(&MAGIC);
        out[4] = self.class.to_byte();
        out[5] = self.data.to_byte();
        out[6] = CURRENT_VERSION;
        out[7] = self.os_abi.to_raw();
        out[8] = self.abi_version;
        out
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "magic: {:02x?}", MAGIC)?;
        writeln!(f, "class: {}", self.class)?;
        writeln!(f, "data: {}", self.data)?;
        writeln!(f, "version: {}", CURRENT_VERSION)?;
        writeln!(f, "os_abi: {}", self.os_abi)?;
        write!(f, "abi_version: {}", self.abi_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_identifier() {
        let mut bytes = vec![0x7f, 0x45, 0x4c, 0x46, 1, 1, 1, 0, 0];
        bytes.extend_from_slice(&[0; 7]);
        let id = Identifier::parse(&bytes).unwrap();
        assert_eq!(id.class, ElfClass::Elf32);
        assert_eq!(id.data, DataEncoding::Lsb);
        assert_eq!(id.os_abi, ElfOsAbi::SystemV);
        assert_eq!(id.abi_version, 0);
        assert_eq!(id.render().as_slice(), bytes.as_slice());
    }

    #[test]
    fn identifier_display_lists_every_field() {
        let id = Identifier { class: ElfClass::Elf64, data: DataEncoding::Lsb, os_abi: ElfOsAbi::Gnu, abi_version: 0 };
        let rendered = id.to_string();
        assert!(rendered.contains("class: ELF64"));
        assert!(rendered.contains("data: little-endian"));
        assert!(rendered.contains("os_abi: Gnu"));
    }

    #[test]
    fn open_enum_display_names_known_variants_and_shows_hex_for_unknown() {
        assert_eq!(ObjectType::Relocatable.to_string(), "Relocatable");
        assert_eq!(ObjectType::from_raw(0xbeef).to_string(), "unknown (0xbeef)");
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = [0u8; 16];
        assert_eq!(
            Identifier::parse(&bytes).unwrap_err(),
            Error::BadMagic { found: [0, 0, 0, 0] }
        );
    }

    #[test]
    fn unknown_os_abi_round_trips_as_ext() {
        let abi = ElfOsAbi::from_raw(200);
        assert_eq!(abi, ElfOsAbi::Ext(200));
        assert_eq!(abi.to_raw(), 200);
    }

    #[test]
    fn object_type_enum_round_trip() {
        for v in 0u16..=6u16 {
            let ty = ObjectType::from_raw(v);
            assert_eq!(ty.to_raw(), v);
        }
    }
}
