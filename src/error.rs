//! Error taxonomy for parsing, folding, and rendering ELF object files.

#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone)]
/// Error type for failures while working with an ELF region tree.
pub enum Error {
    #[error("not an ELF file: expected magic 7F 45 4C 46, found {found:02x?}")]
    /// The 4-byte magic at the start of the identifier did not match `\x7FELF`.
    BadMagic {
        /// The bytes actually found at offset 0.
        found: [u8; 4],
    },
    #[error("unsupported ELF version {found}, expected 1")]
    /// The identifier version byte, or the 32-bit header version field, was not 1.
    BadVersion {
        /// The version byte actually found.
        found: u8,
    },
    #[error("invalid ELF class byte {found:#04x}, expected 1 (32-bit) or 2 (64-bit)")]
    /// The class byte in the identifier was neither `ELFCLASS32` nor `ELFCLASS64`.
    BadClass {
        /// The byte actually found.
        found: u8,
    },
    #[error("invalid ELF data encoding byte {found:#04x}, expected 1 (LSB) or 2 (MSB)")]
    /// The data-encoding byte in the identifier was neither `ELFDATA2LSB` nor `ELFDATA2MSB`.
    BadData {
        /// The byte actually found.
        found: u8,
    },
    #[error("bad header sizes: ehsize={ehsize} phentsize={phentsize} shentsize={shentsize}")]
    /// `ehsize`, `phentsize`, or `shentsize` disagreed with the fixed sizes mandated by the class.
    BadHeaderSize {
        /// The `e_ehsize` field as read from the header.
        ehsize: u16,
        /// The `e_phentsize` field as read from the header.
        phentsize: u16,
        /// The `e_shentsize` field as read from the header.
        shentsize: u16,
    },
    #[error("buffer truncated: needed {needed} bytes at offset {offset}, had {available}")]
    /// A read walked off the end of the input buffer or region list.
    Truncated {
        /// The file offset the read started at.
        offset: usize,
        /// The number of bytes the read needed.
        needed: usize,
        /// The number of bytes actually available from `offset`.
        available: usize,
    },
    #[error("region overlap: {left} and {right} both claim byte {at}")]
    /// Two "special" (non-segment) leaves claimed overlapping byte ranges while folding.
    Overlap {
        /// A short description of the first claimant.
        left: String,
        /// A short description of the second claimant.
        right: String,
        /// The offset at which the claims collided.
        at: usize,
    },
    #[error("unrecognized symbol binding value {found:#04x}")]
    /// A symbol's binding nibble did not match any known `STB_*` constant.
    BadSymbol {
        /// The raw binding nibble that failed to decode.
        found: u8,
    },
}

/// Convenience alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, Error>;
