//! Parse, edit, and re-emit ELF (Executable and Linkable Format) object files.
//!
//! The central data structure is the [`region`] tree: ELF lets a program
//! segment (the load-time view) and a section (the link-time view) claim
//! overlapping byte ranges of the same file, so a faithful editor needs a
//! single tree that folds both views together rather than two independent
//! tables. [`parser::Parser`] builds that tree from bytes; callers mutate it
//! directly; [`render::Renderer`] walks it back into bytes, recomputing every
//! header table, string table, and cross-reference along the way.
//!
//! ```text
//! bytes -> Parser::parse -> Elf (region tree) -> (edits) -> Renderer::render -> bytes
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod arch;
pub mod error;
pub mod ident;
pub mod machine;
pub mod parser;
pub mod primitive;
pub mod region;
pub mod render;
pub mod section;
pub mod segment;
pub mod strtab;
pub mod symbol;

pub use error::{Error, Result};
pub use ident::{DataEncoding, ElfClass, ElfOsAbi, ObjectType};
pub use machine::Machine;
pub use parser::{Parser, ParserOptions};
pub use region::{DataRegion, Elf};
pub use render::{RenderOptions, Renderer};
pub use section::{Section, SectionFlags, SectionIndex, SectionIndexDisplay, SectionType};
pub use segment::{Segment, SegmentFlags, SegmentType};
pub use symbol::{Symbol, SymbolBinding, SymbolTableView, SymbolType};

/// Define a "closed-with-escape-hatch" wire enum: known constants plus an
/// `Ext(raw)` catch-all so unrecognized values survive a parse/render cycle
/// unchanged, per the open-range enum convention used throughout this crate
/// (object type, machine, section/segment type).
#[macro_export]
macro_rules! open_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $repr:ty {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = $value:expr
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )*
            /// A value outside the known constants, preserved verbatim so it
            /// round-trips through parse and render unchanged.
            Ext($repr),
        }

        impl $name {
            /// Decode this enum from its wire representation.
            pub fn from_raw(raw: $repr) -> Self {
                match raw {
                    $($value => Self::$variant,)*
                    other => Self::Ext(other),
                }
            }

            /// Encode this enum back to its wire representation.
            pub fn to_raw(self) -> $repr {
                match self {
                    $(Self::$variant => $value,)*
                    Self::Ext(raw) => raw,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, stringify!($variant)),)*
                    Self::Ext(raw) => write!(f, "unknown ({raw:#x})"),
                }
            }
        }
    };
}
