//! COIL object format
//!
//! The on-disk container produced by the compiler and the typed virtual
//! instruction set it carries. Everything here is byte-exact: all
//! multi-byte scalars are little-endian regardless of host order, and
//! floats travel as their IEEE-754 bit patterns.
//!
//! Layout of a COIL object:
//!
//! ```text
//! +--------------------------+ offset 0
//! |  Object header (32 B)    |
//! +--------------------------+
//! |  Section header  (.text) |
//! |  Section header (.strtab)|
//! +--------------------------+
//! |  Code bytes              |
//! +--------------------------+
//! |  String-table bytes      |
//! +--------------------------+
//! ```
//!
//! [`ObjectWriter`] builds the container (header fields are zeroed up
//! front and patched once section sizes are known); [`ObjectFile`] is
//! the matching reader, used for verification and tooling.

pub mod instr;
pub mod opcode;
pub mod reader;
pub mod strtab;
pub mod writer;

pub use instr::{Instruction, Operand, OperandKind};
pub use opcode::{BranchCond, Opcode};
pub use reader::{Header, ObjectFile, SectionHeader};
pub use strtab::StringTable;
pub use writer::ObjectWriter;

use thiserror::Error;

/// Errors surfaced while decoding an object or an instruction stream.
#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("bad magic: not a COIL object")]
    BadMagic,

    #[error("truncated object: need {needed} byte(s) at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("unknown opcode 0x{0:02X}")]
    UnknownOpcode(u8),

    #[error("unknown operand qualifier 0x{0:02X}")]
    UnknownOperandQualifier(u8),

    #[error("invalid immediate width {0}")]
    InvalidWidth(u8),

    #[error("section {kind} lies outside the object (offset {offset}, size {size})")]
    BadSection { kind: u32, offset: u32, size: u32 },
}
