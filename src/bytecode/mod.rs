//! Definition of the miniscript instruction-stream format.
//!
//! A stream is a sequence of records, each a 6-byte header (`opcode: u16`,
//! `flags: u16`, `size: u16` including the header) followed by `size - 6`
//! bytes of opcode-specific payload. The byte order is declared by the
//! container the stream was loaded from.

pub mod opcode;
pub mod reader;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use opcode::Opcode;
pub use reader::StreamReader;

/// Size of the fixed per-instruction header in bytes.
pub const HEADER_SIZE: u16 = 6;

/// Byte order of a serialized instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    Little,
    Big,
}

/// Errors produced while decoding an instruction stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of stream at byte {offset} ({needed} more bytes needed)")]
    UnexpectedEof { offset: usize, needed: usize },
    #[error("instruction {index}: size {size} is smaller than the instruction header")]
    InstructionTooSmall { index: usize, size: u16 },
    #[error("instruction {index}: unknown opcode {opcode:#06x}")]
    UnknownOpcode { index: usize, opcode: u16 },
    #[error("instruction {index} ({opcode}): payload is truncated")]
    TruncatedPayload { index: usize, opcode: Opcode },
    #[error("instruction {index}: builtin function id {id} is out of range")]
    InvalidBuiltin { index: usize, id: u32 },
    #[error("instruction {index}: unrecognized jump flags {flags:#x}")]
    InvalidJumpFlags { index: usize, flags: u32 },
    #[error("instruction {index}: jump offset is zero")]
    ZeroJumpOffset { index: usize },
    #[error("instruction {index}: jump target {target} is past the end of a {count}-instruction program")]
    JumpOutOfRange {
        index: usize,
        target: usize,
        count: usize,
    },
    #[error("instruction {index}: unknown literal tag {tag:#x}")]
    InvalidLiteralTag { index: usize, tag: u16 },
    #[error("instruction {index}: string literal is not terminated")]
    UnterminatedString { index: usize },
}
