//! Tagged block framing for the v6 scene format.
//!
//! Wire format:
//!
//! ```text
//! file      := HEADER_V6 block*
//! block     := u32 body_len, u8 0, u8 min_version, u8 current_version,
//!              u8 block_type, body[body_len]
//! field     := varuint tag (index << 4 | kind), value
//! subblock  := tag(kind = Length4), u32 len, body[len]
//! ```
//!
//! Bytes left unread at the end of a block or subblock are kept as
//! [`ExtraData`] and replayed by the writer, so fields added by newer
//! firmware survive a decode/encode cycle.

mod reader;
mod writer;

use std::collections::BTreeMap;
use std::fmt;

use rmscene_buffers::BufferError;

pub use reader::TaggedBlockReader;
pub use writer::TaggedBlockWriter;

/// Literal file header, including its trailing padding.
pub const HEADER_V6: &[u8; 43] = b"reMarkable .lines file, version=6          ";

/// Size of a top-level block header.
pub const BLOCK_HEADER_SIZE: usize = 8;

/// Value kind stored in the low nibble of a field tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TagType {
    Id = 0xF,
    Length4 = 0xC,
    Byte8 = 0x8,
    Byte4 = 0x4,
    Byte1 = 0x1,
}

impl TagType {
    pub fn from_u8(kind: u8) -> Option<Self> {
        match kind {
            0xF => Some(Self::Id),
            0xC => Some(Self::Length4),
            0x8 => Some(Self::Byte8),
            0x4 => Some(Self::Byte4),
            0x1 => Some(Self::Byte1),
            _ => None,
        }
    }
}

/// Header of a top-level block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Stream offset of the first body byte.
    pub offset: usize,
    pub size: usize,
    pub block_type: u8,
    pub min_version: u8,
    pub current_version: u8,
}

impl BlockInfo {
    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Trailing bytes a codec did not consume.
///
/// `subblocks` is keyed by the ordinal of the subblock within its block,
/// counted in the order subblocks are opened (nested ones included).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraData {
    pub block: Vec<u8>,
    pub subblocks: BTreeMap<u32, Vec<u8>>,
}

impl ExtraData {
    pub fn is_empty(&self) -> bool {
        self.block.is_empty() && self.subblocks.is_empty()
    }
}

/// A field tag as found on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub index: u64,
    pub kind: u8,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:#x}", self.index, self.kind)
    }
}

/// Errors raised while framing or unframing blocks.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    /// The stream ended in the middle of a primitive.
    #[error("truncated input")]
    TruncatedInput,
    #[error("invalid file header")]
    InvalidHeader,
    #[error("reserved block header byte is {0:#x}, expected 0")]
    InvalidReservedByte(u8),
    /// A field tag did not match the expected index and kind. `actual` is
    /// `None` when the enclosing block had no bytes left.
    #[error("unexpected tag at {offset}: expected {expected}, found {actual:?}")]
    UnexpectedTag {
        offset: usize,
        expected: Tag,
        actual: Option<Tag>,
    },
    /// A codec read past the declared end of a block or subblock.
    #[error("block at {offset} declared {declared} bytes but {consumed} were read")]
    Overflow {
        offset: usize,
        declared: usize,
        consumed: usize,
    },
    /// `write_block` was called while another block was open.
    #[error("cannot start a block inside another block")]
    NestedBlock,
    #[error("invalid string: {0}")]
    InvalidString(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

impl FrameError {
    pub fn is_unexpected_tag(&self) -> bool {
        matches!(self, FrameError::UnexpectedTag { .. })
    }
}

impl From<BufferError> for FrameError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::EndOfBuffer => FrameError::TruncatedInput,
            BufferError::InvalidUtf8 => FrameError::InvalidString("not UTF-8".into()),
            other => FrameError::InvalidValue(other.to_string()),
        }
    }
}
