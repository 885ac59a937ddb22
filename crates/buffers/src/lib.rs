//! Binary primitives for the reMarkable v6 scene format.
//!
//! [`Reader`] is a bounds-checked cursor over a byte slice; [`Writer`] is a
//! growable output buffer. Both use little-endian fixed-width integers and
//! LEB128-style variable-length unsigned integers ("varuints").

mod reader;
mod writer;

pub use reader::Reader;
pub use writer::Writer;

/// Errors produced by the primitive reader and writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// Fewer bytes remain than the primitive requires.
    #[error("unexpected end of buffer")]
    EndOfBuffer,
    #[error("invalid UTF-8")]
    InvalidUtf8,
    #[error("invalid bool byte {0:#04x}")]
    InvalidBool(u8),
    /// A varuint ran past 64 bits of payload.
    #[error("varuint overflows 64 bits")]
    VaruintOverflow,
    #[error("cannot encode negative value {0} as varuint")]
    NegativeVaruint(i128),
}
