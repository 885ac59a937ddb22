//! Byte cursor with bounds-checked little-endian reads.

use std::str;

use crate::BufferError;

/// Longest varuint accepted for a 64-bit payload.
const MAX_VARUINT_LEN: usize = 10;

/// A binary reader over a byte slice.
///
/// The reader keeps a cursor `x` and an exclusive `end`. Every read checks
/// the remaining length first and leaves the cursor untouched on failure.
///
/// # Example
///
/// ```
/// use rmscene_buffers::Reader;
///
/// let data = [0x01, 0x02, 0x03, 0xac, 0x02];
/// let mut reader = Reader::new(&data);
///
/// assert_eq!(reader.try_u8(), Ok(0x01));
/// assert_eq!(reader.try_u16(), Ok(0x0302));
/// assert_eq!(reader.try_varuint(), Ok(300));
/// ```
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    /// The underlying byte slice.
    pub uint8: &'a [u8],
    /// Current cursor position.
    pub x: usize,
    /// End position (exclusive).
    pub end: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader for the given byte slice.
    pub fn new(uint8: &'a [u8]) -> Self {
        let end = uint8.len();
        Self { uint8, x: 0, end }
    }

    /// Returns the number of remaining bytes.
    pub fn size(&self) -> usize {
        self.end.saturating_sub(self.x)
    }

    /// Returns `true` once the cursor has reached the end.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Moves the cursor to an absolute position.
    pub fn seek(&mut self, x: usize) {
        self.x = x;
    }

    #[inline]
    fn check(&self, n: usize) -> Result<(), BufferError> {
        if n > self.size() {
            Err(BufferError::EndOfBuffer)
        } else {
            Ok(())
        }
    }

    #[inline]
    fn array<const N: usize>(&mut self) -> Result<[u8; N], BufferError> {
        self.check(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.uint8[self.x..self.x + N]);
        self.x += N;
        Ok(out)
    }

    /// Advances the cursor by `length` bytes.
    pub fn try_skip(&mut self, length: usize) -> Result<(), BufferError> {
        self.check(length)?;
        self.x += length;
        Ok(())
    }

    /// Reads `size` raw bytes and advances the cursor.
    pub fn try_buf(&mut self, size: usize) -> Result<&'a [u8], BufferError> {
        self.check(size)?;
        let start = self.x;
        self.x += size;
        Ok(&self.uint8[start..self.x])
    }

    /// Reads an unsigned 8-bit integer.
    #[inline]
    pub fn try_u8(&mut self) -> Result<u8, BufferError> {
        self.check(1)?;
        let val = self.uint8[self.x];
        self.x += 1;
        Ok(val)
    }

    /// Reads a one-byte boolean, which must be 0 or 1.
    #[inline]
    pub fn try_bool(&mut self) -> Result<bool, BufferError> {
        match self.try_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(BufferError::InvalidBool(other)),
        }
    }

    /// Reads an unsigned 16-bit little-endian integer.
    #[inline]
    pub fn try_u16(&mut self) -> Result<u16, BufferError> {
        self.array().map(u16::from_le_bytes)
    }

    /// Reads an unsigned 32-bit little-endian integer.
    #[inline]
    pub fn try_u32(&mut self) -> Result<u32, BufferError> {
        self.array().map(u32::from_le_bytes)
    }

    /// Reads a 32-bit little-endian float.
    #[inline]
    pub fn try_f32(&mut self) -> Result<f32, BufferError> {
        self.array().map(f32::from_le_bytes)
    }

    /// Reads a 64-bit little-endian float.
    #[inline]
    pub fn try_f64(&mut self) -> Result<f64, BufferError> {
        self.array().map(f64::from_le_bytes)
    }

    /// Reads a variable-length unsigned integer.
    ///
    /// Seven payload bits per byte, least significant group first; a set high
    /// bit means another byte follows. On error the cursor is restored.
    pub fn try_varuint(&mut self) -> Result<u64, BufferError> {
        let start = self.x;
        let mut result: u64 = 0;
        let mut shift: u32 = 0;
        for i in 0..MAX_VARUINT_LEN {
            let b = match self.try_u8() {
                Ok(b) => b,
                Err(e) => {
                    self.x = start;
                    return Err(e);
                }
            };
            let part = (b & 0x7f) as u64;
            if i == MAX_VARUINT_LEN - 1 && part > 1 {
                self.x = start;
                return Err(BufferError::VaruintOverflow);
            }
            result |= part << shift;
            if b & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
        self.x = start;
        Err(BufferError::VaruintOverflow)
    }

    /// Reads a UTF-8 string of `size` bytes.
    pub fn try_utf8(&mut self, size: usize) -> Result<&'a str, BufferError> {
        self.check(size)?;
        let start = self.x;
        let s = str::from_utf8(&self.uint8[start..start + size])
            .map_err(|_| BufferError::InvalidUtf8)?;
        self.x += size;
        Ok(s)
    }
}
