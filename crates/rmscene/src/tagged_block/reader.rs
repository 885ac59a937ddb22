//! Reads blocks, subblocks and tagged fields.

use rmscene_buffers::Reader;
use tracing::warn;

use super::{BlockInfo, ExtraData, FrameError, Tag, TagType, BLOCK_HEADER_SIZE, HEADER_V6};
use crate::crdt::{CrdtId, Lww};

/// Reader for the tagged block structure.
///
/// Block and subblock bodies are read through closures; when a closure
/// returns, the reader compares the bytes consumed with the declared length
/// and records any unread tail as extra data.
pub struct TaggedBlockReader<'a> {
    data: Reader<'a>,
    /// End offsets of the open block and subblocks, innermost last.
    ends: Vec<usize>,
    extra: ExtraData,
    next_ordinal: u32,
}

impl<'a> TaggedBlockReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data: Reader::new(data),
            ends: Vec::new(),
            extra: ExtraData::default(),
            next_ordinal: 0,
        }
    }

    /// Current stream offset.
    pub fn tell(&self) -> usize {
        self.data.x
    }

    pub fn seek(&mut self, x: usize) {
        self.data.seek(x);
    }

    /// Bytes left in the whole stream.
    pub fn remaining(&self) -> usize {
        self.data.size()
    }

    /// Bytes left before the end of the innermost open block or subblock.
    pub fn bytes_remaining_in_block(&self) -> usize {
        match self.ends.last() {
            Some(end) => end.saturating_sub(self.data.x),
            None => self.data.size(),
        }
    }

    /// Checks the literal file header.
    pub fn read_header(&mut self) -> Result<(), FrameError> {
        let header = self
            .data
            .try_buf(HEADER_V6.len())
            .map_err(|_| FrameError::InvalidHeader)?;
        if header != HEADER_V6 {
            return Err(FrameError::InvalidHeader);
        }
        Ok(())
    }

    // ── Blocks ──────────────────────────────────────────────────────────────

    /// Reads the next top-level block header.
    ///
    /// Returns `None` at a clean end of stream. A partial header, or a body
    /// that runs past the end of the data, is [`FrameError::TruncatedInput`].
    pub fn read_block_header(&mut self) -> Result<Option<BlockInfo>, FrameError> {
        if self.data.is_empty() {
            return Ok(None);
        }
        if self.data.size() < BLOCK_HEADER_SIZE {
            return Err(FrameError::TruncatedInput);
        }
        let size = self.data.try_u32()? as usize;
        let reserved = self.data.try_u8()?;
        if reserved != 0 {
            return Err(FrameError::InvalidReservedByte(reserved));
        }
        let min_version = self.data.try_u8()?;
        let current_version = self.data.try_u8()?;
        let block_type = self.data.try_u8()?;
        let info = BlockInfo {
            offset: self.data.x,
            size,
            block_type,
            min_version,
            current_version,
        };
        if size > self.data.size() {
            return Err(FrameError::TruncatedInput);
        }
        Ok(Some(info))
    }

    /// Raw body bytes of a block, without moving the cursor.
    pub fn block_body(&self, info: &BlockInfo) -> &'a [u8] {
        &self.data.uint8[info.offset..info.end()]
    }

    /// Reads a block body with `f` and returns its value with any extra data.
    ///
    /// The cursor is left at the end of the block even when `f` fails.
    pub fn read_block_body<T>(
        &mut self,
        info: &BlockInfo,
        f: impl FnOnce(&mut Self) -> Result<T, FrameError>,
    ) -> Result<(T, ExtraData), FrameError> {
        self.extra = ExtraData::default();
        self.next_ordinal = 0;
        self.data.seek(info.offset);
        self.ends.push(info.end());
        let result = f(self);
        self.ends.clear();
        let result = result.and_then(|value| {
            let tail = self.close(info.offset, info.size, "block")?;
            Ok((value, tail))
        });
        self.data.seek(info.end());
        let (value, tail) = result?;
        let mut extra = std::mem::take(&mut self.extra);
        extra.block = tail;
        Ok((value, extra))
    }

    /// Reads a length-prefixed subblock with field index `index`.
    pub fn read_subblock<T>(
        &mut self,
        index: u64,
        f: impl FnOnce(&mut Self) -> Result<T, FrameError>,
    ) -> Result<T, FrameError> {
        self.read_tag(index, TagType::Length4)?;
        let size = self.read_uint32()? as usize;
        let offset = self.data.x;
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        self.ends.push(offset + size);
        let result = f(self);
        self.ends.pop();
        let value = result?;
        let tail = self.close(offset, size, "subblock")?;
        if !tail.is_empty() {
            self.extra.subblocks.insert(ordinal, tail);
        }
        Ok(value)
    }

    /// Returns `true` if the next field is a subblock with index `index`.
    pub fn has_subblock(&mut self, index: u64) -> Result<bool, FrameError> {
        self.check_tag(index, TagType::Length4)
    }

    fn close(&mut self, offset: usize, size: usize, what: &str) -> Result<Vec<u8>, FrameError> {
        let end = offset + size;
        let pos = self.data.x;
        if pos > end {
            return Err(FrameError::Overflow {
                offset,
                declared: size,
                consumed: pos - offset,
            });
        }
        if pos == end {
            return Ok(Vec::new());
        }
        let tail = self.data.try_buf(end - pos)?.to_vec();
        warn!(offset, size, unread = tail.len(), "{what} has unread trailing data");
        Ok(tail)
    }

    // ── Tags ────────────────────────────────────────────────────────────────

    fn peek_tag(&mut self) -> Result<Option<Tag>, FrameError> {
        if self.bytes_remaining_in_block() == 0 {
            return Ok(None);
        }
        let start = self.data.x;
        let raw = self.data.try_varuint();
        self.data.seek(start);
        let raw = raw?;
        Ok(Some(Tag {
            index: raw >> 4,
            kind: (raw & 0xF) as u8,
        }))
    }

    /// Returns `true` if the next field has the given index and kind. Never
    /// moves the cursor.
    pub fn check_tag(&mut self, index: u64, kind: TagType) -> Result<bool, FrameError> {
        Ok(self.peek_tag()? == Some(Tag { index, kind: kind as u8 }))
    }

    /// Consumes a tag, failing with [`FrameError::UnexpectedTag`] (cursor
    /// unchanged) if it does not match.
    pub fn read_tag(&mut self, index: u64, kind: TagType) -> Result<(), FrameError> {
        let expected = Tag { index, kind: kind as u8 };
        let actual = self.peek_tag()?;
        if actual != Some(expected) {
            return Err(FrameError::UnexpectedTag {
                offset: self.data.x,
                expected,
                actual,
            });
        }
        self.data.try_varuint()?;
        Ok(())
    }

    /// Runs a field read, turning an unexpected tag into `None`.
    ///
    /// On a mismatch the reader is rewound to where `f` started, including
    /// any subblocks `f` had already entered.
    pub fn read_optional<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, FrameError>,
    ) -> Result<Option<T>, FrameError> {
        let x = self.data.x;
        let depth = self.ends.len();
        let ordinal = self.next_ordinal;
        match f(self) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_unexpected_tag() => {
                self.data.seek(x);
                self.ends.truncate(depth);
                self.next_ordinal = ordinal;
                self.extra.subblocks.retain(|k, _| *k < ordinal);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    // ── Raw primitives ──────────────────────────────────────────────────────

    pub fn read_uint8(&mut self) -> Result<u8, FrameError> {
        Ok(self.data.try_u8()?)
    }

    pub fn read_raw_bool(&mut self) -> Result<bool, FrameError> {
        Ok(self.data.try_bool()?)
    }

    pub fn read_uint16(&mut self) -> Result<u16, FrameError> {
        Ok(self.data.try_u16()?)
    }

    pub fn read_uint32(&mut self) -> Result<u32, FrameError> {
        Ok(self.data.try_u32()?)
    }

    pub fn read_float32(&mut self) -> Result<f32, FrameError> {
        Ok(self.data.try_f32()?)
    }

    pub fn read_float64(&mut self) -> Result<f64, FrameError> {
        Ok(self.data.try_f64()?)
    }

    pub fn read_varuint(&mut self) -> Result<u64, FrameError> {
        Ok(self.data.try_varuint()?)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], FrameError> {
        Ok(self.data.try_buf(n)?)
    }

    /// An identifier without a tag: author byte, then varuint sequence.
    pub fn read_crdt_id(&mut self) -> Result<CrdtId, FrameError> {
        let part1 = self.data.try_u8()?;
        let part2 = self.data.try_varuint()?;
        Ok(CrdtId::new(part1, part2))
    }

    // ── Tagged fields ───────────────────────────────────────────────────────

    pub fn read_id(&mut self, index: u64) -> Result<CrdtId, FrameError> {
        self.read_tag(index, TagType::Id)?;
        self.read_crdt_id()
    }

    pub fn read_bool(&mut self, index: u64) -> Result<bool, FrameError> {
        self.read_tag(index, TagType::Byte1)?;
        self.read_raw_bool()
    }

    pub fn read_byte(&mut self, index: u64) -> Result<u8, FrameError> {
        self.read_tag(index, TagType::Byte1)?;
        self.read_uint8()
    }

    pub fn read_int(&mut self, index: u64) -> Result<u32, FrameError> {
        self.read_tag(index, TagType::Byte4)?;
        self.read_uint32()
    }

    pub fn read_float(&mut self, index: u64) -> Result<f32, FrameError> {
        self.read_tag(index, TagType::Byte4)?;
        self.read_float32()
    }

    pub fn read_double(&mut self, index: u64) -> Result<f64, FrameError> {
        self.read_tag(index, TagType::Byte8)?;
        self.read_float64()
    }

    /// A string subblock: varuint byte length, ascii flag, UTF-8 bytes.
    pub fn read_string(&mut self, index: u64) -> Result<String, FrameError> {
        self.read_subblock(index, |r| r.read_string_body())
    }

    /// A string subblock with an optional trailing format code (field 2).
    pub fn read_string_with_format(
        &mut self,
        index: u64,
    ) -> Result<(String, Option<u32>), FrameError> {
        self.read_subblock(index, |r| {
            let s = r.read_string_body()?;
            let fmt = if r.bytes_remaining_in_block() > 0 {
                Some(r.read_int(2)?)
            } else {
                None
            };
            Ok((s, fmt))
        })
    }

    fn read_string_body(&mut self) -> Result<String, FrameError> {
        let len = self.read_varuint()? as usize;
        let is_ascii = self.read_raw_bool()?;
        if !is_ascii {
            return Err(FrameError::InvalidString("ascii flag not set".into()));
        }
        if len > self.bytes_remaining_in_block() {
            return Err(FrameError::InvalidString(format!(
                "length {len} exceeds subblock"
            )));
        }
        Ok(self.data.try_utf8(len)?.to_owned())
    }

    fn read_lww<T>(
        &mut self,
        index: u64,
        f: impl FnOnce(&mut Self) -> Result<T, FrameError>,
    ) -> Result<Lww<T>, FrameError> {
        self.read_subblock(index, |r| {
            let timestamp = r.read_id(1)?;
            let value = f(r)?;
            Ok(Lww::new(timestamp, value))
        })
    }

    pub fn read_lww_bool(&mut self, index: u64) -> Result<Lww<bool>, FrameError> {
        self.read_lww(index, |r| r.read_bool(2))
    }

    pub fn read_lww_byte(&mut self, index: u64) -> Result<Lww<u8>, FrameError> {
        self.read_lww(index, |r| r.read_byte(2))
    }

    pub fn read_lww_float(&mut self, index: u64) -> Result<Lww<f32>, FrameError> {
        self.read_lww(index, |r| r.read_float(2))
    }

    pub fn read_lww_id(&mut self, index: u64) -> Result<Lww<CrdtId>, FrameError> {
        self.read_lww(index, |r| r.read_id(2))
    }

    pub fn read_lww_string(&mut self, index: u64) -> Result<Lww<String>, FrameError> {
        self.read_lww(index, |r| r.read_string(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(block_type: u8, body: &[u8]) -> Vec<u8> {
        let mut out = (body.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(&[0, 1, 1, block_type]);
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn header_must_match() {
        let mut r = TaggedBlockReader::new(HEADER_V6);
        assert!(r.read_header().is_ok());
        let mut bad = HEADER_V6.to_vec();
        bad[32] = b'7';
        assert_eq!(TaggedBlockReader::new(&bad).read_header(), Err(FrameError::InvalidHeader));
        assert_eq!(TaggedBlockReader::new(b"short").read_header(), Err(FrameError::InvalidHeader));
    }

    #[test]
    fn clean_end_of_stream() {
        let mut r = TaggedBlockReader::new(&[]);
        assert_eq!(r.read_block_header(), Ok(None));
    }

    #[test]
    fn partial_header_is_truncated() {
        let mut r = TaggedBlockReader::new(&[1, 0, 0]);
        assert_eq!(r.read_block_header(), Err(FrameError::TruncatedInput));
    }

    #[test]
    fn body_past_end_is_truncated() {
        let mut data = block(1, &[0x1f, 0x00, 0x01]);
        data.truncate(data.len() - 1);
        let mut r = TaggedBlockReader::new(&data);
        assert_eq!(r.read_block_header(), Err(FrameError::TruncatedInput));
    }

    #[test]
    fn reserved_byte_must_be_zero() {
        let mut data = block(1, &[]);
        data[4] = 9;
        let mut r = TaggedBlockReader::new(&data);
        assert_eq!(r.read_block_header(), Err(FrameError::InvalidReservedByte(9)));
    }

    #[test]
    fn reads_tagged_id() {
        // tag 1/Id = 0x1f, author 2, sequence 300
        let data = block(1, &[0x1f, 0x02, 0xac, 0x02]);
        let mut r = TaggedBlockReader::new(&data);
        let info = r.read_block_header().unwrap().unwrap();
        assert_eq!(info.block_type, 1);
        let (id, extra) = r.read_block_body(&info, |r| r.read_id(1)).unwrap();
        assert_eq!(id, CrdtId::new(2, 300));
        assert!(extra.is_empty());
        assert_eq!(r.read_block_header(), Ok(None));
    }

    #[test]
    fn unexpected_tag_rewinds() {
        let data = block(1, &[0x14, 7, 0, 0, 0]);
        let mut r = TaggedBlockReader::new(&data);
        let info = r.read_block_header().unwrap().unwrap();
        let (value, _) = r
            .read_block_body(&info, |r| {
                let start = r.tell();
                match r.read_id(1) {
                    Err(FrameError::UnexpectedTag { actual, .. }) => {
                        assert_eq!(actual, Some(Tag { index: 1, kind: 0x4 }));
                    }
                    other => panic!("expected tag mismatch, got {other:?}"),
                }
                assert_eq!(r.tell(), start);
                r.read_int(1)
            })
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn optional_read_defaults_at_end_of_block() {
        let data = block(1, &[0x14, 7, 0, 0, 0]);
        let mut r = TaggedBlockReader::new(&data);
        let info = r.read_block_header().unwrap().unwrap();
        let ((a, b), _) = r
            .read_block_body(&info, |r| {
                let a = r.read_optional(|r| r.read_int(1))?;
                let b = r.read_optional(|r| r.read_int(2))?;
                Ok((a, b))
            })
            .unwrap();
        assert_eq!(a, Some(7));
        assert_eq!(b, None);
    }

    #[test]
    fn unread_subblock_tail_is_kept() {
        // subblock 2 of length 6: a byte field (1/Byte1 = 0x11, 5) and 3 unknown bytes
        let body = [0x2c, 6, 0, 0, 0, 0x11, 5, 0xaa, 0xbb, 0xcc, 0xdd];
        let data = block(1, &body);
        let mut r = TaggedBlockReader::new(&data);
        let info = r.read_block_header().unwrap().unwrap();
        let (value, extra) = r
            .read_block_body(&info, |r| r.read_subblock(2, |r| r.read_byte(1)))
            .unwrap();
        assert_eq!(value, 5);
        assert_eq!(extra.subblocks.get(&0), Some(&vec![0xaa, 0xbb, 0xcc, 0xdd]));
        assert!(extra.block.is_empty());
    }

    #[test]
    fn unread_block_tail_is_kept() {
        let data = block(1, &[0x11, 1, 0x99]);
        let mut r = TaggedBlockReader::new(&data);
        let info = r.read_block_header().unwrap().unwrap();
        let (value, extra) = r.read_block_body(&info, |r| r.read_bool(1)).unwrap();
        assert!(value);
        assert_eq!(extra.block, vec![0x99]);
    }

    #[test]
    fn overflow_is_detected_and_cursor_moves_to_block_end() {
        let mut data = block(1, &[0x2c, 1, 0, 0, 0, 0x14]);
        data.extend_from_slice(&[1, 2, 3, 4]);
        let mut r = TaggedBlockReader::new(&data);
        let info = r.read_block_header().unwrap().unwrap();
        let result = r.read_block_body(&info, |r| r.read_subblock(2, |r| r.read_int(1)));
        assert!(matches!(result, Err(FrameError::Overflow { declared: 1, consumed: 5, .. })));
        assert_eq!(r.tell(), info.end());
    }

    #[test]
    fn lww_string() {
        // 1/Len4, len 11: { 1/Id (0x1f) 1 5, 2/Len4 (0x2c) len 3: varuint 1, ascii 1, 'x' }
        let body = [0x1c, 11, 0, 0, 0, 0x1f, 1, 5, 0x2c, 3, 0, 0, 0, 1, 1, b'x'];
        let data = block(2, &body);
        let mut r = TaggedBlockReader::new(&data);
        let info = r.read_block_header().unwrap().unwrap();
        let (lww, extra) = r.read_block_body(&info, |r| r.read_lww_string(1)).unwrap();
        assert_eq!(lww, Lww::new(CrdtId::new(1, 5), "x".to_string()));
        assert!(extra.is_empty());
    }
}
