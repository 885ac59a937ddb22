//! Writer side of the tagged block format, mirroring [`super::TaggedBlockReader`].

use rmscene_buffers::Writer;

use super::{ExtraData, FrameError, TagType, HEADER_V6};
use crate::crdt::{CrdtId, Lww};

/// Writer for the tagged block structure.
///
/// Block and subblock bodies are buffered in a fresh [`Writer`] and emitted
/// to the parent, length first, once the body closure returns.
pub struct TaggedBlockWriter {
    out: Writer,
    /// Buffers of the open block and subblocks, innermost last.
    stack: Vec<Writer>,
    extra: ExtraData,
    next_ordinal: u32,
}

impl Default for TaggedBlockWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TaggedBlockWriter {
    pub fn new() -> Self {
        Self {
            out: Writer::new(),
            stack: Vec::new(),
            extra: ExtraData::default(),
            next_ordinal: 0,
        }
    }

    /// Returns everything written so far.
    pub fn flush(&mut self) -> Vec<u8> {
        self.out.flush()
    }

    #[inline]
    fn cur(&mut self) -> &mut Writer {
        match self.stack.last_mut() {
            Some(w) => w,
            None => &mut self.out,
        }
    }

    pub fn write_header(&mut self) {
        self.cur().buf(HEADER_V6);
    }

    // ── Blocks ──────────────────────────────────────────────────────────────

    /// Writes a top-level block whose body is produced by `f`.
    ///
    /// `extra` holds the trailing bytes captured when the block was read;
    /// they are re-appended to the block and to the matching subblocks.
    pub fn write_block(
        &mut self,
        block_type: u8,
        min_version: u8,
        current_version: u8,
        extra: &ExtraData,
        f: impl FnOnce(&mut Self) -> Result<(), FrameError>,
    ) -> Result<(), FrameError> {
        if !self.stack.is_empty() {
            return Err(FrameError::NestedBlock);
        }
        self.extra = extra.clone();
        self.next_ordinal = 0;
        self.stack.push(Writer::new());
        let result = f(self);
        let body = self.stack.pop().map(|mut w| w.flush()).unwrap_or_default();
        self.stack.clear();
        result?;
        self.write_raw_block(block_type, min_version, current_version, &body, &extra.block)
    }

    /// Writes a block header followed by an already-encoded body.
    pub fn write_raw_block(
        &mut self,
        block_type: u8,
        min_version: u8,
        current_version: u8,
        body: &[u8],
        tail: &[u8],
    ) -> Result<(), FrameError> {
        if !self.stack.is_empty() {
            return Err(FrameError::NestedBlock);
        }
        let size = u32::try_from(body.len() + tail.len())
            .map_err(|_| FrameError::InvalidValue("block larger than 4 GiB".into()))?;
        self.out.u32(size);
        self.out.u8(0);
        self.out.u8(min_version);
        self.out.u8(current_version);
        self.out.u8(block_type);
        self.out.buf(body);
        self.out.buf(tail);
        Ok(())
    }

    /// Writes a length-prefixed subblock with field index `index`.
    pub fn write_subblock(
        &mut self,
        index: u64,
        f: impl FnOnce(&mut Self) -> Result<(), FrameError>,
    ) -> Result<(), FrameError> {
        self.write_tag(index, TagType::Length4)?;
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        let depth = self.stack.len();
        self.stack.push(Writer::new());
        let result = f(self);
        self.stack.truncate(depth + 1);
        let mut body = self.stack.pop().map(|mut w| w.flush()).unwrap_or_default();
        result?;
        if let Some(tail) = self.extra.subblocks.get(&ordinal) {
            body.extend_from_slice(tail);
        }
        let size = u32::try_from(body.len())
            .map_err(|_| FrameError::InvalidValue("subblock larger than 4 GiB".into()))?;
        let w = self.cur();
        w.u32(size);
        w.buf(&body);
        Ok(())
    }

    // ── Raw primitives ──────────────────────────────────────────────────────

    pub fn write_tag(&mut self, index: u64, kind: TagType) -> Result<(), FrameError> {
        let raw = index
            .checked_mul(16)
            .ok_or_else(|| FrameError::InvalidValue(format!("field index {index} too large")))?;
        self.write_varuint(raw | kind as u64)
    }

    pub fn write_uint8(&mut self, value: u8) {
        self.cur().u8(value);
    }

    pub fn write_raw_bool(&mut self, value: bool) {
        self.cur().bool(value);
    }

    pub fn write_uint16(&mut self, value: u16) {
        self.cur().u16(value);
    }

    pub fn write_uint32(&mut self, value: u32) {
        self.cur().u32(value);
    }

    pub fn write_float32(&mut self, value: f32) {
        self.cur().f32(value);
    }

    pub fn write_float64(&mut self, value: f64) {
        self.cur().f64(value);
    }

    pub fn write_varuint(&mut self, value: u64) -> Result<(), FrameError> {
        Ok(self.cur().varuint(value)?)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.cur().buf(bytes);
    }

    pub fn write_crdt_id(&mut self, id: CrdtId) -> Result<(), FrameError> {
        self.write_uint8(id.part1);
        self.write_varuint(id.part2)
    }

    // ── Tagged fields ───────────────────────────────────────────────────────

    pub fn write_id(&mut self, index: u64, id: CrdtId) -> Result<(), FrameError> {
        self.write_tag(index, TagType::Id)?;
        self.write_crdt_id(id)
    }

    pub fn write_bool(&mut self, index: u64, value: bool) -> Result<(), FrameError> {
        self.write_tag(index, TagType::Byte1)?;
        self.write_raw_bool(value);
        Ok(())
    }

    pub fn write_byte(&mut self, index: u64, value: u8) -> Result<(), FrameError> {
        self.write_tag(index, TagType::Byte1)?;
        self.write_uint8(value);
        Ok(())
    }

    pub fn write_int(&mut self, index: u64, value: u32) -> Result<(), FrameError> {
        self.write_tag(index, TagType::Byte4)?;
        self.write_uint32(value);
        Ok(())
    }

    pub fn write_float(&mut self, index: u64, value: f32) -> Result<(), FrameError> {
        self.write_tag(index, TagType::Byte4)?;
        self.write_float32(value);
        Ok(())
    }

    pub fn write_double(&mut self, index: u64, value: f64) -> Result<(), FrameError> {
        self.write_tag(index, TagType::Byte8)?;
        self.write_float64(value);
        Ok(())
    }

    pub fn write_string(&mut self, index: u64, value: &str) -> Result<(), FrameError> {
        self.write_subblock(index, |w| w.write_string_body(value))
    }

    pub fn write_string_with_format(
        &mut self,
        index: u64,
        value: &str,
        format: Option<u32>,
    ) -> Result<(), FrameError> {
        self.write_subblock(index, |w| {
            w.write_string_body(value)?;
            if let Some(code) = format {
                w.write_int(2, code)?;
            }
            Ok(())
        })
    }

    fn write_string_body(&mut self, value: &str) -> Result<(), FrameError> {
        self.write_varuint(value.len() as u64)?;
        self.write_raw_bool(true);
        self.cur().utf8(value);
        Ok(())
    }

    fn write_lww<T>(
        &mut self,
        index: u64,
        lww: &Lww<T>,
        f: impl FnOnce(&mut Self, &T) -> Result<(), FrameError>,
    ) -> Result<(), FrameError> {
        self.write_subblock(index, |w| {
            w.write_id(1, lww.timestamp)?;
            f(w, &lww.value)
        })
    }

    pub fn write_lww_bool(&mut self, index: u64, lww: &Lww<bool>) -> Result<(), FrameError> {
        self.write_lww(index, lww, |w, v| w.write_bool(2, *v))
    }

    pub fn write_lww_byte(&mut self, index: u64, lww: &Lww<u8>) -> Result<(), FrameError> {
        self.write_lww(index, lww, |w, v| w.write_byte(2, *v))
    }

    pub fn write_lww_float(&mut self, index: u64, lww: &Lww<f32>) -> Result<(), FrameError> {
        self.write_lww(index, lww, |w, v| w.write_float(2, *v))
    }

    pub fn write_lww_id(&mut self, index: u64, lww: &Lww<CrdtId>) -> Result<(), FrameError> {
        self.write_lww(index, lww, |w, v| w.write_id(2, *v))
    }

    pub fn write_lww_string(&mut self, index: u64, lww: &Lww<String>) -> Result<(), FrameError> {
        self.write_lww(index, lww, |w, v| w.write_string(2, v))
    }
}
