//! Typed block records and the stream-level reader and writer.
//!
//! A file is the v6 header followed by a flat list of blocks. Each block
//! type code maps to exactly one [`BlockData`] variant; codes that are not
//! known, and known blocks whose body fails to decode, become
//! [`BlockData::Unreadable`] and are written back verbatim.

mod codec;
pub mod points;

use indexmap::IndexMap;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::crdt::{CrdtId, CrdtSequenceItem, Lww};
use crate::options::{WriteOptions, LINE_V2_THRESHOLD};
use crate::scene_items::{GlyphRange, Group, Line, Text};
use crate::tagged_block::{
    BlockInfo, ExtraData, FrameError, TaggedBlockReader, TaggedBlockWriter,
};

// ── Block type registry ─────────────────────────────────────────────────────

/// Numeric block type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlockType {
    MigrationInfo = 0x00,
    SceneTree = 0x01,
    TreeNode = 0x02,
    SceneGlyphItem = 0x03,
    SceneGroupItem = 0x04,
    SceneLineItem = 0x05,
    SceneTextItem = 0x06,
    RootText = 0x07,
    AuthorIds = 0x09,
    PageInfo = 0x0A,
    SceneInfo = 0x0D,
}

impl BlockType {
    /// Maps a type code to its codec, `None` for codes this crate does not
    /// understand.
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::MigrationInfo),
            0x01 => Some(Self::SceneTree),
            0x02 => Some(Self::TreeNode),
            0x03 => Some(Self::SceneGlyphItem),
            0x04 => Some(Self::SceneGroupItem),
            0x05 => Some(Self::SceneLineItem),
            0x06 => Some(Self::SceneTextItem),
            0x07 => Some(Self::RootText),
            0x09 => Some(Self::AuthorIds),
            0x0A => Some(Self::PageInfo),
            0x0D => Some(Self::SceneInfo),
            _ => None,
        }
    }

    /// `(min_version, current_version)` written for new blocks.
    pub fn default_versions(self) -> (u8, u8) {
        match self {
            BlockType::SceneLineItem => (2, 2),
            _ => (1, 1),
        }
    }
}

// ── Records ─────────────────────────────────────────────────────────────────

/// Author index to stable author UUID.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorIds {
    pub authors: IndexMap<u16, Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationInfo {
    pub migration_id: CrdtId,
    pub is_device: bool,
    pub unknown: Option<bool>,
}

/// Page statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageInfo {
    pub loads_count: u32,
    pub merges_count: u32,
    pub text_chars_count: u32,
    pub text_lines_count: u32,
    pub type_folio_use_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneInfo {
    pub current_layer: Lww<CrdtId>,
    pub background_visible: Option<Lww<bool>>,
    pub root_document_visible: Option<Lww<bool>>,
}

/// Declares `tree_id` as a node under `parent_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEdge {
    pub tree_id: CrdtId,
    pub node_id: CrdtId,
    pub is_update: bool,
    pub parent_id: CrdtId,
}

/// A child sequence item of the group `parent_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneItemBlock<T> {
    pub parent_id: CrdtId,
    pub item: CrdtSequenceItem<T>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RootText {
    pub block_id: CrdtId,
    pub value: Text,
}

/// A block kept as raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Unreadable {
    pub block_type: u8,
    /// Why the block could not be decoded.
    pub reason: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockData {
    MigrationInfo(MigrationInfo),
    SceneTree(TreeEdge),
    /// Node metadata. The group's children are always empty here.
    TreeNode(Group),
    SceneGlyphItem(SceneItemBlock<GlyphRange>),
    /// The value is the node id of the referenced group.
    SceneGroupItem(SceneItemBlock<CrdtId>),
    SceneLineItem(SceneItemBlock<Line>),
    /// Text items carry no decoded payload; their bytes stay in the extra
    /// data.
    SceneTextItem(SceneItemBlock<()>),
    RootText(RootText),
    AuthorIds(AuthorIds),
    PageInfo(PageInfo),
    SceneInfo(SceneInfo),
    Unreadable(Unreadable),
}

impl BlockData {
    pub fn block_type(&self) -> u8 {
        let known = match self {
            BlockData::MigrationInfo(_) => BlockType::MigrationInfo,
            BlockData::SceneTree(_) => BlockType::SceneTree,
            BlockData::TreeNode(_) => BlockType::TreeNode,
            BlockData::SceneGlyphItem(_) => BlockType::SceneGlyphItem,
            BlockData::SceneGroupItem(_) => BlockType::SceneGroupItem,
            BlockData::SceneLineItem(_) => BlockType::SceneLineItem,
            BlockData::SceneTextItem(_) => BlockType::SceneTextItem,
            BlockData::RootText(_) => BlockType::RootText,
            BlockData::AuthorIds(_) => BlockType::AuthorIds,
            BlockData::PageInfo(_) => BlockType::PageInfo,
            BlockData::SceneInfo(_) => BlockType::SceneInfo,
            BlockData::Unreadable(u) => return u.block_type,
        };
        known as u8
    }
}

/// One top-level block: header versions, decoded body, and the bytes the
/// codec left unread.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub min_version: u8,
    pub current_version: u8,
    pub extra: ExtraData,
    pub data: BlockData,
}

impl Block {
    /// A block with the default versions for its type and no extra data.
    pub fn new(data: BlockData) -> Self {
        let (min_version, current_version) = BlockType::from_u8(data.block_type())
            .map(BlockType::default_versions)
            .unwrap_or((1, 1));
        Self {
            min_version,
            current_version,
            extra: ExtraData::default(),
            data,
        }
    }

    pub fn is_unreadable(&self) -> bool {
        matches!(self.data, BlockData::Unreadable(_))
    }

    /// Versions to write under `options`. Only line items are affected.
    pub fn versions(&self, options: &WriteOptions) -> (u8, u8) {
        match (&self.data, options.format_version) {
            (BlockData::SceneLineItem(_), Some(v)) if v >= LINE_V2_THRESHOLD => (2, 2),
            (BlockData::SceneLineItem(_), Some(_)) => (1, 1),
            _ => (self.min_version, self.current_version),
        }
    }
}

// ── Reading ─────────────────────────────────────────────────────────────────

/// Decodes the header and every block of a v6 file.
///
/// Only a bad header or broken outer framing fails the call; a block whose
/// body cannot be decoded is returned as [`BlockData::Unreadable`].
pub fn read_blocks(data: &[u8]) -> Result<Vec<Block>, FrameError> {
    let mut r = TaggedBlockReader::new(data);
    r.read_header()?;
    let mut blocks = Vec::new();
    while let Some(info) = r.read_block_header()? {
        blocks.push(read_block(&mut r, &info));
    }
    Ok(blocks)
}

fn read_block(r: &mut TaggedBlockReader<'_>, info: &BlockInfo) -> Block {
    let raw = r.block_body(info);
    let unreadable = |reason: String| Block {
        min_version: info.min_version,
        current_version: info.current_version,
        extra: ExtraData::default(),
        data: BlockData::Unreadable(Unreadable {
            block_type: info.block_type,
            reason,
            data: raw.to_vec(),
        }),
    };

    let Some(kind) = BlockType::from_u8(info.block_type) else {
        warn!(
            block_type = info.block_type,
            offset = info.offset,
            size = info.size,
            "unknown block type kept as raw bytes"
        );
        r.seek(info.end());
        return unreadable(format!("unknown block type {:#04x}", info.block_type));
    };
    debug!(?kind, offset = info.offset, size = info.size, "reading block");

    let version = info.current_version;
    match r.read_block_body(info, |r| codec::read_block_data(r, kind, version)) {
        Ok((data, extra)) => Block {
            min_version: info.min_version,
            current_version: info.current_version,
            extra,
            data,
        },
        Err(err) => {
            error!(?kind, offset = info.offset, %err, "failed to decode block");
            unreadable(err.to_string())
        }
    }
}

// ── Writing ─────────────────────────────────────────────────────────────────

/// Encodes `blocks`, header first, in the given order.
pub fn write_blocks(blocks: &[Block], options: &WriteOptions) -> Result<Vec<u8>, FrameError> {
    let mut w = TaggedBlockWriter::new();
    w.write_header();
    for block in blocks {
        write_block(&mut w, block, options)?;
    }
    Ok(w.flush())
}

pub fn write_block(
    w: &mut TaggedBlockWriter,
    block: &Block,
    options: &WriteOptions,
) -> Result<(), FrameError> {
    let (min_version, current_version) = block.versions(options);
    let block_type = block.data.block_type();
    match &block.data {
        BlockData::Unreadable(u) => {
            w.write_raw_block(block_type, min_version, current_version, &u.data, &[])
        }
        data => w.write_block(block_type, min_version, current_version, &block.extra, |w| {
            codec::write_block_data(w, data, current_version)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::END_MARKER;
    use crate::scene_items::{Pen, PenColor, Point};
    use crate::tagged_block::HEADER_V6;

    fn line_block() -> Block {
        let line = Line::new(Pen::Ballpoint2, PenColor::Black, vec![Point::new(1.0, 1.0)]);
        Block::new(BlockData::SceneLineItem(SceneItemBlock {
            parent_id: CrdtId::new(0, 11),
            item: CrdtSequenceItem::new(CrdtId::new(1, 20), END_MARKER, END_MARKER, 0, Some(line)),
        }))
    }

    #[test]
    fn registry_covers_known_codes() {
        for code in [0u8, 1, 2, 3, 4, 5, 6, 7, 9, 10, 13] {
            let kind = BlockType::from_u8(code).unwrap();
            assert_eq!(kind as u8, code);
        }
        assert_eq!(BlockType::from_u8(8), None);
        assert_eq!(BlockType::from_u8(0x20), None);
    }

    #[test]
    fn new_line_block_uses_version_2() {
        let b = line_block();
        assert_eq!((b.min_version, b.current_version), (2, 2));
        assert_eq!(b.versions(&WriteOptions::default()), (2, 2));
        assert_eq!(b.versions(&WriteOptions { format_version: Some(1) }), (1, 1));
        assert_eq!(b.versions(&WriteOptions { format_version: Some(3) }), (2, 2));
    }

    #[test]
    fn options_do_not_touch_other_blocks() {
        let b = Block::new(BlockData::PageInfo(PageInfo::default()));
        assert_eq!(b.versions(&WriteOptions { format_version: Some(2) }), (1, 1));
    }

    #[test]
    fn empty_file() {
        assert_eq!(read_blocks(HEADER_V6).unwrap(), vec![]);
        assert_eq!(write_blocks(&[], &WriteOptions::default()).unwrap(), HEADER_V6.to_vec());
    }

    #[test]
    fn page_info_roundtrip() {
        let info = PageInfo {
            loads_count: 3,
            merges_count: 0,
            text_chars_count: 12,
            text_lines_count: 2,
            type_folio_use_count: None,
        };
        let block = Block::new(BlockData::PageInfo(info.clone()));
        let bytes = write_blocks(&[block], &WriteOptions::default()).unwrap();
        let blocks = read_blocks(&bytes).unwrap();
        assert_eq!(blocks[0].data, BlockData::PageInfo(info));
        assert_eq!(write_blocks(&blocks, &WriteOptions::default()).unwrap(), bytes);
    }

    #[test]
    fn undecodable_block_becomes_unreadable() {
        // A page info block whose first field has the wrong kind.
        let mut bytes = HEADER_V6.to_vec();
        bytes.extend_from_slice(&[2, 0, 0, 0, 0, 1, 1, 0x0A, 0x11, 1]);
        let blocks = read_blocks(&bytes).unwrap();
        match &blocks[0].data {
            BlockData::Unreadable(u) => {
                assert_eq!(u.block_type, 0x0A);
                assert_eq!(u.data, vec![0x11, 1]);
                assert!(u.reason.contains("unexpected tag"));
            }
            other => panic!("expected unreadable block, got {other:?}"),
        }
        assert_eq!(write_blocks(&blocks, &WriteOptions::default()).unwrap(), bytes);
    }
}
