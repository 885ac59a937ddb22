//! Reader and writer for reMarkable v6 `.lines` scene files.
//!
//! Layers, from the bytes up:
//!
//! - [`tagged_block`]: block and subblock framing, tagged fields, extra data
//! - [`crdt`]: identifiers, LWW values and neighbour-linked sequences
//! - [`scene_items`]: groups, strokes, glyph ranges and text
//! - [`scene_stream`]: one codec per block type
//! - [`scene_tree`]: the tree assembled from the block stream
//! - [`text`]: paragraphs reconstructed from the root text
//!
//! ```no_run
//! let bytes = std::fs::read("page.rm").unwrap();
//! let doc = rmscene::decode(&bytes).unwrap();
//! for leaf in doc.tree.walk() {
//!     println!("{:?}", leaf.unwrap().item);
//! }
//! ```

pub mod crdt;
mod error;
pub mod options;
pub mod scene_items;
pub mod scene_stream;
pub mod scene_tree;
pub mod tagged_block;
pub mod text;

use std::io;

use tracing::debug;

pub use crdt::{CrdtId, CrdtSequence, CrdtSequenceItem, Lww, END_MARKER};
pub use error::{DecodeError, EncodeError, SceneError};
pub use options::{WriteOptions, LINE_V2_THRESHOLD};
pub use scene_items::{
    GlyphRange, Group, Line, ParagraphStyle, Pen, PenColor, Point, Rectangle, SceneItem, Text,
    TextItem,
};
pub use scene_stream::{read_blocks, write_blocks, Block, BlockData, BlockType};
pub use scene_tree::{build_tree, Leaf, SceneLeaf, SceneTree, Walk, ROOT_ID};
pub use tagged_block::{ExtraData, FrameError};
pub use text::{CrdtStr, Paragraph, TextDocument};

use scene_stream::{MigrationInfo, PageInfo, RootText, SceneItemBlock, TreeEdge};
use text::{expand_text_items, TextChar};

/// A decoded file: its block stream and the tree built from it.
///
/// Encoding writes `blocks`; `tree` is the read-only view derived from
/// them.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDocument {
    pub blocks: Vec<Block>,
    pub tree: SceneTree,
}

impl SceneDocument {
    /// Synthesizes a block stream for a tree built in memory.
    ///
    /// Blocks are emitted parents first so that decoding the result yields
    /// an equal tree.
    pub fn from_tree(tree: SceneTree) -> Result<Self, SceneError> {
        tree.validate()?;
        let mut blocks = vec![
            Block::new(BlockData::MigrationInfo(MigrationInfo {
                migration_id: CrdtId::new(1, 1),
                is_device: true,
                unknown: None,
            })),
            Block::new(BlockData::PageInfo(page_info(&tree)?)),
        ];

        let ordered = tree.groups_parents_first()?;
        for group in ordered.iter().skip(1) {
            let parent_id = tree
                .parent_of(&group.node_id)
                .ok_or(SceneError::MissingParent(group.node_id))?;
            blocks.push(Block::new(BlockData::SceneTree(TreeEdge {
                tree_id: group.node_id,
                node_id: END_MARKER,
                is_update: true,
                parent_id,
            })));
        }

        if let Some(text) = &tree.root_text {
            blocks.push(Block::new(BlockData::RootText(RootText {
                block_id: END_MARKER,
                value: text.clone(),
            })));
        }

        for group in tree.groups() {
            let mut meta = Group::new(group.node_id);
            meta.label = group.label.clone();
            meta.visible = group.visible.clone();
            meta.anchor_id = group.anchor_id.clone();
            meta.anchor_type = group.anchor_type.clone();
            meta.anchor_threshold = group.anchor_threshold.clone();
            meta.anchor_origin_x = group.anchor_origin_x.clone();
            blocks.push(Block::new(BlockData::TreeNode(meta)));
        }

        for group in tree.groups() {
            let parent_id = group.node_id;
            for item in group.children.sequence_items() {
                let data = match &item.value {
                    Some(SceneItem::Group(id)) => BlockData::SceneGroupItem(SceneItemBlock {
                        parent_id,
                        item: relink(item, Some(*id)),
                    }),
                    Some(SceneItem::GlyphRange(glyph)) => {
                        BlockData::SceneGlyphItem(SceneItemBlock {
                            parent_id,
                            item: relink(item, Some(glyph.clone())),
                        })
                    }
                    Some(SceneItem::Line(line)) => BlockData::SceneLineItem(SceneItemBlock {
                        parent_id,
                        item: relink(item, Some(line.clone())),
                    }),
                    // Tombstones are written as line items.
                    None => BlockData::SceneLineItem(SceneItemBlock {
                        parent_id,
                        item: relink(item, None),
                    }),
                };
                blocks.push(Block::new(data));
            }
        }

        debug!(blocks = blocks.len(), "synthesized block stream");
        Ok(Self { blocks, tree })
    }

    /// Paragraphs of the root text, if the page has one.
    pub fn text(&self) -> Result<Option<TextDocument>, SceneError> {
        self.tree
            .root_text
            .as_ref()
            .map(TextDocument::from_text)
            .transpose()
    }
}

fn relink<T>(item: &CrdtSequenceItem<SceneItem>, value: Option<T>) -> CrdtSequenceItem<T> {
    CrdtSequenceItem::new(item.item_id, item.left_id, item.right_id, item.deleted_length, value)
}

fn page_info(tree: &SceneTree) -> Result<PageInfo, SceneError> {
    let (chars, lines) = match &tree.root_text {
        Some(text) => {
            let chars = expand_text_items(&text.items)
                .sequence_items()
                .filter(|c| matches!(c.value, Some(TextChar::Char(_))))
                .count();
            let lines = TextDocument::from_text(text)?.paragraphs.len();
            (chars, lines)
        }
        None => (0, 0),
    };
    Ok(PageInfo {
        loads_count: 1,
        merges_count: 0,
        text_chars_count: u32::try_from(chars).unwrap_or(u32::MAX),
        text_lines_count: u32::try_from(lines).unwrap_or(u32::MAX),
        type_folio_use_count: None,
    })
}

/// Decodes a v6 file into its blocks and scene tree.
pub fn decode(data: &[u8]) -> Result<SceneDocument, DecodeError> {
    let blocks = read_blocks(data)?;
    let tree = build_tree(&blocks)?;
    Ok(SceneDocument { blocks, tree })
}

/// Encodes `doc` into `sink`.
pub fn encode(
    doc: &SceneDocument,
    options: &WriteOptions,
    sink: &mut impl io::Write,
) -> Result<(), EncodeError> {
    let bytes = write_blocks(&doc.blocks, options)?;
    sink.write_all(&bytes)?;
    Ok(())
}

pub fn encode_to_vec(doc: &SceneDocument, options: &WriteOptions) -> Result<Vec<u8>, EncodeError> {
    Ok(write_blocks(&doc.blocks, options)?)
}

/// Encodes a tree that did not come from a file.
pub fn encode_tree(
    tree: SceneTree,
    options: &WriteOptions,
    sink: &mut impl io::Write,
) -> Result<(), EncodeError> {
    let doc = SceneDocument::from_tree(tree)?;
    encode(&doc, options, sink)
}
