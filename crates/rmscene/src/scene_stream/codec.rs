//! Per-type block body codecs.
//!
//! Every `read_*` function here runs inside an open block and every
//! `write_*` function is its exact mirror, field for field.

use indexmap::IndexMap;
use tracing::warn;
use uuid::Uuid;

use super::points::{read_points, write_point};
use super::{
    AuthorIds, BlockData, BlockType, MigrationInfo, PageInfo, RootText, SceneInfo, SceneItemBlock,
    TreeEdge,
};
use crate::crdt::{CrdtId, CrdtSequence, CrdtSequenceItem, Lww};
use crate::scene_items::{
    item_kind, GlyphRange, Group, Line, ParagraphStyle, Pen, PenColor, Rectangle, Text, TextItem,
};
use crate::tagged_block::{FrameError, TaggedBlockReader, TaggedBlockWriter};

/// Marker byte in front of every paragraph style value.
const STYLE_MARKER: u8 = 17;
const UUID_SIZE: u64 = 16;

pub(super) fn read_block_data(
    r: &mut TaggedBlockReader<'_>,
    kind: BlockType,
    version: u8,
) -> Result<BlockData, FrameError> {
    Ok(match kind {
        BlockType::MigrationInfo => BlockData::MigrationInfo(read_migration_info(r)?),
        BlockType::SceneTree => BlockData::SceneTree(read_tree_edge(r)?),
        BlockType::TreeNode => BlockData::TreeNode(read_tree_node(r)?),
        BlockType::SceneGlyphItem => {
            BlockData::SceneGlyphItem(read_scene_item(r, item_kind::GLYPH_RANGE, read_glyph_range)?)
        }
        BlockType::SceneGroupItem => {
            BlockData::SceneGroupItem(read_scene_item(r, item_kind::GROUP, |r| r.read_id(2))?)
        }
        BlockType::SceneLineItem => BlockData::SceneLineItem(read_scene_item(
            r,
            item_kind::LINE,
            |r| read_line(r, version),
        )?),
        BlockType::SceneTextItem => {
            BlockData::SceneTextItem(read_scene_item(r, item_kind::TEXT, |_| Ok(()))?)
        }
        BlockType::RootText => BlockData::RootText(read_root_text(r)?),
        BlockType::AuthorIds => BlockData::AuthorIds(read_author_ids(r)?),
        BlockType::PageInfo => BlockData::PageInfo(read_page_info(r)?),
        BlockType::SceneInfo => BlockData::SceneInfo(read_scene_info(r)?),
    })
}

pub(super) fn write_block_data(
    w: &mut TaggedBlockWriter,
    data: &BlockData,
    version: u8,
) -> Result<(), FrameError> {
    match data {
        BlockData::MigrationInfo(v) => write_migration_info(w, v),
        BlockData::SceneTree(v) => write_tree_edge(w, v),
        BlockData::TreeNode(v) => write_tree_node(w, v),
        BlockData::SceneGlyphItem(v) => {
            write_scene_item(w, v, item_kind::GLYPH_RANGE, write_glyph_range)
        }
        BlockData::SceneGroupItem(v) => {
            write_scene_item(w, v, item_kind::GROUP, |w, id| w.write_id(2, *id))
        }
        BlockData::SceneLineItem(v) => {
            write_scene_item(w, v, item_kind::LINE, |w, line| write_line(w, line, version))
        }
        BlockData::SceneTextItem(v) => write_scene_item(w, v, item_kind::TEXT, |_, _| Ok(())),
        BlockData::RootText(v) => write_root_text(w, v),
        BlockData::AuthorIds(v) => write_author_ids(w, v),
        BlockData::PageInfo(v) => write_page_info(w, v),
        BlockData::SceneInfo(v) => write_scene_info(w, v),
        BlockData::Unreadable(_) => Err(FrameError::InvalidValue(
            "unreadable blocks are written raw".into(),
        )),
    }
}

// ── Document metadata ───────────────────────────────────────────────────────

fn read_author_ids(r: &mut TaggedBlockReader<'_>) -> Result<AuthorIds, FrameError> {
    let count = r.read_varuint()?;
    let mut authors = IndexMap::new();
    for _ in 0..count {
        let (index, uuid) = r.read_subblock(0, |r| {
            let len = r.read_varuint()?;
            if len != UUID_SIZE {
                return Err(FrameError::InvalidValue(format!("author uuid of {len} bytes")));
            }
            let bytes: [u8; 16] = r
                .read_bytes(16)?
                .try_into()
                .map_err(|_| FrameError::TruncatedInput)?;
            let uuid = Uuid::from_bytes_le(bytes);
            let index = r.read_uint16()?;
            Ok((index, uuid))
        })?;
        authors.insert(index, uuid);
    }
    Ok(AuthorIds { authors })
}

fn write_author_ids(w: &mut TaggedBlockWriter, v: &AuthorIds) -> Result<(), FrameError> {
    w.write_varuint(v.authors.len() as u64)?;
    for (index, uuid) in &v.authors {
        w.write_subblock(0, |w| {
            w.write_varuint(UUID_SIZE)?;
            w.write_bytes(&uuid.to_bytes_le());
            w.write_uint16(*index);
            Ok(())
        })?;
    }
    Ok(())
}

fn read_migration_info(r: &mut TaggedBlockReader<'_>) -> Result<MigrationInfo, FrameError> {
    Ok(MigrationInfo {
        migration_id: r.read_id(1)?,
        is_device: r.read_bool(2)?,
        unknown: r.read_optional(|r| r.read_bool(3))?,
    })
}

fn write_migration_info(w: &mut TaggedBlockWriter, v: &MigrationInfo) -> Result<(), FrameError> {
    w.write_id(1, v.migration_id)?;
    w.write_bool(2, v.is_device)?;
    if let Some(flag) = v.unknown {
        w.write_bool(3, flag)?;
    }
    Ok(())
}

fn read_page_info(r: &mut TaggedBlockReader<'_>) -> Result<PageInfo, FrameError> {
    Ok(PageInfo {
        loads_count: r.read_int(1)?,
        merges_count: r.read_int(2)?,
        text_chars_count: r.read_int(3)?,
        text_lines_count: r.read_int(4)?,
        type_folio_use_count: r.read_optional(|r| r.read_int(5))?,
    })
}

fn write_page_info(w: &mut TaggedBlockWriter, v: &PageInfo) -> Result<(), FrameError> {
    w.write_int(1, v.loads_count)?;
    w.write_int(2, v.merges_count)?;
    w.write_int(3, v.text_chars_count)?;
    w.write_int(4, v.text_lines_count)?;
    if let Some(count) = v.type_folio_use_count {
        w.write_int(5, count)?;
    }
    Ok(())
}

fn read_scene_info(r: &mut TaggedBlockReader<'_>) -> Result<SceneInfo, FrameError> {
    Ok(SceneInfo {
        current_layer: r.read_lww_id(1)?,
        background_visible: r.read_optional(|r| r.read_lww_bool(2))?,
        root_document_visible: r.read_optional(|r| r.read_lww_bool(3))?,
    })
}

fn write_scene_info(w: &mut TaggedBlockWriter, v: &SceneInfo) -> Result<(), FrameError> {
    w.write_lww_id(1, &v.current_layer)?;
    if let Some(lww) = &v.background_visible {
        w.write_lww_bool(2, lww)?;
    }
    if let Some(lww) = &v.root_document_visible {
        w.write_lww_bool(3, lww)?;
    }
    Ok(())
}

// ── Tree structure ──────────────────────────────────────────────────────────

fn read_tree_edge(r: &mut TaggedBlockReader<'_>) -> Result<TreeEdge, FrameError> {
    let tree_id = r.read_id(1)?;
    let node_id = r.read_id(2)?;
    let is_update = r.read_bool(3)?;
    let parent_id = r.read_subblock(4, |r| r.read_id(1))?;
    Ok(TreeEdge { tree_id, node_id, is_update, parent_id })
}

fn write_tree_edge(w: &mut TaggedBlockWriter, v: &TreeEdge) -> Result<(), FrameError> {
    w.write_id(1, v.tree_id)?;
    w.write_id(2, v.node_id)?;
    w.write_bool(3, v.is_update)?;
    w.write_subblock(4, |w| w.write_id(1, v.parent_id))
}

fn read_tree_node(r: &mut TaggedBlockReader<'_>) -> Result<Group, FrameError> {
    let mut group = Group::new(r.read_id(1)?);
    group.label = r.read_lww_string(2)?;
    group.visible = r.read_lww_bool(3)?;
    group.anchor_id = r.read_optional(|r| r.read_lww_id(7))?;
    group.anchor_type = r.read_optional(|r| r.read_lww_byte(8))?;
    group.anchor_threshold = r.read_optional(|r| r.read_lww_float(9))?;
    group.anchor_origin_x = r.read_optional(|r| r.read_lww_float(10))?;
    Ok(group)
}

fn write_tree_node(w: &mut TaggedBlockWriter, g: &Group) -> Result<(), FrameError> {
    w.write_id(1, g.node_id)?;
    w.write_lww_string(2, &g.label)?;
    w.write_lww_bool(3, &g.visible)?;
    if let Some(lww) = &g.anchor_id {
        w.write_lww_id(7, lww)?;
    }
    if let Some(lww) = &g.anchor_type {
        w.write_lww_byte(8, lww)?;
    }
    if let Some(lww) = &g.anchor_threshold {
        w.write_lww_float(9, lww)?;
    }
    if let Some(lww) = &g.anchor_origin_x {
        w.write_lww_float(10, lww)?;
    }
    Ok(())
}

// ── Scene items ─────────────────────────────────────────────────────────────

/// Shared envelope of the four scene item blocks.
fn read_scene_item<'a, T>(
    r: &mut TaggedBlockReader<'a>,
    kind: u8,
    read_value: impl FnOnce(&mut TaggedBlockReader<'a>) -> Result<T, FrameError>,
) -> Result<SceneItemBlock<T>, FrameError> {
    let parent_id = r.read_id(1)?;
    let item_id = r.read_id(2)?;
    let left_id = r.read_id(3)?;
    let right_id = r.read_id(4)?;
    let deleted_length = r.read_int(5)?;
    let value = if r.has_subblock(6)? {
        Some(r.read_subblock(6, |r| {
            let found = r.read_uint8()?;
            if found != kind {
                return Err(FrameError::InvalidValue(format!(
                    "item kind {found}, expected {kind}"
                )));
            }
            read_value(r)
        })?)
    } else {
        None
    };
    Ok(SceneItemBlock {
        parent_id,
        item: CrdtSequenceItem::new(item_id, left_id, right_id, deleted_length, value),
    })
}

fn write_scene_item<T>(
    w: &mut TaggedBlockWriter,
    v: &SceneItemBlock<T>,
    kind: u8,
    write_value: impl FnOnce(&mut TaggedBlockWriter, &T) -> Result<(), FrameError>,
) -> Result<(), FrameError> {
    let item = &v.item;
    w.write_id(1, v.parent_id)?;
    w.write_id(2, item.item_id)?;
    w.write_id(3, item.left_id)?;
    w.write_id(4, item.right_id)?;
    w.write_int(5, item.deleted_length)?;
    if let Some(value) = &item.value {
        w.write_subblock(6, |w| {
            w.write_uint8(kind);
            write_value(w, value)
        })?;
    }
    Ok(())
}

fn read_line(r: &mut TaggedBlockReader<'_>, version: u8) -> Result<Line, FrameError> {
    let tool = Pen::from_code(r.read_int(1)?);
    let color = PenColor::from_code(r.read_int(2)?);
    let thickness_scale = r.read_double(3)?;
    let starting_length = r.read_float(4)?;
    let points = r.read_subblock(5, |r| read_points(r, version))?;
    let timestamp = r.read_id(6)?;
    let move_id = r.read_optional(|r| r.read_id(7))?;
    Ok(Line {
        color,
        tool,
        points,
        thickness_scale,
        starting_length,
        timestamp,
        move_id,
    })
}

fn write_line(w: &mut TaggedBlockWriter, line: &Line, version: u8) -> Result<(), FrameError> {
    w.write_int(1, line.tool.code())?;
    w.write_int(2, line.color.code())?;
    w.write_double(3, line.thickness_scale)?;
    w.write_float(4, line.starting_length)?;
    w.write_subblock(5, |w| {
        for point in &line.points {
            write_point(w, point, version);
        }
        Ok(())
    })?;
    w.write_id(6, line.timestamp)?;
    if let Some(id) = line.move_id {
        w.write_id(7, id)?;
    }
    Ok(())
}

fn read_glyph_range(r: &mut TaggedBlockReader<'_>) -> Result<GlyphRange, FrameError> {
    let start = r.read_optional(|r| r.read_int(2))?;
    let length = r.read_int(3)?;
    let color = PenColor::from_code(r.read_int(4)?);
    let text = r.read_string(5)?;
    let char_count = text.chars().count();
    if char_count != length as usize {
        warn!(length, char_count, "glyph range length does not match its text");
    }
    let rectangles = r.read_subblock(6, |r| {
        let count = r.read_varuint()?;
        let mut rects = Vec::new();
        for _ in 0..count {
            rects.push(Rectangle {
                x: r.read_float64()?,
                y: r.read_float64()?,
                w: r.read_float64()?,
                h: r.read_float64()?,
            });
        }
        Ok(rects)
    })?;
    Ok(GlyphRange { start, length, text, color, rectangles })
}

fn write_glyph_range(w: &mut TaggedBlockWriter, g: &GlyphRange) -> Result<(), FrameError> {
    if let Some(start) = g.start {
        w.write_int(2, start)?;
    }
    w.write_int(3, g.length)?;
    w.write_int(4, g.color.code())?;
    w.write_string(5, &g.text)?;
    w.write_subblock(6, |w| {
        w.write_varuint(g.rectangles.len() as u64)?;
        for rect in &g.rectangles {
            w.write_float64(rect.x);
            w.write_float64(rect.y);
            w.write_float64(rect.w);
            w.write_float64(rect.h);
        }
        Ok(())
    })
}

// ── Root text ───────────────────────────────────────────────────────────────

fn read_root_text(r: &mut TaggedBlockReader<'_>) -> Result<RootText, FrameError> {
    let block_id = r.read_id(1)?;
    let (items, styles) = r.read_subblock(2, |r| {
        let items = r.read_subblock(1, |r| r.read_subblock(1, read_text_items))?;
        let styles = r.read_subblock(2, |r| r.read_subblock(1, read_text_styles))?;
        Ok((items, styles))
    })?;
    let (pos_x, pos_y) = r.read_subblock(3, |r| Ok((r.read_float64()?, r.read_float64()?)))?;
    let width = r.read_float(4)?;
    Ok(RootText {
        block_id,
        value: Text { items, styles, pos_x, pos_y, width },
    })
}

fn read_text_items(r: &mut TaggedBlockReader<'_>) -> Result<CrdtSequence<TextItem>, FrameError> {
    let count = r.read_varuint()?;
    let mut items = CrdtSequence::new();
    for _ in 0..count {
        let item = r.read_subblock(0, |r| {
            let item_id = r.read_id(2)?;
            let left_id = r.read_id(3)?;
            let right_id = r.read_id(4)?;
            let deleted_length = r.read_int(5)?;
            let value = if r.has_subblock(6)? {
                let (text, format) = r.read_string_with_format(6)?;
                Some(match format {
                    Some(_) if !text.is_empty() => {
                        return Err(FrameError::InvalidValue(format!(
                            "format item {item_id} carries text"
                        )));
                    }
                    Some(code) => TextItem::Format(code),
                    None => TextItem::Text(text),
                })
            } else {
                None
            };
            Ok(CrdtSequenceItem::new(item_id, left_id, right_id, deleted_length, value))
        })?;
        items.add(item);
    }
    Ok(items)
}

fn read_text_styles(
    r: &mut TaggedBlockReader<'_>,
) -> Result<IndexMap<CrdtId, Lww<ParagraphStyle>>, FrameError> {
    let count = r.read_varuint()?;
    let mut styles = IndexMap::new();
    for _ in 0..count {
        let id = r.read_crdt_id()?;
        let timestamp = r.read_id(1)?;
        let style = r.read_subblock(2, |r| {
            let marker = r.read_uint8()?;
            if marker != STYLE_MARKER {
                return Err(FrameError::InvalidValue(format!(
                    "paragraph style marker {marker}, expected {STYLE_MARKER}"
                )));
            }
            Ok(ParagraphStyle::from_code(r.read_uint8()?))
        })?;
        styles.insert(id, Lww::new(timestamp, style));
    }
    Ok(styles)
}

fn write_root_text(w: &mut TaggedBlockWriter, v: &RootText) -> Result<(), FrameError> {
    let text = &v.value;
    w.write_id(1, v.block_id)?;
    w.write_subblock(2, |w| {
        w.write_subblock(1, |w| w.write_subblock(1, |w| write_text_items(w, &text.items)))?;
        w.write_subblock(2, |w| w.write_subblock(1, |w| write_text_styles(w, &text.styles)))
    })?;
    w.write_subblock(3, |w| {
        w.write_float64(text.pos_x);
        w.write_float64(text.pos_y);
        Ok(())
    })?;
    w.write_float(4, text.width)
}

fn write_text_items(
    w: &mut TaggedBlockWriter,
    items: &CrdtSequence<TextItem>,
) -> Result<(), FrameError> {
    w.write_varuint(items.len() as u64)?;
    for item in items.sequence_items() {
        w.write_subblock(0, |w| {
            w.write_id(2, item.item_id)?;
            w.write_id(3, item.left_id)?;
            w.write_id(4, item.right_id)?;
            w.write_int(5, item.deleted_length)?;
            match &item.value {
                Some(TextItem::Text(s)) => w.write_string_with_format(6, s, None),
                Some(TextItem::Format(code)) => w.write_string_with_format(6, "", Some(*code)),
                None => Ok(()),
            }
        })?;
    }
    Ok(())
}

fn write_text_styles(
    w: &mut TaggedBlockWriter,
    styles: &IndexMap<CrdtId, Lww<ParagraphStyle>>,
) -> Result<(), FrameError> {
    w.write_varuint(styles.len() as u64)?;
    for (id, style) in styles {
        w.write_crdt_id(*id)?;
        w.write_id(1, style.timestamp)?;
        w.write_subblock(2, |w| {
            w.write_uint8(STYLE_MARKER);
            w.write_uint8(style.value.code());
            Ok(())
        })?;
    }
    Ok(())
}
