//! Value model of the scene: groups, strokes, highlighted glyph ranges and
//! the root text.
//!
//! Nothing in this module knows about the wire format; the codecs live in
//! [`crate::scene_stream`].

mod enums;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::crdt::{CrdtId, CrdtSequence, Lww, END_MARKER};

pub use enums::{ParagraphStyle, Pen, PenColor};

/// Payload discriminator written in front of a scene item value.
pub mod item_kind {
    pub const GLYPH_RANGE: u8 = 1;
    pub const GROUP: u8 = 2;
    pub const LINE: u8 = 3;
    pub const TEXT: u8 = 5;
}

/// Inline formatting codes found in the text character stream.
pub mod format_code {
    pub const BOLD_ON: u32 = 1;
    pub const BOLD_OFF: u32 = 2;
    pub const ITALIC_ON: u32 = 3;
    pub const ITALIC_OFF: u32 = 4;
}

// ── Strokes ─────────────────────────────────────────────────────────────────

/// A stroke sample.
///
/// Values are kept in the units of the 14-byte (version 2) layout: speed
/// and width as 16-bit quantities, direction and pressure on a 0-255 scale.
/// Version 1 files are converted on read. The floats they were read from
/// are kept alongside and written back unchanged as long as the converted
/// fields still match them. Equality ignores them.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub speed: f32,
    pub direction: f32,
    pub width: f32,
    pub pressure: f32,
    /// Speed, direction, width and pressure as found in a version 1 block.
    #[serde(skip)]
    pub(crate) v1: Option<[f32; 4]>,
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        (self.x, self.y, self.speed, self.direction, self.width, self.pressure)
            == (other.x, other.y, other.speed, other.direction, other.width, other.pressure)
    }
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, ..Self::default() }
    }

    /// A point with every sample field set, in version 2 units.
    pub fn with_samples(
        x: f32,
        y: f32,
        speed: f32,
        direction: f32,
        width: f32,
        pressure: f32,
    ) -> Self {
        Self {
            x,
            y,
            speed,
            direction,
            width,
            pressure,
            v1: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub color: PenColor,
    pub tool: Pen,
    pub points: Vec<Point>,
    pub thickness_scale: f64,
    pub starting_length: f32,
    /// Timestamp of the stroke, field 6 of the payload.
    pub timestamp: CrdtId,
    /// Set when the stroke was moved from another position.
    pub move_id: Option<CrdtId>,
}

impl Line {
    pub fn new(tool: Pen, color: PenColor, points: Vec<Point>) -> Self {
        Self {
            color,
            tool,
            points,
            thickness_scale: 1.0,
            starting_length: 0.0,
            timestamp: END_MARKER,
            move_id: None,
        }
    }
}

// ── Highlights ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// A highlighted span of text in the underlying document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlyphRange {
    pub start: Option<u32>,
    pub length: u32,
    pub text: String,
    pub color: PenColor,
    pub rectangles: Vec<Rectangle>,
}

// ── Groups ──────────────────────────────────────────────────────────────────

/// An entry of a group's child sequence.
///
/// Sub-groups are referenced by node id; the group itself lives in the
/// tree's arena.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneItem {
    Group(CrdtId),
    Line(Line),
    GlyphRange(GlyphRange),
}

/// A layer or sub-layer of the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub node_id: CrdtId,
    pub children: CrdtSequence<SceneItem>,
    pub label: Lww<String>,
    pub visible: Lww<bool>,
    pub anchor_id: Option<Lww<CrdtId>>,
    pub anchor_type: Option<Lww<u8>>,
    pub anchor_threshold: Option<Lww<f32>>,
    pub anchor_origin_x: Option<Lww<f32>>,
}

impl Group {
    pub fn new(node_id: CrdtId) -> Self {
        Self {
            node_id,
            children: CrdtSequence::new(),
            label: Lww::new(END_MARKER, String::new()),
            visible: Lww::new(END_MARKER, true),
            anchor_id: None,
            anchor_type: None,
            anchor_threshold: None,
            anchor_origin_x: None,
        }
    }
}

// ── Text ────────────────────────────────────────────────────────────────────

/// Value of a root text sequence item: a run of characters or a single
/// inline formatting code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextItem {
    Text(String),
    Format(u32),
}

impl TextItem {
    /// Number of sequence positions the item covers.
    pub fn len(&self) -> usize {
        match self {
            TextItem::Text(s) => s.chars().count(),
            TextItem::Format(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The page's root text block.
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub items: CrdtSequence<TextItem>,
    /// Paragraph styles keyed by the id of the character that opens the
    /// paragraph (the preceding newline, or the sentinel for the first one).
    pub styles: IndexMap<CrdtId, Lww<ParagraphStyle>>,
    pub pos_x: f64,
    pub pos_y: f64,
    pub width: f32,
}

impl Default for Text {
    fn default() -> Self {
        Self {
            items: CrdtSequence::new(),
            styles: IndexMap::new(),
            pos_x: 0.0,
            pos_y: 0.0,
            width: 0.0,
        }
    }
}
