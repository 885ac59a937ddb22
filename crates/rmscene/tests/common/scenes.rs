//! Scene trees built through the public API.

use indexmap::IndexMap;
use rmscene::{
    CrdtId, CrdtSequenceItem, GlyphRange, Line, Lww, ParagraphStyle, Pen, PenColor, Point,
    Rectangle, SceneItem, SceneTree, Text, TextItem, END_MARKER, ROOT_ID,
};

pub const LAYER_1: CrdtId = CrdtId::new(0, 11);
pub const LAYER_2: CrdtId = CrdtId::new(0, 12);

pub fn stroke(x: f32) -> Line {
    let points = (0..4)
        .map(|i| Point::with_samples(x + i as f32, 10.0 * i as f32, 40.0, 128.0, 12.0, 180.0))
        .collect();
    Line::new(Pen::Fineliner2, PenColor::Black, points)
}

fn link(id: CrdtId, left: CrdtId, right: CrdtId, value: SceneItem) -> CrdtSequenceItem<SceneItem> {
    CrdtSequenceItem::new(id, left, right, 0, Some(value))
}

/// Two layers under the root: the first holds two strokes and a highlight,
/// the second one stroke. The page also carries a two-paragraph text.
pub fn two_layer_tree() -> SceneTree {
    let mut tree = SceneTree::new();
    tree.add_node(LAYER_1, ROOT_ID).unwrap();
    tree.add_node(LAYER_2, ROOT_ID).unwrap();
    tree.get_mut(&LAYER_1).unwrap().label = Lww::new(CrdtId::new(0, 13), "Layer 1".into());
    tree.get_mut(&LAYER_2).unwrap().label = Lww::new(CrdtId::new(0, 14), "Layer 2".into());

    let g1 = CrdtId::new(0, 15);
    let g2 = CrdtId::new(0, 16);
    tree.add_item(ROOT_ID, link(g1, END_MARKER, g2, SceneItem::Group(LAYER_1))).unwrap();
    tree.add_item(ROOT_ID, link(g2, g1, END_MARKER, SceneItem::Group(LAYER_2))).unwrap();

    let a = CrdtId::new(1, 20);
    let b = CrdtId::new(1, 21);
    let c = CrdtId::new(1, 22);
    tree.add_item(LAYER_1, link(b, a, c, SceneItem::Line(stroke(2.0)))).unwrap();
    tree.add_item(LAYER_1, link(a, END_MARKER, b, SceneItem::Line(stroke(1.0)))).unwrap();
    let glyph = GlyphRange {
        start: Some(0),
        length: 5,
        text: "Hello".into(),
        color: PenColor::Yellow,
        rectangles: vec![Rectangle { x: 10.0, y: 20.0, w: 50.0, h: 12.0 }],
    };
    tree.add_item(LAYER_1, link(c, b, END_MARKER, SceneItem::GlyphRange(glyph))).unwrap();
    tree.add_item(
        LAYER_2,
        link(CrdtId::new(1, 30), END_MARKER, END_MARKER, SceneItem::Line(stroke(3.0))),
    )
    .unwrap();

    tree.root_text = Some(sample_text());
    tree
}

/// `"Title\nbody"` with a heading style on the first paragraph.
pub fn sample_text() -> Text {
    let run = CrdtSequenceItem::new(
        CrdtId::new(1, 100),
        END_MARKER,
        END_MARKER,
        0,
        Some(TextItem::Text("Title\nbody".into())),
    );
    let mut styles = IndexMap::new();
    styles.insert(END_MARKER, Lww::new(CrdtId::new(1, 99), ParagraphStyle::Heading));
    Text {
        items: [run].into_iter().collect(),
        styles,
        pos_x: -468.0,
        pos_y: 234.0,
        width: 936.0,
    }
}
