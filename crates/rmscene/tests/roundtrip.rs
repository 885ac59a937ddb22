mod common;

use rmscene::{
    decode, encode, encode_to_vec, encode_tree, BlockData, Leaf, SceneDocument, WriteOptions,
    ROOT_ID,
};

use common::scenes::{two_layer_tree, LAYER_1, LAYER_2};
use common::wire::*;

fn hand_built_file() -> Vec<u8> {
    let layer = (0, 11);
    file(&[
        migration_block(),
        page_info_block(1),
        tree_edge_block(layer, ROOT, &[]),
        group_item_block(ROOT, (0, 13), SENTINEL, SENTINEL, layer),
        line_item_block(2, layer, (1, 20), SENTINEL, (1, 21), &point_v2(1.0, 2.0)),
        line_item_block(
            2,
            layer,
            (1, 21),
            (1, 20),
            SENTINEL,
            &cat(&[point_v2(3.0, 4.0), point_v2(5.0, 6.0)]),
        ),
        root_text_block(&[text_item((1, 50), SENTINEL, SENTINEL, "hi")]),
    ])
}

#[test]
fn hand_built_file_reencodes_byte_identical() {
    common::init_tracing();
    let bytes = hand_built_file();
    let doc = decode(&bytes).unwrap();
    assert!(doc.blocks.iter().all(|b| !b.is_unreadable()));
    assert_eq!(
        common::encode_hex(&encode_to_vec(&doc, &WriteOptions::default()).unwrap()),
        common::encode_hex(&bytes)
    );
}

#[test]
fn decode_is_idempotent_through_encode() {
    let bytes = hand_built_file();
    let first = decode(&bytes).unwrap();
    let mut out = Vec::new();
    encode(&first, &WriteOptions::default(), &mut out).unwrap();
    let second = decode(&out).unwrap();
    assert_eq!(first, second);
}

#[test]
fn hand_built_file_has_expected_tree() {
    let doc = decode(&hand_built_file()).unwrap();
    let leaves: Vec<_> = doc.tree.walk().collect::<Result<_, _>>().unwrap();
    assert_eq!(leaves.len(), 2);
    let points: Vec<usize> = leaves
        .iter()
        .map(|leaf| match leaf.item {
            Leaf::Line(line) => line.points.len(),
            Leaf::GlyphRange(_) => 0,
        })
        .collect();
    assert_eq!(points, vec![1, 2]);
    let text = doc.text().unwrap().unwrap();
    assert_eq!(text.to_string(), "hi");
}

#[test]
fn synthesized_tree_decodes_to_equal_tree() {
    let tree = two_layer_tree();
    let mut bytes = Vec::new();
    encode_tree(tree.clone(), &WriteOptions::default(), &mut bytes).unwrap();
    let doc = decode(&bytes).unwrap();
    assert_eq!(doc.tree, tree);
    assert_eq!(doc.tree.parent_of(&LAYER_2), Some(ROOT_ID));
}

#[test]
fn synthesized_tree_walks_in_logical_order() {
    let doc = SceneDocument::from_tree(two_layer_tree()).unwrap();
    let walked: Vec<_> = doc
        .tree
        .walk()
        .map(|leaf| {
            let leaf = leaf.unwrap();
            let tag = match leaf.item {
                Leaf::Line(line) => format!("line@{}", line.points[0].x),
                Leaf::GlyphRange(glyph) => format!("glyph:{}", glyph.text),
            };
            (leaf.group, tag)
        })
        .collect();
    assert_eq!(
        walked,
        vec![
            (LAYER_1, "line@1".to_string()),
            (LAYER_1, "line@2".to_string()),
            (LAYER_1, "glyph:Hello".to_string()),
            (LAYER_2, "line@3".to_string()),
        ]
    );
}

#[test]
fn synthesized_stream_declares_page_statistics() {
    let doc = SceneDocument::from_tree(two_layer_tree()).unwrap();
    let info = doc
        .blocks
        .iter()
        .find_map(|b| match &b.data {
            BlockData::PageInfo(info) => Some(info.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(info.text_chars_count, 10);
    assert_eq!(info.text_lines_count, 2);
}

#[test]
fn synthesized_stream_survives_second_pass() {
    let doc = SceneDocument::from_tree(two_layer_tree()).unwrap();
    let bytes = encode_to_vec(&doc, &WriteOptions::default()).unwrap();
    let again = encode_to_vec(&decode(&bytes).unwrap(), &WriteOptions::default()).unwrap();
    assert_eq!(again, bytes);
}
