//! Hand-rolled wire encoders, independent of the crate's writer, for
//! building test files byte by byte.

use rmscene::tagged_block::HEADER_V6;

pub type Id = (u8, u64);

pub const SENTINEL: Id = (0, 0);
pub const ROOT: Id = (0, 1);

pub fn varuint(mut v: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

pub fn tag(index: u64, kind: u8) -> Vec<u8> {
    varuint((index << 4) | kind as u64)
}

pub fn id_field(index: u64, id: Id) -> Vec<u8> {
    let mut out = tag(index, 0xF);
    out.push(id.0);
    out.extend(varuint(id.1));
    out
}

pub fn bool_field(index: u64, v: bool) -> Vec<u8> {
    let mut out = tag(index, 0x1);
    out.push(v as u8);
    out
}

pub fn int_field(index: u64, v: u32) -> Vec<u8> {
    let mut out = tag(index, 0x4);
    out.extend(v.to_le_bytes());
    out
}

pub fn float_field(index: u64, v: f32) -> Vec<u8> {
    let mut out = tag(index, 0x4);
    out.extend(v.to_le_bytes());
    out
}

pub fn double_field(index: u64, v: f64) -> Vec<u8> {
    let mut out = tag(index, 0x8);
    out.extend(v.to_le_bytes());
    out
}

pub fn subblock(index: u64, body: &[u8]) -> Vec<u8> {
    let mut out = tag(index, 0xC);
    out.extend((body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    out
}

pub fn string_field(index: u64, s: &str) -> Vec<u8> {
    let mut body = varuint(s.len() as u64);
    body.push(1);
    body.extend_from_slice(s.as_bytes());
    subblock(index, &body)
}

pub fn block(block_type: u8, min_version: u8, current_version: u8, body: &[u8]) -> Vec<u8> {
    let mut out = (body.len() as u32).to_le_bytes().to_vec();
    out.extend([0, min_version, current_version, block_type]);
    out.extend_from_slice(body);
    out
}

pub fn file(blocks: &[Vec<u8>]) -> Vec<u8> {
    let mut out = HEADER_V6.to_vec();
    for b in blocks {
        out.extend_from_slice(b);
    }
    out
}

pub fn cat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

// ── Blocks ──────────────────────────────────────────────────────────────────

pub fn page_info_block(loads: u32) -> Vec<u8> {
    let body = cat(&[int_field(1, loads), int_field(2, 0), int_field(3, 0), int_field(4, 0)]);
    block(0x0A, 1, 1, &body)
}

pub fn migration_block() -> Vec<u8> {
    block(0x00, 1, 1, &cat(&[id_field(1, (1, 1)), bool_field(2, true)]))
}

pub fn tree_edge_block(node: Id, parent: Id, parent_tail: &[u8]) -> Vec<u8> {
    let mut parent_body = id_field(1, parent);
    parent_body.extend_from_slice(parent_tail);
    let body = cat(&[
        id_field(1, node),
        id_field(2, SENTINEL),
        bool_field(3, true),
        subblock(4, &parent_body),
    ]);
    block(0x01, 1, 1, &body)
}

pub fn group_item_block(parent: Id, item: Id, left: Id, right: Id, node: Id) -> Vec<u8> {
    let mut payload = vec![2];
    payload.extend(id_field(2, node));
    let body = cat(&[
        id_field(1, parent),
        id_field(2, item),
        id_field(3, left),
        id_field(4, right),
        int_field(5, 0),
        subblock(6, &payload),
    ]);
    block(0x04, 1, 1, &body)
}

/// A version-2 point: x, y, speed, width, direction, pressure.
pub fn point_v2(x: f32, y: f32) -> Vec<u8> {
    let mut out = x.to_le_bytes().to_vec();
    out.extend(y.to_le_bytes());
    out.extend(100u16.to_le_bytes());
    out.extend(8u16.to_le_bytes());
    out.extend([64, 200]);
    out
}

/// A version-1 point: six floats. Each survives the unit conversion exactly.
pub fn point_v1(x: f32, y: f32) -> Vec<u8> {
    [x, y, 25.0, 0.0, 2.0, 0.5]
        .iter()
        .flat_map(|f| f.to_le_bytes())
        .collect()
}

/// A version-1 point with every float given, in file units.
pub fn point_v1_samples(samples: [f32; 6]) -> Vec<u8> {
    samples.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn line_item_block(
    version: u8,
    parent: Id,
    item: Id,
    left: Id,
    right: Id,
    points: &[u8],
) -> Vec<u8> {
    let mut payload = vec![3];
    payload.extend(cat(&[
        int_field(1, 15),
        int_field(2, 0),
        double_field(3, 1.0),
        float_field(4, 0.0),
        subblock(5, points),
        id_field(6, SENTINEL),
    ]));
    let body = cat(&[
        id_field(1, parent),
        id_field(2, item),
        id_field(3, left),
        id_field(4, right),
        int_field(5, 0),
        subblock(6, &payload),
    ]);
    block(0x05, version, version, &body)
}

/// One root-text run: `(id, left, right, text)`.
pub fn text_item(id: Id, left: Id, right: Id, text: &str) -> Vec<u8> {
    let body = cat(&[
        id_field(2, id),
        id_field(3, left),
        id_field(4, right),
        int_field(5, 0),
        string_field(6, text),
    ]);
    subblock(0, &body)
}

pub fn root_text_block(items: &[Vec<u8>]) -> Vec<u8> {
    let mut item_list = varuint(items.len() as u64);
    for item in items {
        item_list.extend_from_slice(item);
    }
    let styles = varuint(0);
    let sequences = cat(&[
        subblock(1, &subblock(1, &item_list)),
        subblock(2, &subblock(1, &styles)),
    ]);
    let mut pos = (-468.0f64).to_le_bytes().to_vec();
    pos.extend(234.0f64.to_le_bytes());
    let body = cat(&[
        id_field(1, SENTINEL),
        subblock(2, &sequences),
        subblock(3, &pos),
        float_field(4, 936.0),
    ]);
    block(0x07, 1, 1, &body)
}

/// A deleted root-text run of `length` characters.
pub fn tombstone_item(id: Id, left: Id, right: Id, length: u32) -> Vec<u8> {
    let body = cat(&[id_field(2, id), id_field(3, left), id_field(4, right), int_field(5, length)]);
    subblock(0, &body)
}

/// A root-text format item; real files leave `text` empty.
pub fn format_item(id: Id, left: Id, right: Id, text: &str, code: u32) -> Vec<u8> {
    let mut string = varuint(text.len() as u64);
    string.push(1);
    string.extend_from_slice(text.as_bytes());
    string.extend(int_field(2, code));
    let body = cat(&[
        id_field(2, id),
        id_field(3, left),
        id_field(4, right),
        int_field(5, 0),
        subblock(6, &string),
    ]);
    subblock(0, &body)
}
