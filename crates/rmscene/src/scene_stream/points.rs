//! Point layouts of line items.
//!
//! ```text
//! version 1 (24 bytes): f32 x, f32 y, f32 speed/4, f32 direction·2π/255,
//!                       f32 width/4, f32 pressure/255
//! version 2 (14 bytes): f32 x, f32 y, u16 speed, u16 width, u8 direction,
//!                       u8 pressure
//! ```

use std::f32::consts::TAU;

use crate::scene_items::Point;
use crate::tagged_block::{FrameError, TaggedBlockReader, TaggedBlockWriter};

pub const POINT_SIZE_V1: usize = 24;
pub const POINT_SIZE_V2: usize = 14;

/// On-wire size of one point for a line block of the given version.
pub fn point_size(version: u8) -> usize {
    if version >= 2 {
        POINT_SIZE_V2
    } else {
        POINT_SIZE_V1
    }
}

/// Reads the rest of the current subblock as points.
pub fn read_points(r: &mut TaggedBlockReader<'_>, version: u8) -> Result<Vec<Point>, FrameError> {
    let size = point_size(version);
    let len = r.bytes_remaining_in_block();
    if len % size != 0 {
        return Err(FrameError::InvalidValue(format!(
            "point data of {len} bytes is not a multiple of {size}"
        )));
    }
    let count = len / size;
    let mut points = Vec::with_capacity(count);
    for _ in 0..count {
        points.push(read_point(r, version)?);
    }
    Ok(points)
}

pub fn read_point(r: &mut TaggedBlockReader<'_>, version: u8) -> Result<Point, FrameError> {
    let x = r.read_float32()?;
    let y = r.read_float32()?;
    if version >= 2 {
        let speed = r.read_uint16()? as f32;
        let width = r.read_uint16()? as f32;
        let direction = r.read_uint8()? as f32;
        let pressure = r.read_uint8()? as f32;
        Ok(Point::with_samples(x, y, speed, direction, width, pressure))
    } else {
        let raw = [
            r.read_float32()?,
            r.read_float32()?,
            r.read_float32()?,
            r.read_float32()?,
        ];
        let [speed, direction, width, pressure] = from_v1(raw);
        let mut point = Point::with_samples(x, y, speed, direction, width, pressure);
        point.v1 = Some(raw);
        Ok(point)
    }
}

pub fn write_point(w: &mut TaggedBlockWriter, point: &Point, version: u8) {
    w.write_float32(point.x);
    w.write_float32(point.y);
    if version >= 2 {
        w.write_uint16(to_u16(point.speed));
        w.write_uint16(to_u16(point.width));
        w.write_uint8(to_u8(point.direction));
        w.write_uint8(to_u8(point.pressure));
    } else {
        for value in v1_fields(point) {
            w.write_float32(value);
        }
    }
}

/// Version 1 floats for `point`: the ones it was read from if its fields
/// are unchanged since, a fresh conversion otherwise.
fn v1_fields(point: &Point) -> [f32; 4] {
    let current = [point.speed, point.direction, point.width, point.pressure];
    match point.v1 {
        Some(raw) if same_bits(from_v1(raw), current) => raw,
        _ => to_v1(current),
    }
}

fn from_v1([speed, direction, width, pressure]: [f32; 4]) -> [f32; 4] {
    [speed * 4.0, direction * 255.0 / TAU, width * 4.0, pressure * 255.0]
}

fn to_v1([speed, direction, width, pressure]: [f32; 4]) -> [f32; 4] {
    [speed / 4.0, direction * TAU / 255.0, width / 4.0, pressure / 255.0]
}

fn same_bits(a: [f32; 4], b: [f32; 4]) -> bool {
    a.iter().zip(&b).all(|(x, y)| x.to_bits() == y.to_bits())
}

// `as` saturates and maps NaN to zero.
fn to_u16(v: f32) -> u16 {
    v.round() as u16
}

fn to_u8(v: f32) -> u8 {
    v.round() as u8
}
