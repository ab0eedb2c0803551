//! Squared distance between compact positions.

use crate::cell_code::CellCoder;
use crate::pos_cell::CompactPosition;

/// Axis delta `a - b` with the cell difference added back.
#[inline]
fn axis_delta(offset_a: f32, offset_b: f32, cell_a: u32, cell_b: u32, pos_cell_size: f32) -> f32 {
    offset_a - offset_b + pos_cell_size * (cell_a as i32 - cell_b as i32) as f32
}

/// Components of `a - b`.
#[inline]
pub fn delta(a: &CompactPosition, b: &CompactPosition, pos_cell_size: f32) -> [f32; 3] {
    let coder = CellCoder::POS_CELL;
    [
        axis_delta(a.x, b.x, coder.decode_x(a.cell), coder.decode_x(b.cell), pos_cell_size),
        axis_delta(a.y, b.y, coder.decode_y(a.cell), coder.decode_y(b.cell), pos_cell_size),
        axis_delta(a.z, b.z, coder.decode_z(a.cell), coder.decode_z(b.cell), pos_cell_size),
    ]
}

/// Squared distance. Compare against the squared cutoff, never take the root here.
#[inline]
pub fn distance2(a: &CompactPosition, b: &CompactPosition, pos_cell_size: f32) -> f32 {
    let [dx, dy, dz] = delta(a, b, pos_cell_size);
    dx * dx + dy * dy + dz * dz
}
