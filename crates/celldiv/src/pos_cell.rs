//! Compact single-precision positions.
//!
//! Each position is stored as an `f32` offset from the origin of its
//! encoding cell plus the cell coordinate itself, so reduced-precision
//! arithmetic keeps full resolution anywhere in a large domain.

use bytemuck::{Pod, Zeroable};
use glam::{DVec3, UVec3, Vec3};

use crate::cell_code::CellCoder;

/// Offset within the encoding cell (xyz) and the packed cell (w slot).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CompactPosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Cell coordinate packed with `CellCoder::POS_CELL`
    pub cell: u32,
}

impl CompactPosition {
    /// Encodes `pos` relative to `domain_min` on a grid of `pos_cell_size`.
    ///
    /// Returns `None` when the cell coordinate is negative or exceeds the
    /// capacity of the fixed cell layout.
    pub fn encode(pos: DVec3, domain_min: DVec3, pos_cell_size: f64) -> Option<Self> {
        let rel = pos - domain_min;
        Self::from_cell(rel, (rel / pos_cell_size).floor(), pos_cell_size)
    }

    /// Like [`CompactPosition::encode`] with the cell capped at `last_cell`,
    /// so a position on the domain's max face stays in the last cell with an
    /// offset of one full cell width.
    pub fn encode_clamped(pos: DVec3, domain_min: DVec3, pos_cell_size: f64, last_cell: UVec3) -> Option<Self> {
        let rel = pos - domain_min;
        let cell = (rel / pos_cell_size).floor();
        if !cell.is_finite() {
            return None;
        }
        Self::from_cell(rel, cell.min(last_cell.as_dvec3()), pos_cell_size)
    }

    fn from_cell(rel: DVec3, cell: DVec3, pos_cell_size: f64) -> Option<Self> {
        if cell.min_element() < 0.0 || !cell.is_finite() {
            return None;
        }
        let capacity = CellCoder::POS_CELL.capacity().as_dvec3();
        if cell.cmpge(capacity).any() {
            return None;
        }
        let offset = rel - cell * pos_cell_size;
        Some(Self {
            x: offset.x as f32,
            y: offset.y as f32,
            z: offset.z as f32,
            cell: CellCoder::POS_CELL.encode(cell.as_uvec3()),
        })
    }

    #[inline]
    pub fn cell_coord(&self) -> UVec3 {
        CellCoder::POS_CELL.decode(self.cell)
    }

    #[inline]
    pub fn offset(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Recovers the double-precision position to the resolution of the offsets.
    pub fn position(&self, domain_min: DVec3, pos_cell_size: f64) -> DVec3 {
        domain_min + self.cell_coord().as_dvec3() * pos_cell_size + self.offset().as_dvec3()
    }
}
