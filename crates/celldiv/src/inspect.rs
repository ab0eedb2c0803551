//! Host-side decoding of division buffers for debugging and export.

use glam::{DVec3, UVec3};
use rayon::prelude::*;

use crate::begin_end::BeginEnd;
use crate::cell_code::CellCoder;
use crate::code::{ParticleCode, ParticleKind};
use crate::constants::CELL_CODE_OUT;
use crate::error::CellDivResult;
use crate::pos_cell::CompactPosition;
use crate::reorder::unsort;

/// Decoded domain cell per particle. `None` for `CELL_CODE_OUT`.
pub fn cell3(coder: &CellCoder, dcell: &[u32]) -> Vec<Option<UVec3>> {
    dcell
        .par_iter()
        .map(|&c| (c != CELL_CODE_OUT).then(|| coder.decode(c)))
        .collect()
}

/// Encoding cell of each compact position.
pub fn pos_cell_cells(pos_cell: &[CompactPosition]) -> Vec<UVec3> {
    pos_cell.par_iter().map(|p| p.cell_coord()).collect()
}

/// Double-precision positions recovered from compact positions.
pub fn pos_cell_positions(pos_cell: &[CompactPosition], domain_min: DVec3, pos_cell_size: f64) -> Vec<DVec3> {
    pos_cell
        .par_iter()
        .map(|p| p.position(domain_min, pos_cell_size))
        .collect()
}

/// Type number per particle: 0 fixed, 1 moving, 2 floating, 3 fluid.
pub fn code_types(code: &[ParticleCode]) -> Vec<u8> {
    code.par_iter()
        .map(|c| match c.kind() {
            ParticleKind::Fixed => 0,
            ParticleKind::Moving => 1,
            ParticleKind::Floating => 2,
            ParticleKind::Fluid => 3,
        })
        .collect()
}

pub fn code_values(code: &[ParticleCode]) -> Vec<u16> {
    code.par_iter().map(|c| c.value()).collect()
}

/// Copies a cell-sorted array back into the slot order before sorting.
pub fn to_host_order<T: Copy + Send + Sync>(sort_part: &[u32], sorted: &[T]) -> CellDivResult<Vec<T>> {
    unsort(sort_part, sorted)
}

/// Particles per cell of a begin/end table.
pub fn cell_counts(table: &[BeginEnd]) -> Vec<u32> {
    table.par_iter().map(|c| c.len() as u32).collect()
}
