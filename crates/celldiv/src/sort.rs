//! Cell assignment and sort by cell index.
//!
//! 1. Compute the linear cell index of each particle (`pre_sort_*`)
//! 2. Sort (index, slot) pairs by index
//!
//! After sorting, particles of one cell are contiguous and every boundary
//! particle precedes every fluid particle. Out particles land in the
//! reserved out cell of their partition, after all valid cells.

use std::ops::Range;

use rayon::prelude::*;

use crate::code::ParticleCode;
use crate::constants::CELL_CODE_OUT;
use crate::div_data::{DivData, Partition};
use crate::error::{ensure_len, CellDivError, CellDivResult, Stage};

/// Linear cell index of one particle.
#[inline]
pub fn particle_cell_index(div: &DivData, dcell: u32, code: ParticleCode, part: Partition) -> u32 {
    if dcell == CELL_CODE_OUT || code.is_out() {
        div.out_cell(part)
    } else {
        div.cell_index(div.cell_coder.decode(dcell), part)
    }
}

fn pre_sort_range(
    range: Range<usize>,
    part: Partition,
    div: &DivData,
    dcell: &[u32],
    code: &[ParticleCode],
    cell_part: &mut [u32],
    sort_part: &mut [u32],
) {
    let start = range.start;
    cell_part[range.clone()]
        .par_iter_mut()
        .zip(sort_part[range].par_iter_mut())
        .enumerate()
        .for_each(|(i, (cell, slot))| {
            let p = start + i;
            *slot = p as u32;
            *cell = particle_cell_index(div, dcell[p], code[p], part);
        });
}

fn check_inputs(
    np: usize,
    npb: usize,
    dcell: &[u32],
    code: &[ParticleCode],
    cell_part: &[u32],
    sort_part: &[u32],
) -> CellDivResult<()> {
    if npb > np {
        return Err(CellDivError::LengthMismatch {
            stage: Stage::Sort,
            what: "boundary count",
            expected: np,
            actual: npb,
        });
    }
    ensure_len(Stage::Sort, "dcell", np, dcell.len())?;
    ensure_len(Stage::Sort, "code", np, code.len())?;
    ensure_len(Stage::Sort, "cell_part", np, cell_part.len())?;
    ensure_len(Stage::Sort, "sort_part", np, sort_part.len())
}

/// Cell indices and identity permutation for all `np` particles.
pub fn pre_sort_full(
    np: usize,
    npb: usize,
    div: &DivData,
    dcell: &[u32],
    code: &[ParticleCode],
    cell_part: &mut [u32],
    sort_part: &mut [u32],
) -> CellDivResult<()> {
    check_inputs(np, npb, dcell, code, cell_part, sort_part)?;
    pre_sort_range(0..npb, Partition::Bound, div, dcell, code, cell_part, sort_part);
    pre_sort_range(npb..np, Partition::Fluid, div, dcell, code, cell_part, sort_part);
    Ok(())
}

/// Cell indices for the fluid particles only. Boundary keys are left as they
/// are and the boundary part of the permutation is reset to identity.
pub fn pre_sort_fluid(
    np: usize,
    npb: usize,
    div: &DivData,
    dcell: &[u32],
    code: &[ParticleCode],
    cell_part: &mut [u32],
    sort_part: &mut [u32],
) -> CellDivResult<()> {
    check_inputs(np, npb, dcell, code, cell_part, sort_part)?;
    sort_part[..npb]
        .par_iter_mut()
        .enumerate()
        .for_each(|(p, slot)| *slot = p as u32);
    pre_sort_range(npb..np, Partition::Fluid, div, dcell, code, cell_part, sort_part);
    Ok(())
}

/// Sorts `keys` ascending, carrying `values` along.
///
/// With `stable`, equal keys keep their input order; after `pre_sort_*`
/// this means ascending original slot within each cell.
pub fn sort_by_cell(
    keys: &mut [u32],
    values: &mut [u32],
    stable: bool,
    scratch: &mut Vec<(u32, u32)>,
) -> CellDivResult<()> {
    if keys.len() != values.len() {
        return Err(CellDivError::LengthMismatch {
            stage: Stage::Sort,
            what: "values",
            expected: keys.len(),
            actual: values.len(),
        });
    }
    scratch.clear();
    scratch.par_extend(keys.par_iter().copied().zip(values.par_iter().copied()));
    if stable {
        scratch.par_sort_by_key(|&(key, _)| key);
    } else {
        scratch.par_sort_unstable_by_key(|&(key, _)| key);
    }
    keys.par_iter_mut()
        .zip(values.par_iter_mut())
        .zip(scratch.par_iter())
        .for_each(|((key, value), &(k, v))| {
            *key = k;
            *value = v;
        });
    Ok(())
}
