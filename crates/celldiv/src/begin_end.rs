//! Per-cell `[begin, end)` ranges over the cell-sorted particle order.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use rayon::prelude::*;

use crate::error::{ensure_len, CellDivError, CellDivResult, Stage};

/// Half-open slot range of one cell. `(0, 0)` marks an empty cell.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct BeginEnd {
    pub begin: u32,
    pub end: u32,
}

impl BeginEnd {
    pub fn new(begin: u32, end: u32) -> Self {
        Self { begin, end }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.begin) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.begin
    }

    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.begin as usize..self.end as usize
    }
}

/// Builds the begin/end table from sorted cell indices.
///
/// With `full` the whole table is rebuilt from slot 0. Otherwise only the
/// fluid part (`cell_fluid..`) is reset and slots from `npb` on are scanned,
/// leaving boundary entries from the last full build in place.
///
/// `transitions` is scratch for the slots where the cell index changes; its
/// allocation is kept between calls.
pub fn calc_begin_end_cell(
    full: bool,
    np: usize,
    npb: usize,
    cell_fluid: u32,
    cell_part: &[u32],
    table: &mut [BeginEnd],
    transitions: &mut Vec<usize>,
) -> CellDivResult<()> {
    ensure_len(Stage::BeginEnd, "cell_part", np, cell_part.len())?;
    let pini = if full { 0 } else { npb.min(np) };
    let reset_from = if full {
        0
    } else {
        (cell_fluid as usize).min(table.len())
    };
    table[reset_from..]
        .par_iter_mut()
        .for_each(|c| *c = BeginEnd::default());

    let keys = &cell_part[..np];
    transitions.clear();
    transitions.par_extend(
        (pini..np)
            .into_par_iter()
            .filter(|&p| p == pini || keys[p] != keys[p - 1]),
    );

    let table_len = table.len();
    let slot = |cell: u32| -> CellDivResult<usize> {
        let idx = cell as usize;
        if idx >= table_len {
            return Err(CellDivError::Verification {
                stage: Stage::BeginEnd,
                detail: format!("cell index {} beyond table of {} entries", idx, table_len),
            });
        }
        Ok(idx)
    };

    for &p in transitions.iter() {
        table[slot(keys[p])?].begin = p as u32;
        if p > pini {
            table[slot(keys[p - 1])?].end = p as u32;
        }
    }
    if np > pini {
        table[slot(keys[np - 1])?].end = np as u32;
    }
    Ok(())
}

/// Checks that every slot in `[pini, np)` lies inside its cell's range and
/// that every range holds only its own cell.
pub(crate) fn check_partition(
    pini: usize,
    np: usize,
    cell_part: &[u32],
    table: &[BeginEnd],
) -> Result<(), String> {
    (pini..np).into_par_iter().try_for_each(|p| {
        let cell = cell_part[p] as usize;
        let entry = table
            .get(cell)
            .ok_or_else(|| format!("slot {} has cell {} beyond the table", p, cell))?;
        if !entry.range().contains(&p) {
            return Err(format!(
                "slot {} of cell {} outside its range {:?}",
                p,
                cell,
                entry.range()
            ));
        }
        Ok(())
    })?;
    table
        .par_iter()
        .enumerate()
        .filter(|(_, entry)| !entry.is_empty())
        .try_for_each(|(cell, entry)| {
            if entry.end as usize > np {
                return Err(format!("cell {} ends at {} past {}", cell, entry.end, np));
            }
            match cell_part[entry.range()].iter().find(|&&c| c as usize != cell) {
                Some(other) => Err(format!("cell {} range holds cell {}", cell, other)),
                None => Ok(()),
            }
        })
}
