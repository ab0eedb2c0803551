//! Neighbor range queries over the begin/end table.
//!
//! A query collapses the `(2r+1)^3` stencil around a cell into `(2r+1)^2`
//! rows along the contiguous axis `c1`. Each row is a single slot range in
//! the sorted arrays, because the cells of a row are adjacent in index space.

use std::ops::Range;

use glam::{DVec3, IVec3};

use crate::begin_end::BeginEnd;
use crate::distance::distance2;
use crate::div_data::{DivData, Partition};
use crate::pos_cell::CompactPosition;

/// Stencil bounds along `(c1, c2, c3)`.
///
/// `ini2/fin2` are pre-multiplied by `nc.x` and `ini3/fin3` by `nc.w`, so a
/// cell index is `c1 + c2 + c3` for any `c2`, `c3` stepped through them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NeighborRange {
    pub ini1: i32,
    pub fin1: i32,
    pub ini2: i32,
    pub fin2: i32,
    pub ini3: i32,
    pub fin3: i32,
}

impl NeighborRange {
    /// Stencil around a box-relative cell `(cx, cy, cz)`.
    pub fn around(div: &DivData, cell: IVec3) -> Self {
        if div.is_null() {
            return Self::default();
        }
        let r = div.stencil_radius;
        let n = div.nc;
        let c = div.axis.reorder(cell);
        let ext = IVec3::new(n.x, n.y, n.z);
        // Beyond these limits the stencil is empty anyway
        let c = c.clamp(IVec3::splat(-r - 1), ext + r);

        let ini = |c: i32| c - c.min(r);
        let fin = |c: i32, n: i32| c + (n - c - 1).min(r) + 1;
        Self {
            ini1: ini(c.x),
            fin1: fin(c.x, n.x),
            ini2: ini(c.y) * n.x,
            fin2: fin(c.y, n.y) * n.x,
            ini3: ini(c.z) * n.w,
            fin3: fin(c.z, n.z) * n.w,
        }
    }

    /// Stencil around the cell of a domain cell code.
    pub fn from_cell(div: &DivData, dcell: u32) -> Self {
        let cell = div.cell_coder.decode(dcell).as_ivec3() - div.cell_zero.as_ivec3();
        Self::around(div, cell)
    }

    /// Stencil around the cell containing a raw position.
    pub fn from_position(div: &DivData, pos: DVec3) -> Self {
        Self::around(div, div.position_cell(pos))
    }

    pub fn is_empty(&self) -> bool {
        self.fin1 <= self.ini1 || self.fin2 <= self.ini2 || self.fin3 <= self.ini3
    }

    /// Row offsets `(c2, c3)` of the stencil, outer axis first.
    pub fn rows(&self, div: &DivData) -> impl Iterator<Item = (i32, i32)> {
        let step2 = div.nc.x.max(1) as usize;
        let step3 = div.nc.w.max(1) as usize;
        let (ini2, fin2) = (self.ini2, self.fin2);
        let empty = self.is_empty();
        (self.ini3..self.fin3)
            .step_by(step3)
            .filter(move |_| !empty)
            .flat_map(move |c3| (ini2..fin2).step_by(step2).map(move |c2| (c2, c3)))
    }
}

/// Slot range covered by the cells `[ini1, fin1)` of one row.
///
/// Accumulates the begin of the first non-empty cell and the end of the last
/// one. `(0, 0)` when the whole row is empty.
#[inline]
pub fn particle_range(c2: i32, c3: i32, ini1: i32, fin1: i32, table: &[BeginEnd]) -> (u32, u32) {
    let v = c2 + c3;
    let mut pini = 0;
    let mut pfin = 0;
    for c1 in ini1..fin1 {
        if let Some(cbeg) = table.get((c1 + v) as usize) {
            if cbeg.end != 0 {
                if pfin == 0 {
                    pini = cbeg.begin;
                }
                pfin = cbeg.end;
            }
        }
    }
    (pini, pfin)
}

impl DivData<'_> {
    /// Cells of one partition, starting at its first cell index.
    pub fn partition_table(&self, part: Partition) -> &[BeginEnd] {
        let offset = self.partition_offset(part) as usize;
        self.begin_end.get(offset..).unwrap_or(&[])
    }

    /// Non-empty candidate slot ranges of `range` in one partition, one per row.
    pub fn candidate_ranges(
        &self,
        range: NeighborRange,
        part: Partition,
    ) -> impl Iterator<Item = Range<usize>> + '_ {
        let table = self.partition_table(part);
        range
            .rows(self)
            .map(move |(c2, c3)| particle_range(c2, c3, range.ini1, range.fin1, table))
            .filter(|&(pini, pfin)| pfin > pini)
            .map(|(pini, pfin)| pini as usize..pfin as usize)
    }
}

/// Calls `f(q, rr2)` for every particle `q != p` of `part` within the cutoff of `p`.
///
/// `dcell` and `pos_cell` must be in cell-sorted order.
pub fn for_each_neighbor<F>(
    div: &DivData,
    dcell: &[u32],
    pos_cell: &[CompactPosition],
    p: usize,
    part: Partition,
    mut f: F,
) where
    F: FnMut(usize, f32),
{
    let (Some(&cell), Some(pos)) = (dcell.get(p), pos_cell.get(p)) else {
        return;
    };
    let range = NeighborRange::from_cell(div, cell);
    for slots in div.candidate_ranges(range, part) {
        for q in slots {
            if q == p {
                continue;
            }
            let Some(other) = pos_cell.get(q) else {
                continue;
            };
            let rr2 = distance2(pos, other, div.pos_cell_size);
            if rr2 <= div.kernel_size2 {
                f(q, rr2);
            }
        }
    }
}
