//! Per-step division parameters.
//!
//! `DivData` is rebuilt every time the particle set is divided and is only
//! read afterwards. It borrows the begin/end table of the division that
//! produced it, so a `DivData` can never outlive or disagree with its table.

use glam::{DVec3, IVec3, IVec4, UVec3};
use serde::{Deserialize, Serialize};

use crate::begin_end::BeginEnd;
use crate::cell_code::CellCoder;

/// Order in which physical axes are folded into a linear cell index.
///
/// The first reordered axis `c1` is the contiguous one, `c3` the outermost.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisOrder {
    /// c1=y, c2=z, c3=x
    X,
    /// c1=x, c2=z, c3=y
    Y,
    /// c1=x, c2=y, c3=z
    #[default]
    Z,
}

impl AxisOrder {
    /// Maps `(cx, cy, cz)` to `(c1, c2, c3)`.
    #[inline]
    pub fn reorder(self, c: IVec3) -> IVec3 {
        match self {
            AxisOrder::X => IVec3::new(c.y, c.z, c.x),
            AxisOrder::Y => IVec3::new(c.x, c.z, c.y),
            AxisOrder::Z => c,
        }
    }

    #[inline]
    pub fn reorder_extent(self, n: UVec3) -> UVec3 {
        self.reorder(n.as_ivec3()).as_uvec3()
    }
}

/// Particle partition sharing the linear cell index space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Partition {
    /// Fixed, moving and floating particles, cells `[0, cell_fluid)`
    Bound,
    /// Fluid particles, cells from `cell_fluid`
    Fluid,
}

/// Division settings that stay fixed for the lifetime of a domain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DivGeometry {
    pub axis: AxisOrder,
    /// Cells scanned on each side of the query cell (1 or 2)
    pub stencil_radius: u32,
    /// Edge length of a division cell
    pub cell_size: f64,
    /// Layout of the per-particle domain cell codes
    pub cell_coder: CellCoder,
    /// Minimum corner of the domain
    pub domain_min: DVec3,
    /// Squared interaction cutoff
    pub kernel_size2: f32,
    /// Cell size of the `CompactPosition` encoding
    pub pos_cell_size: f64,
}

/// Immutable snapshot of one division.
#[derive(Clone, Copy, Debug)]
pub struct DivData<'a> {
    pub axis: AxisOrder,
    pub stencil_radius: i32,
    /// Occupied box extent per physical axis
    pub ncells: UVec3,
    /// Extents in `(c1, c2, c3)` order, `w = c1 * c2`
    pub nc: IVec4,
    /// First fluid cell index
    pub cell_fluid: u32,
    /// Minimum occupied cell, subtracted before folding
    pub cell_zero: UVec3,
    pub begin_end: &'a [BeginEnd],
    pub cell_size: f64,
    pub cell_coder: CellCoder,
    pub domain_min: DVec3,
    pub kernel_size2: f32,
    pub pos_cell_size: f32,
}

impl<'a> DivData<'a> {
    /// Builds the snapshot for an occupied box of `ncells` cells starting at `cell_zero`.
    pub fn new(
        geometry: &DivGeometry,
        ncells: UVec3,
        cell_zero: UVec3,
        begin_end: &'a [BeginEnd],
    ) -> Self {
        let ext = geometry.axis.reorder_extent(ncells).as_ivec3();
        let nc = IVec4::new(ext.x, ext.y, ext.z, ext.x * ext.y);
        Self {
            axis: geometry.axis,
            stencil_radius: geometry.stencil_radius as i32,
            ncells,
            nc,
            cell_fluid: (nc.w * nc.z) as u32 + 1,
            cell_zero,
            begin_end,
            cell_size: geometry.cell_size,
            cell_coder: geometry.cell_coder,
            domain_min: geometry.domain_min,
            kernel_size2: geometry.kernel_size2,
            pos_cell_size: geometry.pos_cell_size as f32,
        }
    }

    /// All-zero instance with no table. Every query on it is empty.
    pub fn null() -> DivData<'static> {
        DivData {
            axis: AxisOrder::Z,
            stencil_radius: 0,
            ncells: UVec3::ZERO,
            nc: IVec4::ZERO,
            cell_fluid: 0,
            cell_zero: UVec3::ZERO,
            begin_end: &[],
            cell_size: 0.0,
            cell_coder: CellCoder::default(),
            domain_min: DVec3::ZERO,
            kernel_size2: 0.0,
            pos_cell_size: 0.0,
        }
    }

    pub fn is_null(&self) -> bool {
        self.ncells.min_element() == 0
    }

    /// Cells in the occupied box, per partition.
    #[inline]
    pub fn box_cells(&self) -> u32 {
        (self.nc.w * self.nc.z) as u32
    }

    /// Reserved index for boundary particles outside the box or marked out.
    #[inline]
    pub fn bound_out_cell(&self) -> u32 {
        self.box_cells()
    }

    /// Reserved index for fluid particles outside the box or marked out.
    #[inline]
    pub fn fluid_out_cell(&self) -> u32 {
        self.cell_fluid + self.box_cells()
    }

    /// Number of begin/end entries this division needs. An empty box still
    /// has the two out cells.
    pub fn table_len(&self) -> usize {
        if self.cell_fluid == 0 {
            0
        } else {
            self.fluid_out_cell() as usize + 1
        }
    }

    /// Box-local linear index of a domain cell, `None` outside the box.
    #[inline]
    pub fn local_index(&self, cell: UVec3) -> Option<u32> {
        if cell.cmplt(self.cell_zero).any() || cell.cmpge(self.cell_zero + self.ncells).any() {
            return None;
        }
        let c = self.axis.reorder((cell - self.cell_zero).as_ivec3());
        Some((c.x + c.y * self.nc.x + c.z * self.nc.w) as u32)
    }

    /// Linear index in the shared boundary/fluid index space.
    #[inline]
    pub fn cell_index(&self, cell: UVec3, part: Partition) -> u32 {
        match self.local_index(cell) {
            Some(local) => self.partition_offset(part) + local,
            None => self.out_cell(part),
        }
    }

    /// First cell index of a partition.
    #[inline]
    pub fn partition_offset(&self, part: Partition) -> u32 {
        match part {
            Partition::Bound => 0,
            Partition::Fluid => self.cell_fluid,
        }
    }

    #[inline]
    pub fn out_cell(&self, part: Partition) -> u32 {
        match part {
            Partition::Bound => self.bound_out_cell(),
            Partition::Fluid => self.fluid_out_cell(),
        }
    }

    /// Box-relative cell of a raw position. May lie outside the box.
    ///
    /// Far-away (or non-finite) positions map to a cell far outside the box
    /// rather than overflowing, so their stencil is empty.
    #[inline]
    pub fn position_cell(&self, pos: DVec3) -> IVec3 {
        let far = (i32::MAX / 2) as f64;
        let cell = ((pos - self.domain_min) / self.cell_size).floor() - self.cell_zero.as_dvec3();
        if cell.is_nan() {
            return IVec3::splat(i32::MIN / 2);
        }
        cell.clamp(DVec3::splat(-far), DVec3::splat(far)).as_ivec3()
    }
}
