//! Cell division driver.
//!
//! `CellDivision` owns every buffer that persists between steps and runs the
//! stages in dependency order:
//!
//! 1. Cell codes from positions (`encode_cells`)
//! 2. Occupied bounds, `DivData`, cell sort and begin/end table (`divide`)
//! 3. Scatter of every particle array into cell order (`sort_particles`)
//!
//! Each stage returns before the next starts, so its writes are complete when
//! the next one reads them. A failed stage leaves the particle arrays as they
//! were; the division itself must then be rebuilt with `DivideMode::Full`.

use glam::{DVec3, UVec3};
use rayon::prelude::*;

use crate::begin_end::{calc_begin_end_cell, check_partition, BeginEnd};
use crate::bounds::{limits_cell, limits_pos, limits_scratch_len, CellBounds};
use crate::config::DivConfig;
use crate::constants::CELL_CODE_OUT;
use crate::div_data::{DivData, DivGeometry};
use crate::error::{CellDivError, CellDivResult, Stage};
use crate::particle::ParticleData;
use crate::pos_cell::CompactPosition;
use crate::sort::{pre_sort_fluid, pre_sort_full, sort_by_cell};

/// Which partitions a division rebuilds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DivideMode {
    /// Boundary and fluid
    Full,
    /// Fluid only, reusing the boundary order of the last full division.
    /// Falls back to `Full` when that order is no longer usable.
    FluidOnly,
}

/// Persistent cell division state for one domain.
pub struct CellDivision {
    config: DivConfig,
    geometry: DivGeometry,
    domain_cells: UVec3,

    // Count-sized buffers, grown on demand and never shrunk
    cell_part: Vec<u32>,
    sort_part: Vec<u32>,
    limits_cell_scratch: Vec<u32>,
    limits_pos_scratch: Vec<f64>,
    sort_scratch: Vec<(u32, u32)>,
    transitions: Vec<usize>,
    spare: ParticleData,

    // Last division
    begin_end: Vec<BeginEnd>,
    bound_bounds: CellBounds,
    bounds: CellBounds,
    np: usize,
    npb: usize,
    divided: bool,
    last_full: bool,
    /// Particle arrays are in the order of the last division
    sorted: bool,
}

impl CellDivision {
    /// Create a division for the configured domain.
    pub fn new(config: &DivConfig) -> CellDivResult<Self> {
        let geometry = config.geometry()?;
        let domain_cells = config.domain_cells();
        log::info!(
            "Cell division: {} cells of {:.4} ({:?}, stencil radius {}), code bits {:?}",
            domain_cells,
            geometry.cell_size,
            geometry.axis,
            geometry.stencil_radius,
            geometry.cell_coder.bits()
        );
        Ok(Self {
            config: config.clone(),
            geometry,
            domain_cells,
            cell_part: Vec::new(),
            sort_part: Vec::new(),
            limits_cell_scratch: Vec::new(),
            limits_pos_scratch: Vec::new(),
            sort_scratch: Vec::new(),
            transitions: Vec::new(),
            spare: ParticleData::new(),
            begin_end: Vec::new(),
            bound_bounds: CellBounds::NULL,
            bounds: CellBounds::NULL,
            np: 0,
            npb: 0,
            divided: false,
            last_full: true,
            sorted: false,
        })
    }

    pub fn config(&self) -> &DivConfig {
        &self.config
    }

    pub fn geometry(&self) -> &DivGeometry {
        &self.geometry
    }

    /// Division cells covering the whole domain.
    pub fn domain_cells(&self) -> UVec3 {
        self.domain_cells
    }

    /// Grow the count-sized buffers for `np` particles.
    pub fn resize(&mut self, np: usize) {
        if self.cell_part.len() < np {
            self.cell_part.resize(np, 0);
            self.sort_part.resize(np, 0);
        }
        let scratch = limits_scratch_len(np);
        if self.limits_cell_scratch.len() < scratch {
            self.limits_cell_scratch.resize(scratch, 0);
            self.limits_pos_scratch.resize(scratch, 0.0);
        }
        if self.sort_scratch.capacity() < np {
            self.sort_scratch.reserve(np - self.sort_scratch.len());
        }
        if self.transitions.capacity() < np {
            self.transitions.reserve(np - self.transitions.len());
        }
    }

    /// Position box of the live particles, `None` if there are none.
    pub fn position_bounds(&mut self, particles: &ParticleData) -> CellDivResult<Option<(DVec3, DVec3)>> {
        let np = particles.len();
        self.resize(np);
        limits_pos(0..np, &particles.pos, &particles.code, &mut self.limits_pos_scratch)
    }

    /// Computes every particle's domain cell code from its position.
    ///
    /// Out particles get `CELL_CODE_OUT`. A live particle outside the domain
    /// (or with a non-finite position) is an error.
    pub fn encode_cells(&self, particles: &mut ParticleData) -> CellDivResult<()> {
        particles.check_lengths()?;
        let dmin = self.config.domain_min;
        let dmax = self.config.domain_max;
        let cell_size = self.geometry.cell_size;
        let coder = self.geometry.cell_coder;
        let last_cell = self.domain_cells - UVec3::ONE;

        let pos = &particles.pos;
        let code = &particles.code;
        particles
            .dcell
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(p, dcell)| {
                if code[p].is_out() {
                    *dcell = CELL_CODE_OUT;
                    return Ok(());
                }
                let pos = pos[p];
                if !(pos.cmpge(dmin).all() && pos.cmple(dmax).all()) {
                    return Err(CellDivError::PositionOutOfDomain {
                        stage: Stage::CellAssign,
                        index: p,
                        pos,
                        min: dmin,
                        max: dmax,
                    });
                }
                // Positions on the max face belong to the last cell
                let cell = ((pos - dmin) / cell_size).as_uvec3().min(last_cell);
                *dcell = coder.encode(cell);
                Ok(())
            })
    }

    /// Divides the particles into cells: bounds, cell indices, sort and
    /// begin/end table. The particle arrays are not touched.
    pub fn divide(&mut self, particles: &ParticleData, mode: DivideMode) -> CellDivResult<()> {
        particles.check_lengths()?;
        let np = particles.len();
        let npb = particles.npb();
        self.resize(np);

        if np == 0 {
            self.begin_end.clear();
            self.bound_bounds = CellBounds::NULL;
            self.bounds = CellBounds::NULL;
            self.np = 0;
            self.npb = 0;
            self.divided = true;
            self.last_full = true;
            self.sorted = true;
            log::debug!("Cell division: no particles");
            return Ok(());
        }

        let reusable = self.divided && self.sorted && np == self.np && npb == self.npb;
        let mut full = mode == DivideMode::Full || !reusable;

        // Bounds
        let coder = self.geometry.cell_coder;
        if full {
            self.bound_bounds = limits_cell(
                0..npb,
                &coder,
                self.domain_cells,
                &particles.dcell,
                &particles.code,
                &mut self.limits_cell_scratch,
            )?;
        }
        let fluid_bounds = limits_cell(
            npb..np,
            &coder,
            self.domain_cells,
            &particles.dcell,
            &particles.code,
            &mut self.limits_cell_scratch,
        )?;
        if !full && !self.bounds.contains(&fluid_bounds) {
            log::debug!("Cell division: fluid left the box {:?}, dividing in full", self.bounds);
            full = true;
            self.bound_bounds = limits_cell(
                0..npb,
                &coder,
                self.domain_cells,
                &particles.dcell,
                &particles.code,
                &mut self.limits_cell_scratch,
            )?;
        }
        if full {
            self.bounds = self.bound_bounds.union(&fluid_bounds);
        }

        // DivData
        let ncells = self.bounds.extent();
        let cell_zero = if self.bounds.is_empty() {
            UVec3::ZERO
        } else {
            self.bounds.min
        };
        let div = DivData::new(&self.geometry, ncells, cell_zero, &[]);
        let cell_fluid = div.cell_fluid;
        self.begin_end.resize(div.table_len(), BeginEnd::default());

        // Sort
        let cell_part = &mut self.cell_part[..np];
        let sort_part = &mut self.sort_part[..np];
        if full {
            pre_sort_full(np, npb, &div, &particles.dcell, &particles.code, cell_part, sort_part)?;
        } else {
            pre_sort_fluid(np, npb, &div, &particles.dcell, &particles.code, cell_part, sort_part)?;
        }
        let pini = if full { 0 } else { npb };
        sort_by_cell(
            &mut cell_part[pini..],
            &mut sort_part[pini..],
            self.config.stable_sort,
            &mut self.sort_scratch,
        )?;

        // Begin/end table
        calc_begin_end_cell(
            full,
            np,
            npb,
            cell_fluid,
            cell_part,
            &mut self.begin_end,
            &mut self.transitions,
        )?;

        self.np = np;
        self.npb = npb;
        self.divided = true;
        self.last_full = full;
        self.sorted = false;
        log::debug!(
            "Cell division: np={} npb={} box={:?} ncells={} table={} full={}",
            np,
            npb,
            self.bounds,
            ncells,
            self.begin_end.len(),
            full
        );

        if self.config.verify {
            if let Err(err) = self.verify(particles) {
                log::error!("Cell division failed verification: {}", err);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Applies the last division's permutation to every particle array and
    /// regenerates the compact positions.
    pub fn sort_particles(&mut self, particles: &mut ParticleData) -> CellDivResult<()> {
        if !self.divided {
            return Err(CellDivError::Verification {
                stage: Stage::Reorder,
                detail: "no division to apply".into(),
            });
        }
        if particles.len() != self.np || particles.npb() != self.npb {
            return Err(CellDivError::LengthMismatch {
                stage: Stage::Reorder,
                what: "particles",
                expected: self.np,
                actual: particles.len(),
            });
        }
        if !self.sorted {
            let pini = if self.last_full { 0 } else { self.npb };
            particles.reorder(pini, &self.sort_part[..self.np], &mut self.spare)?;
            self.sorted = true;
        }
        self.update_pos_cell(particles)
    }

    /// Recomputes `pos_cell` from the double-precision positions.
    ///
    /// Positions on the domain's max face are kept in the last encoding cell.
    pub fn update_pos_cell(&self, particles: &mut ParticleData) -> CellDivResult<()> {
        let dmin = self.config.domain_min;
        let dmax = self.config.domain_max;
        let size = self.geometry.pos_cell_size;
        let last_cell = self.config.pos_cells() - UVec3::ONE;
        let pos = &particles.pos;
        let code = &particles.code;
        particles.pos_cell.resize(pos.len(), CompactPosition::default());
        particles
            .pos_cell
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(p, pos_cell)| {
                let pos = pos[p];
                let inside = pos.cmpge(dmin).all() && pos.cmple(dmax).all();
                let encoded = if inside {
                    CompactPosition::encode_clamped(pos, dmin, size, last_cell)
                } else {
                    None
                };
                match encoded {
                    Some(encoded) => *pos_cell = encoded,
                    None if code[p].is_out() => *pos_cell = CompactPosition::default(),
                    None => {
                        return Err(CellDivError::PositionOutOfDomain {
                            stage: Stage::CellAssign,
                            index: p,
                            pos,
                            min: dmin,
                            max: dmax,
                        })
                    }
                }
                Ok(())
            })
    }

    /// Full step: cell codes, division and scatter.
    pub fn rebuild(&mut self, particles: &mut ParticleData, mode: DivideMode) -> CellDivResult<()> {
        self.encode_cells(particles)?;
        self.divide(particles, mode)?;
        self.sort_particles(particles)
    }

    /// Snapshot of the last division. Null before the first one or with no particles.
    pub fn div_data(&self) -> DivData<'_> {
        if !self.divided || self.np == 0 {
            return DivData::null();
        }
        DivData::new(
            &self.geometry,
            self.bounds.extent(),
            if self.bounds.is_empty() {
                UVec3::ZERO
            } else {
                self.bounds.min
            },
            &self.begin_end,
        )
    }

    pub fn begin_end(&self) -> &[BeginEnd] {
        &self.begin_end
    }

    /// Sorted cell index per slot.
    pub fn cell_part(&self) -> &[u32] {
        &self.cell_part[..self.np]
    }

    /// Original slot per sorted slot.
    pub fn sort_part(&self) -> &[u32] {
        &self.sort_part[..self.np]
    }

    /// Occupied cell box of the last division.
    pub fn bounds(&self) -> CellBounds {
        self.bounds
    }

    pub fn np(&self) -> usize {
        self.np
    }

    pub fn npb(&self) -> usize {
        self.npb
    }

    /// Whether the last division rebuilt both partitions.
    pub fn last_was_full(&self) -> bool {
        self.last_full
    }

    /// Re-checks the last division against `particles` (in pre-sort order).
    pub fn verify(&self, particles: &ParticleData) -> CellDivResult<()> {
        let np = self.np;
        let npb = self.npb;
        let fail = |stage: Stage, detail: String| CellDivError::Verification { stage, detail };

        // Bounds cover every live particle
        let coder = self.geometry.cell_coder;
        let escaped = (0..np).into_par_iter().find_first(|&p| {
            let dcell = particles.dcell[p];
            !(dcell == CELL_CODE_OUT
                || particles.code[p].is_out()
                || self.bounds.contains(&CellBounds::new(coder.decode(dcell), coder.decode(dcell))))
        });
        if let Some(p) = escaped {
            return Err(fail(
                Stage::BoundsScan,
                format!("particle {} outside box {:?}", p, self.bounds),
            ));
        }

        // Keys ascend within each sorted range and partitions do not mix
        let div = self.div_data();
        let keys = self.cell_part();
        let pini = if self.last_full { 0 } else { npb };
        if let Some(p) = (pini.max(1)..np).into_par_iter().find_first(|&p| keys[p] < keys[p - 1]) {
            return Err(fail(Stage::Sort, format!("keys descend at slot {}", p)));
        }
        if let Some(p) = (0..np).into_par_iter().find_first(|&p| (keys[p] >= div.cell_fluid) != (p >= npb)) {
            return Err(fail(Stage::Sort, format!("slot {} in the wrong partition", p)));
        }
        let perm = self.sort_part();
        if let Some(p) = (0..np).into_par_iter().find_first(|&p| perm[p] as usize >= np) {
            return Err(fail(Stage::Sort, format!("slot {} maps past {}", p, np)));
        }

        check_partition(0, np, keys, &self.begin_end).map_err(|detail| fail(Stage::BeginEnd, detail))
    }
}
