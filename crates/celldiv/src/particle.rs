//! Per-particle arrays, stored as parallel vectors.
//!
//! Boundary particles (fixed, moving, floating) occupy slots `[0, npb)`,
//! fluid particles follow. Every array has one entry per particle.

use glam::{DVec3, Vec3, Vec4};

use crate::code::ParticleCode;
use crate::constants::CELL_CODE_OUT;
use crate::error::{CellDivError, CellDivResult, Stage};
use crate::pos_cell::CompactPosition;
use crate::reorder::reorder_into;

/// Particle set in structure-of-arrays layout.
#[derive(Clone, Debug, Default)]
pub struct ParticleData {
    /// Stable particle identifier
    pub idp: Vec<u32>,
    /// Class code (type, object, out state)
    pub code: Vec<ParticleCode>,
    /// Domain cell code, `CELL_CODE_OUT` when unassigned or out
    pub dcell: Vec<u32>,
    /// Double-precision position
    pub pos: Vec<DVec3>,
    /// Velocity (xyz) and density (w)
    pub velrhop: Vec<Vec4>,
    /// Compact position, regenerated after each division
    pub pos_cell: Vec<CompactPosition>,
    npb: usize,
}

impl ParticleData {
    /// Create an empty particle set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            idp: Vec::with_capacity(capacity),
            code: Vec::with_capacity(capacity),
            dcell: Vec::with_capacity(capacity),
            pos: Vec::with_capacity(capacity),
            velrhop: Vec::with_capacity(capacity),
            pos_cell: Vec::with_capacity(capacity),
            npb: 0,
        }
    }

    fn insert(&mut self, slot: usize, code: ParticleCode, pos: DVec3, velrhop: Vec4) -> u32 {
        let id = self.idp.len() as u32;
        self.idp.insert(slot, id);
        self.code.insert(slot, code);
        self.dcell.insert(slot, CELL_CODE_OUT);
        self.pos.insert(slot, pos);
        self.velrhop.insert(slot, velrhop);
        self.pos_cell.insert(slot, CompactPosition::default());
        id
    }

    /// Add a boundary particle after the existing ones. Returns its id.
    pub fn spawn_boundary(&mut self, code: ParticleCode, pos: DVec3, rhop: f32) -> u32 {
        debug_assert!(!code.is_fluid(), "boundary particle with fluid code");
        let id = self.insert(self.npb, code, pos, Vec4::new(0.0, 0.0, 0.0, rhop));
        self.npb += 1;
        id
    }

    /// Add a fluid particle at the end. Returns its id.
    pub fn spawn_fluid(&mut self, pos: DVec3, velocity: Vec3, rhop: f32) -> u32 {
        let slot = self.len();
        self.insert(slot, ParticleCode::fluid(0), pos, velocity.extend(rhop))
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.idp.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.idp.is_empty()
    }

    /// Number of boundary particles.
    pub fn npb(&self) -> usize {
        self.npb
    }

    /// Number of fluid particles.
    pub fn nfluid(&self) -> usize {
        self.len() - self.npb
    }

    /// Marks a particle as out; it is dropped from every neighbor range
    /// at the next division.
    pub fn mark_out(&mut self, slot: usize, special: u16) {
        if let Some(code) = self.code.get_mut(slot) {
            *code = code.with_special(special);
        }
    }

    /// Clear all particles.
    pub fn clear(&mut self) {
        self.idp.clear();
        self.code.clear();
        self.dcell.clear();
        self.pos.clear();
        self.velrhop.clear();
        self.pos_cell.clear();
        self.npb = 0;
    }

    /// Fails unless every array holds `len()` entries.
    pub fn check_lengths(&self) -> CellDivResult<()> {
        let np = self.len();
        let lens = [
            ("code", self.code.len()),
            ("dcell", self.dcell.len()),
            ("pos", self.pos.len()),
            ("velrhop", self.velrhop.len()),
            ("pos_cell", self.pos_cell.len()),
        ];
        for (what, actual) in lens {
            if actual != np {
                return Err(CellDivError::LengthMismatch {
                    stage: Stage::CellAssign,
                    what,
                    expected: np,
                    actual,
                });
            }
        }
        if self.npb > np {
            return Err(CellDivError::LengthMismatch {
                stage: Stage::CellAssign,
                what: "boundary count",
                expected: np,
                actual: self.npb,
            });
        }
        Ok(())
    }

    /// Applies `sort_part` from `pini` on to every array.
    ///
    /// Sorted copies are built in `spare` and swapped in only once all of
    /// them succeeded, so on error `self` is unchanged.
    pub fn reorder(&mut self, pini: usize, sort_part: &[u32], spare: &mut ParticleData) -> CellDivResult<()> {
        reorder_into(pini, sort_part, &self.idp, &mut spare.idp)?;
        reorder_into(pini, sort_part, &self.code, &mut spare.code)?;
        reorder_into(pini, sort_part, &self.dcell, &mut spare.dcell)?;
        reorder_into(pini, sort_part, &self.pos, &mut spare.pos)?;
        reorder_into(pini, sort_part, &self.velrhop, &mut spare.velrhop)?;

        std::mem::swap(&mut self.idp, &mut spare.idp);
        std::mem::swap(&mut self.code, &mut spare.code);
        std::mem::swap(&mut self.dcell, &mut spare.dcell);
        std::mem::swap(&mut self.pos, &mut spare.pos);
        std::mem::swap(&mut self.velrhop, &mut spare.velrhop);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::ParticleKind;
    use crate::constants::CODE_OUTPOS;

    #[test]
    fn test_boundary_before_fluid() {
        let mut particles = ParticleData::new();
        particles.spawn_fluid(DVec3::ONE, Vec3::X, 1000.0);
        particles.spawn_boundary(ParticleCode::fixed(1), DVec3::ZERO, 1000.0);
        particles.spawn_fluid(DVec3::splat(2.0), Vec3::Y, 1000.0);
        particles.spawn_boundary(ParticleCode::moving(2), DVec3::splat(3.0), 1000.0);

        assert_eq!(particles.len(), 4);
        assert_eq!(particles.npb(), 2);
        assert_eq!(particles.nfluid(), 2);
        assert_eq!(particles.idp, vec![1, 3, 0, 2]);
        assert_eq!(particles.code[1].kind(), ParticleKind::Moving);
        assert!(particles.code[2..].iter().all(|c| c.is_fluid()));
        assert!(particles.check_lengths().is_ok());
    }

    #[test]
    fn test_reorder_moves_all_attributes() {
        let mut particles = ParticleData::new();
        for i in 0..4 {
            particles.spawn_fluid(DVec3::splat(i as f64), Vec3::new(i as f32, 0.0, 0.0), 1000.0);
        }
        let mut spare = ParticleData::new();
        particles.reorder(0, &[2, 0, 3, 1], &mut spare).unwrap();
        assert_eq!(particles.idp, vec![2, 0, 3, 1]);
        for p in 0..4 {
            let id = particles.idp[p] as f64;
            assert_eq!(particles.pos[p], DVec3::splat(id));
            assert_eq!(particles.velrhop[p].x as f64, id);
        }
    }

    #[test]
    fn test_failed_reorder_leaves_data() {
        let mut particles = ParticleData::new();
        particles.spawn_fluid(DVec3::ZERO, Vec3::ZERO, 1000.0);
        particles.spawn_fluid(DVec3::ONE, Vec3::ZERO, 1000.0);
        let mut spare = ParticleData::new();
        assert!(particles.reorder(0, &[1, 9], &mut spare).is_err());
        assert_eq!(particles.idp, vec![0, 1]);
    }

    #[test]
    fn test_mark_out() {
        let mut particles = ParticleData::new();
        particles.spawn_fluid(DVec3::ZERO, Vec3::ZERO, 1000.0);
        particles.mark_out(0, CODE_OUTPOS);
        assert!(particles.code[0].is_out());
        // Unknown slot is ignored
        particles.mark_out(5, CODE_OUTPOS);
    }
}
