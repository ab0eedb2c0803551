//! Occupied-bounds scanner.
//!
//! Two-level parallel min/max reduction: the first level reduces blocks of
//! `DIVBSIZE` particles into a scratch buffer, the second reduces blocks of
//! those partial results, and the few remaining values are folded serially.
//! Scratch size depends only on the particle count (`limits_scratch_len`)
//! so the buffer can be kept between steps.

use std::ops::Range;

use glam::{DVec3, UVec3};
use rayon::prelude::*;

use crate::cell_code::CellCoder;
use crate::code::ParticleCode;
use crate::constants::{CELL_CODE_OUT, DIVBSIZE, LIMITS_PER_BLOCK};
use crate::error::{ensure_len, CellDivError, CellDivResult, Stage};

/// Scratch elements needed to reduce the limits of `n` particles.
pub fn limits_scratch_len(n: usize) -> usize {
    let n = n.max(DIVBSIZE);
    let s = n / DIVBSIZE + 1;
    s * LIMITS_PER_BLOCK + (s / DIVBSIZE + 1) * LIMITS_PER_BLOCK + DIVBSIZE
}

/// Inclusive box of occupied cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellBounds {
    pub min: UVec3,
    pub max: UVec3,
}

impl CellBounds {
    /// Empty box (min above max).
    pub const NULL: Self = Self {
        min: UVec3::MAX,
        max: UVec3::ZERO,
    };

    pub fn new(min: UVec3, max: UVec3) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn union(&self, other: &CellBounds) -> CellBounds {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        CellBounds::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// Cells per axis, zero for an empty box.
    pub fn extent(&self) -> UVec3 {
        if self.is_empty() {
            UVec3::ZERO
        } else {
            self.max - self.min + UVec3::ONE
        }
    }

    /// True if `other` lies entirely inside this box. An empty box is inside anything.
    pub fn contains(&self, other: &CellBounds) -> bool {
        other.is_empty()
            || (!self.is_empty() && self.min.cmple(other.min).all() && other.max.cmple(self.max).all())
    }
}

impl Default for CellBounds {
    fn default() -> Self {
        Self::NULL
    }
}

/// Element type the reduction can run on.
pub trait LimitValue: Copy + Send + Sync + PartialOrd {
    const LOWEST: Self;
    const HIGHEST: Self;
}

impl LimitValue for u32 {
    const LOWEST: Self = 0;
    const HIGHEST: Self = u32::MAX;
}

impl LimitValue for f64 {
    const LOWEST: Self = f64::NEG_INFINITY;
    const HIGHEST: Self = f64::INFINITY;
}

#[inline]
fn identity<T: LimitValue>() -> [T; LIMITS_PER_BLOCK] {
    [T::HIGHEST, T::HIGHEST, T::HIGHEST, T::LOWEST, T::LOWEST, T::LOWEST]
}

#[inline]
fn merge<T: LimitValue>(mut acc: [T; LIMITS_PER_BLOCK], other: &[T]) -> [T; LIMITS_PER_BLOCK] {
    for i in 0..3 {
        if other[i] < acc[i] {
            acc[i] = other[i];
        }
        if other[i + 3] > acc[i + 3] {
            acc[i + 3] = other[i + 3];
        }
    }
    acc
}

#[inline]
fn include<T: LimitValue>(acc: [T; LIMITS_PER_BLOCK], v: [T; 3]) -> [T; LIMITS_PER_BLOCK] {
    merge(acc, &[v[0], v[1], v[2], v[0], v[1], v[2]])
}

/// Min/max of `sample(p)` over `range`, skipping `None` samples.
fn reduce_limits<T, F>(
    range: Range<usize>,
    scratch: &mut [T],
    sample: F,
) -> CellDivResult<Option<([T; 3], [T; 3])>>
where
    T: LimitValue,
    F: Fn(usize) -> Option<[T; 3]> + Sync,
{
    let n = range.len();
    let required = limits_scratch_len(n);
    if scratch.len() < required {
        return Err(CellDivError::ScratchTooSmall {
            stage: Stage::BoundsScan,
            required,
            available: scratch.len(),
        });
    }
    if n == 0 {
        return Ok(None);
    }

    let nblocks = n.div_ceil(DIVBSIZE);
    let (level1, rest) = scratch.split_at_mut(nblocks * LIMITS_PER_BLOCK);
    level1
        .par_chunks_mut(LIMITS_PER_BLOCK)
        .enumerate()
        .for_each(|(block, out)| {
            let start = range.start + block * DIVBSIZE;
            let end = (start + DIVBSIZE).min(range.end);
            let limits = (start..end).filter_map(&sample).fold(identity(), include);
            out.copy_from_slice(&limits);
        });

    let nblocks2 = nblocks.div_ceil(DIVBSIZE);
    let level2 = &mut rest[..nblocks2 * LIMITS_PER_BLOCK];
    level2
        .par_chunks_mut(LIMITS_PER_BLOCK)
        .zip(level1.par_chunks(LIMITS_PER_BLOCK * DIVBSIZE))
        .for_each(|(out, blocks)| {
            let limits = blocks.chunks(LIMITS_PER_BLOCK).fold(identity(), merge);
            out.copy_from_slice(&limits);
        });

    let total = level2.chunks(LIMITS_PER_BLOCK).fold(identity(), merge);
    if total[0] > total[3] {
        return Ok(None);
    }
    Ok(Some(([total[0], total[1], total[2]], [total[3], total[4], total[5]])))
}

/// Cell box occupied by the particles in `range`.
///
/// Out particles and `CELL_CODE_OUT` cells are skipped. A decoded cell at or
/// beyond `domain_cells` means the codes were written with another layout
/// and is reported as an overflow.
pub fn limits_cell(
    range: Range<usize>,
    coder: &CellCoder,
    domain_cells: UVec3,
    dcell: &[u32],
    code: &[ParticleCode],
    scratch: &mut [u32],
) -> CellDivResult<CellBounds> {
    ensure_len(Stage::BoundsScan, "dcell", range.end, dcell.len())?;
    ensure_len(Stage::BoundsScan, "code", range.end, code.len())?;
    let limits = reduce_limits(range, scratch, |p| {
        let cell = dcell[p];
        if cell == CELL_CODE_OUT || code[p].is_out() {
            None
        } else {
            Some(coder.decode(cell).to_array())
        }
    })?;
    let Some((min, max)) = limits else {
        return Ok(CellBounds::NULL);
    };
    let bounds = CellBounds::new(UVec3::from_array(min), UVec3::from_array(max));
    if bounds.max.cmpge(domain_cells).any() {
        return Err(CellDivError::CellCodeOverflow {
            stage: Stage::BoundsScan,
            cell: bounds.max,
            capacity: domain_cells,
        });
    }
    Ok(bounds)
}

/// Position box of the non-out particles in `range`, `None` if there are none.
pub fn limits_pos(
    range: Range<usize>,
    pos: &[DVec3],
    code: &[ParticleCode],
    scratch: &mut [f64],
) -> CellDivResult<Option<(DVec3, DVec3)>> {
    ensure_len(Stage::BoundsScan, "pos", range.end, pos.len())?;
    ensure_len(Stage::BoundsScan, "code", range.end, code.len())?;
    let limits = reduce_limits(range, scratch, |p| {
        if code[p].is_out() {
            None
        } else {
            Some(pos[p].to_array())
        }
    })?;
    Ok(limits.map(|(min, max)| (DVec3::from_array(min), DVec3::from_array(max))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CODE_OUTPOS;

    #[test]
    fn test_scratch_len_formula() {
        // Small counts are padded to one block
        assert_eq!(limits_scratch_len(0), 2 * 6 + 6 + 256);
        assert_eq!(limits_scratch_len(256), 2 * 6 + 6 + 256);
        assert_eq!(limits_scratch_len(100_000), 391 * 6 + 2 * 6 + 256);
    }

    #[test]
    fn test_limits_cell_skips_out_particles() {
        let coder = CellCoder::for_cells(UVec3::new(10, 10, 10)).unwrap();
        let cells = [UVec3::new(2, 3, 4), UVec3::new(5, 1, 7), UVec3::new(9, 9, 9)];
        let dcell: Vec<u32> = cells.iter().map(|&c| coder.encode(c)).collect();
        let code = vec![
            ParticleCode::fluid(0),
            ParticleCode::fluid(0),
            ParticleCode::fluid(0).with_special(CODE_OUTPOS),
        ];
        let mut scratch = vec![0u32; limits_scratch_len(3)];
        let bounds = limits_cell(0..3, &coder, UVec3::splat(10), &dcell, &code, &mut scratch).unwrap();
        assert_eq!(bounds, CellBounds::new(UVec3::new(2, 1, 4), UVec3::new(5, 3, 7)));
    }

    #[test]
    fn test_limits_cell_many_blocks_matches_serial() {
        let coder = CellCoder::for_cells(UVec3::new(64, 64, 64)).unwrap();
        let n = 70_000;
        let dcell: Vec<u32> = (0..n as u32)
            .map(|i| coder.encode(UVec3::new(i % 61, (i / 7) % 50 + 3, (i * 13) % 64)))
            .collect();
        let code = vec![ParticleCode::fixed(0); n];
        let mut scratch = vec![0u32; limits_scratch_len(n)];
        let bounds = limits_cell(0..n, &coder, UVec3::splat(64), &dcell, &code, &mut scratch).unwrap();

        let mut min = UVec3::MAX;
        let mut max = UVec3::ZERO;
        for &c in &dcell {
            min = min.min(coder.decode(c));
            max = max.max(coder.decode(c));
        }
        assert_eq!(bounds, CellBounds::new(min, max));
    }

    #[test]
    fn test_limits_on_sub_range() {
        let coder = CellCoder::for_cells(UVec3::new(8, 8, 8)).unwrap();
        let dcell = vec![
            coder.encode(UVec3::new(0, 0, 0)),
            coder.encode(UVec3::new(6, 6, 6)),
            coder.encode(UVec3::new(3, 4, 5)),
        ];
        let code = vec![ParticleCode::fluid(0); 3];
        let mut scratch = vec![0u32; limits_scratch_len(3)];
        let bounds = limits_cell(2..3, &coder, UVec3::splat(8), &dcell, &code, &mut scratch).unwrap();
        assert_eq!(bounds, CellBounds::new(UVec3::new(3, 4, 5), UVec3::new(3, 4, 5)));
    }

    #[test]
    fn test_empty_input_gives_null_box() {
        let coder = CellCoder::for_cells(UVec3::new(8, 8, 8)).unwrap();
        let mut scratch = vec![0u32; limits_scratch_len(0)];
        let bounds = limits_cell(0..0, &coder, UVec3::splat(8), &[], &[], &mut scratch).unwrap();
        assert!(bounds.is_empty());
        assert_eq!(bounds.extent(), UVec3::ZERO);

        // All particles out is also empty
        let code = vec![ParticleCode::fluid(0).with_special(CODE_OUTPOS); 2];
        let bounds = limits_cell(0..2, &coder, UVec3::splat(8), &[0, 1], &code, &mut scratch).unwrap();
        assert!(bounds.is_empty());
    }

    #[test]
    fn test_cell_beyond_domain_is_overflow() {
        let coder = CellCoder::for_cells(UVec3::new(5, 5, 5)).unwrap();
        let dcell = vec![coder.encode(UVec3::new(6, 0, 0))];
        let code = vec![ParticleCode::fluid(0)];
        let mut scratch = vec![0u32; limits_scratch_len(1)];
        let err = limits_cell(0..1, &coder, UVec3::splat(5), &dcell, &code, &mut scratch).unwrap_err();
        assert!(matches!(err, CellDivError::CellCodeOverflow { stage: Stage::BoundsScan, .. }));
    }

    #[test]
    fn test_undersized_scratch() {
        let coder = CellCoder::for_cells(UVec3::new(8, 8, 8)).unwrap();
        let mut scratch = vec![0u32; 10];
        let err = limits_cell(0..0, &coder, UVec3::splat(8), &[], &[], &mut scratch).unwrap_err();
        assert!(matches!(err, CellDivError::ScratchTooSmall { required: 274, available: 10, .. }));
    }

    #[test]
    fn test_limits_pos() {
        let pos = vec![
            DVec3::new(1.0, -2.0, 3.0),
            DVec3::new(-1.5, 4.0, 0.5),
            DVec3::new(100.0, 100.0, 100.0),
        ];
        let code = vec![
            ParticleCode::fluid(0),
            ParticleCode::fluid(0),
            ParticleCode::fluid(0).with_special(CODE_OUTPOS),
        ];
        let mut scratch = vec![0.0f64; limits_scratch_len(3)];
        let (min, max) = limits_pos(0..3, &pos, &code, &mut scratch).unwrap().unwrap();
        assert_eq!(min, DVec3::new(-1.5, -2.0, 0.5));
        assert_eq!(max, DVec3::new(1.0, 4.0, 3.0));
        assert!(limits_pos(0..0, &pos, &code, &mut scratch).unwrap().is_none());
    }

    #[test]
    fn test_bounds_helpers() {
        let a = CellBounds::new(UVec3::new(1, 1, 1), UVec3::new(3, 3, 3));
        let b = CellBounds::new(UVec3::new(2, 0, 2), UVec3::new(5, 2, 2));
        let u = a.union(&b);
        assert_eq!(u, CellBounds::new(UVec3::new(1, 0, 1), UVec3::new(5, 3, 3)));
        assert!(u.contains(&a) && u.contains(&b));
        assert!(!a.contains(&b));
        assert!(a.contains(&CellBounds::NULL));
        assert_eq!(CellBounds::NULL.union(&a), a);
        assert_eq!(a.extent(), UVec3::new(3, 3, 3));
    }
}
