//! Scatter of per-particle arrays into cell-sorted order.
//!
//! One generic operation serves every attribute type:
//! `dst[p] = src[sort_part[p]]` for the sorted slots `p >= pini`, with the
//! untouched prefix `[0, pini)` copied as-is so the destination is complete.

use rayon::prelude::*;

use crate::error::{ensure_len, CellDivError, CellDivResult, Stage};

/// Fails if any permutation entry from `pini` on points past `len`.
fn check_permutation(pini: usize, sort_part: &[u32], len: usize) -> CellDivResult<()> {
    let bad = sort_part[pini.min(sort_part.len())..]
        .par_iter()
        .position_any(|&s| s as usize >= len);
    match bad {
        Some(i) => Err(CellDivError::Verification {
            stage: Stage::Reorder,
            detail: format!(
                "slot {} maps to {} beyond {} elements",
                pini + i,
                sort_part[pini + i],
                len
            ),
        }),
        None => Ok(()),
    }
}

/// Writes the sorted copy of `src` into `dst`. Both must hold `sort_part.len()` elements.
pub fn reorder<T: Copy + Send + Sync>(
    pini: usize,
    sort_part: &[u32],
    src: &[T],
    dst: &mut [T],
) -> CellDivResult<()> {
    let np = sort_part.len();
    ensure_len(Stage::Reorder, "src", np, src.len())?;
    ensure_len(Stage::Reorder, "dst", np, dst.len())?;
    ensure_len(Stage::Reorder, "sort_part", pini, np)?;
    check_permutation(pini, sort_part, np)?;

    dst[..pini].copy_from_slice(&src[..pini]);
    dst[pini..np]
        .par_iter_mut()
        .zip(sort_part[pini..].par_iter())
        .for_each(|(d, &s)| *d = src[s as usize]);
    Ok(())
}

/// Like [`reorder`], reusing `dst`'s allocation and resizing it to fit.
pub fn reorder_into<T: Copy + Send + Sync>(
    pini: usize,
    sort_part: &[u32],
    src: &[T],
    dst: &mut Vec<T>,
) -> CellDivResult<()> {
    let np = sort_part.len();
    ensure_len(Stage::Reorder, "src", np, src.len())?;
    ensure_len(Stage::Reorder, "sort_part", pini, np)?;
    check_permutation(pini, sort_part, np)?;

    dst.clear();
    dst.par_extend(
        (0..np)
            .into_par_iter()
            .map(|p| if p < pini { src[p] } else { src[sort_part[p] as usize] }),
    );
    Ok(())
}

/// Original slot to sorted slot.
pub fn inverse_permutation(sort_part: &[u32]) -> Vec<u32> {
    let mut inverse = vec![0u32; sort_part.len()];
    for (sorted, &original) in sort_part.iter().enumerate() {
        if let Some(slot) = inverse.get_mut(original as usize) {
            *slot = sorted as u32;
        }
    }
    inverse
}

/// Puts cell-sorted data back into original slot order.
pub fn unsort<T: Copy + Send + Sync>(sort_part: &[u32], sorted: &[T]) -> CellDivResult<Vec<T>> {
    ensure_len(Stage::Reorder, "sorted", sort_part.len(), sorted.len())?;
    let inverse = inverse_permutation(sort_part);
    let mut out = Vec::with_capacity(sort_part.len());
    reorder_into(0, &inverse, sorted, &mut out)?;
    Ok(out)
}
