//! Packing of 3D cell coordinates into a single `u32` cell code.
//!
//! Layout, high to low bits: `x | y | z`. Per-axis widths come from the grid
//! cell counts, so a domain of 300x20x150 cells uses 9+5+8 bits.

use glam::UVec3;

use crate::constants::{CELL_CODE_MAX_BITS, POS_CELL_BITS};
use crate::error::{CellDivError, CellDivResult, Stage};

/// Bit layout of a cell code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellCoder {
    bits: [u8; 3],
}

impl Default for CellCoder {
    /// One bit per axis, enough for a single cell.
    fn default() -> Self {
        Self { bits: [1, 1, 1] }
    }
}

/// Bits needed to store values in `[0, n)`, at least one.
#[inline]
fn bits_for(n: u32) -> u8 {
    if n <= 1 {
        1
    } else {
        (u32::BITS - (n - 1).leading_zeros()) as u8
    }
}

#[inline]
fn mask(bits: u8) -> u32 {
    if bits as u32 >= u32::BITS {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}

impl CellCoder {
    /// Fixed layout of the cell stored in a `CompactPosition`.
    pub const POS_CELL: Self = Self {
        bits: POS_CELL_BITS,
    };

    /// Narrowest layout able to address `ncells` cells per axis.
    pub fn for_cells(ncells: UVec3) -> CellDivResult<Self> {
        if ncells.min_element() == 0 {
            return Err(CellDivError::InvalidConfig(format!(
                "cell counts must be positive, got {}",
                ncells
            )));
        }
        let coder = Self {
            bits: [bits_for(ncells.x), bits_for(ncells.y), bits_for(ncells.z)],
        };
        if coder.total_bits() > CELL_CODE_MAX_BITS {
            return Err(CellDivError::InvalidConfig(format!(
                "{} cells need {} code bits, at most {} available",
                ncells,
                coder.total_bits(),
                CELL_CODE_MAX_BITS
            )));
        }
        Ok(coder)
    }

    pub fn bits(&self) -> [u8; 3] {
        self.bits
    }

    pub fn total_bits(&self) -> u32 {
        self.bits.iter().map(|&b| b as u32).sum()
    }

    /// Exclusive upper bound of each coordinate.
    pub fn capacity(&self) -> UVec3 {
        UVec3::new(
            mask(self.bits[0]) + 1,
            mask(self.bits[1]) + 1,
            mask(self.bits[2]) + 1,
        )
    }

    #[inline]
    pub fn fits(&self, cell: UVec3) -> bool {
        cell.x <= mask(self.bits[0]) && cell.y <= mask(self.bits[1]) && cell.z <= mask(self.bits[2])
    }

    #[inline]
    fn shift_x(&self) -> u32 {
        (self.bits[1] + self.bits[2]) as u32
    }

    #[inline]
    fn shift_y(&self) -> u32 {
        self.bits[2] as u32
    }

    /// Packs a cell coordinate. Coordinates beyond `capacity()` are truncated;
    /// use [`CellCoder::try_encode`] where input is not already validated.
    #[inline]
    pub fn encode(&self, cell: UVec3) -> u32 {
        ((cell.x & mask(self.bits[0])) << self.shift_x())
            | ((cell.y & mask(self.bits[1])) << self.shift_y())
            | (cell.z & mask(self.bits[2]))
    }

    /// Packs a cell coordinate, reporting coordinates the layout cannot hold.
    pub fn try_encode(&self, cell: UVec3, stage: Stage) -> CellDivResult<u32> {
        if !self.fits(cell) {
            return Err(CellDivError::CellCodeOverflow {
                stage,
                cell,
                capacity: self.capacity(),
            });
        }
        Ok(self.encode(cell))
    }

    #[inline]
    pub fn decode_x(&self, code: u32) -> u32 {
        (code >> self.shift_x()) & mask(self.bits[0])
    }

    #[inline]
    pub fn decode_y(&self, code: u32) -> u32 {
        (code >> self.shift_y()) & mask(self.bits[1])
    }

    #[inline]
    pub fn decode_z(&self, code: u32) -> u32 {
        code & mask(self.bits[2])
    }

    #[inline]
    pub fn decode(&self, code: u32) -> UVec3 {
        UVec3::new(self.decode_x(code), self.decode_y(code), self.decode_z(code))
    }
}
