//! Shared constants for cell division.
//!
//! ## Index layout
//!
//! One linear index space covers both particle partitions:
//!
//! 1. **Boundary cells** `[0, nct)` followed by the boundary out cell `nct`
//! 2. **Fluid cells** `[cellfluid, cellfluid + nct)` followed by the fluid out cell
//!
//! where `nct = nc.w * nc.z` and `cellfluid = nct + 1` (see `div_data.rs`).

/// Threads per block of the two-level reductions (one block = one rayon chunk).
pub const DIVBSIZE: usize = 256;

/// Values written per block by a bounds reduction: min xyz, max xyz.
pub const LIMITS_PER_BLOCK: usize = 6;

/// Reserved cell code for particles that left the domain or were removed.
pub const CELL_CODE_OUT: u32 = u32::MAX;

/// Maximum number of bits a domain cell code may use.
/// Keeps `CELL_CODE_OUT` unreachable by any valid coordinate.
pub const CELL_CODE_MAX_BITS: u32 = 31;

// =============================================================================
// PARTICLE CODE LAYOUT (u16)
// =============================================================================

/// Special state bits (normal, periodic, out...)
pub const CODE_MASK_SPECIAL: u16 = 0xe000;
pub const CODE_NORMAL: u16 = 0x0000;
pub const CODE_PERIODIC: u16 = 0x2000;
pub const CODE_OUTIGNORE: u16 = 0x4000;
pub const CODE_OUTMOVE: u16 = 0x6000;
pub const CODE_OUTPOS: u16 = 0x8000;
pub const CODE_OUTRHOP: u16 = 0xa000;

/// Particle type bits
pub const CODE_MASK_TYPE: u16 = 0x1800;
pub const CODE_TYPE_FIXED: u16 = 0x0000;
pub const CODE_TYPE_MOVING: u16 = 0x0800;
pub const CODE_TYPE_FLOATING: u16 = 0x1000;
pub const CODE_TYPE_FLUID: u16 = 0x1800;

/// Object/mk value bits
pub const CODE_MASK_VALUE: u16 = 0x07ff;

// =============================================================================
// COMPACT POSITION CELL LAYOUT
// =============================================================================

/// Bits of the x/y/z cell coordinate stored in a `CompactPosition`.
pub const POS_CELL_BITS: [u8; 3] = [11, 10, 11];
