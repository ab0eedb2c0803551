//! Cell division and neighbor search for SPH particle sets.
//!
//! Every step the domain is split into a uniform grid of cells of the
//! interaction radius (or half of it). Particles are sorted by cell so that
//! each cell is one contiguous slot range, recorded in a begin/end table.
//! A neighbor query then reduces to a handful of contiguous ranges, one per
//! row of cells around the query cell.
//!
//! # Example
//!
//! ```
//! use celldiv::{CellDivision, DivConfig, DivideMode, ParticleData, Partition};
//! use glam::{DVec3, Vec3};
//!
//! let config = DivConfig::new(0.1, DVec3::ZERO, DVec3::splat(1.0));
//! let mut division = CellDivision::new(&config).unwrap();
//!
//! let mut particles = ParticleData::new();
//! for i in 0..10 {
//!     particles.spawn_fluid(DVec3::new(0.03 * i as f64, 0.5, 0.5), Vec3::ZERO, 1000.0);
//! }
//! division.rebuild(&mut particles, DivideMode::Full).unwrap();
//!
//! // Neighbors of the particle now in slot 0
//! let div = division.div_data();
//! let mut count = 0;
//! celldiv::for_each_neighbor(&div, &particles.dcell, &particles.pos_cell, 0, Partition::Fluid, |_, _| {
//!     count += 1;
//! });
//! assert_eq!(count, 3);
//! ```

pub mod begin_end;
pub mod bounds;
pub mod cell_code;
pub mod code;
pub mod config;
pub mod constants;
pub mod distance;
pub mod div_data;
pub mod division;
pub mod error;
pub mod inspect;
pub mod particle;
pub mod pos_cell;
pub mod reorder;
pub mod search;
pub mod sort;

pub use begin_end::{calc_begin_end_cell, BeginEnd};
pub use bounds::{limits_cell, limits_pos, limits_scratch_len, CellBounds};
pub use cell_code::CellCoder;
pub use code::{ParticleCode, ParticleKind};
pub use config::{CellMode, DivConfig};
pub use distance::distance2;
pub use div_data::{AxisOrder, DivData, DivGeometry, Partition};
pub use division::{CellDivision, DivideMode};
pub use error::{CellDivError, CellDivResult, Stage};
pub use particle::ParticleData;
pub use pos_cell::CompactPosition;
pub use reorder::{reorder, reorder_into, unsort};
pub use search::{for_each_neighbor, particle_range, NeighborRange};
pub use sort::{pre_sort_fluid, pre_sort_full, sort_by_cell};
