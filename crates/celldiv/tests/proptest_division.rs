//! Property-based tests for cell division using proptest
//!
//! These tests check invariants across random inputs:
//! - Cell codes decode to the cell they encode
//! - Every particle lands in its cell's begin/end range
//! - Slot order is a permutation and can be undone
//! - Compact positions give the same distances as raw positions
//! - Stencil bounds stay inside the occupied box

use celldiv::{
    distance2, reorder, unsort, AxisOrder, CellCoder, CellDivision, CompactPosition, DivConfig,
    DivData, DivideMode, NeighborRange, ParticleCode, ParticleData,
};
use glam::{DVec3, IVec3, UVec3, Vec3};
use proptest::prelude::*;

// Division domain
const DOMAIN: f64 = 1.6;
const KERNEL: f64 = 0.1;
const MAX_PARTICLES: usize = 300;

/// Strategy for positions inside the domain
fn valid_position() -> impl Strategy<Value = DVec3> {
    (0.0..DOMAIN, 0.0..DOMAIN, 0.0..DOMAIN).prop_map(|(x, y, z)| DVec3::new(x, y, z))
}

fn axis_order() -> impl Strategy<Value = AxisOrder> {
    prop_oneof![Just(AxisOrder::X), Just(AxisOrder::Y), Just(AxisOrder::Z)]
}

/// Strategy for a particle set and its boundary count
fn particle_set() -> impl Strategy<Value = (Vec<DVec3>, usize)> {
    (0usize..=MAX_PARTICLES).prop_flat_map(|count| {
        (
            prop::collection::vec(valid_position(), count..=count),
            0..=count,
        )
    })
}

fn build_particles(positions: &[DVec3], npb: usize) -> ParticleData {
    let mut particles = ParticleData::with_capacity(positions.len());
    for (i, &pos) in positions.iter().enumerate() {
        if i < npb {
            particles.spawn_boundary(ParticleCode::fixed(0), pos, 1000.0);
        } else {
            particles.spawn_fluid(pos, Vec3::ZERO, 1000.0);
        }
    }
    particles
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: decoding an encoded cell returns the cell
    #[test]
    fn test_cell_code_round_trip(
        n in (1u32..2048, 1u32..2048, 1u32..512),
        frac in (0.0f64..1.0, 0.0f64..1.0, 0.0f64..1.0),
    ) {
        let ncells = UVec3::new(n.0, n.1, n.2);
        let coder = CellCoder::for_cells(ncells).unwrap();
        prop_assert!(coder.total_bits() <= 31);

        let cell = UVec3::new(
            (frac.0 * n.0 as f64) as u32,
            (frac.1 * n.1 as f64) as u32,
            (frac.2 * n.2 as f64) as u32,
        );
        prop_assert!(coder.fits(cell));
        let code = coder.encode(cell);
        prop_assert_eq!(coder.decode(code), cell);
        prop_assert_ne!(code, celldiv::constants::CELL_CODE_OUT);
    }

    /// Property: the table partitions the particles by cell
    #[test]
    fn test_division_partitions_particles((positions, npb) in particle_set(), axis in axis_order()) {
        let mut config = DivConfig::new(KERNEL, DVec3::ZERO, DVec3::splat(DOMAIN));
        config.axis = axis;
        let mut division = CellDivision::new(&config).unwrap();
        let mut particles = build_particles(&positions, npb);
        division.rebuild(&mut particles, DivideMode::Full).unwrap();

        let np = positions.len();
        let table = division.begin_end();
        let keys = division.cell_part();
        let total: usize = table.iter().map(|c| c.len()).sum();
        prop_assert_eq!(total, np);

        for s in 0..np {
            prop_assert!(
                table[keys[s] as usize].range().contains(&s),
                "slot {} key {} not in its range", s, keys[s]
            );
            if s > 0 {
                prop_assert!(keys[s - 1] <= keys[s], "keys descend at {}", s);
            }
        }

        // Ids are a permutation and boundaries stay in front
        let mut ids = particles.idp.clone();
        ids.sort();
        prop_assert_eq!(ids, (0..np as u32).collect::<Vec<_>>());
        prop_assert!(particles.idp[..npb].iter().all(|&id| (id as usize) < npb));
    }

    /// Property: sorting a second time with no motion changes nothing
    #[test]
    fn test_division_idempotent((positions, npb) in particle_set()) {
        let config = DivConfig::new(KERNEL, DVec3::ZERO, DVec3::splat(DOMAIN));
        let mut division = CellDivision::new(&config).unwrap();
        let mut particles = build_particles(&positions, npb);
        division.rebuild(&mut particles, DivideMode::Full).unwrap();
        let first = particles.idp.clone();
        division.rebuild(&mut particles, DivideMode::Full).unwrap();
        prop_assert_eq!(first, particles.idp.clone());
    }

    /// Property: unsort undoes reorder
    #[test]
    fn test_reorder_unsort(values in prop::collection::vec(any::<u64>(), 0..200), seed in any::<u64>()) {
        let n = values.len();
        // Rotation by a seed-dependent amount
        let shift = if n == 0 { 0 } else { (seed % n as u64) as usize };
        let sort_part: Vec<u32> = (0..n).map(|i| ((i + shift) % n.max(1)) as u32).collect();
        let mut sorted = vec![0u64; n];
        reorder(0, &sort_part, &values, &mut sorted).unwrap();
        for i in 0..n {
            prop_assert_eq!(sorted[i], values[sort_part[i] as usize]);
        }
        prop_assert_eq!(unsort(&sort_part, &sorted).unwrap(), values);
    }

    /// Property: compact distance matches double-precision distance
    #[test]
    fn test_distance_matches_raw(a in valid_position(), b in valid_position()) {
        let size = 0.25;
        let pa = CompactPosition::encode(a, DVec3::ZERO, size).unwrap();
        let pb = CompactPosition::encode(b, DVec3::ZERO, size).unwrap();
        let d2 = distance2(&pa, &pb, size as f32) as f64;
        let raw = a.distance_squared(b);
        prop_assert!((d2 - raw).abs() <= 1e-5 * raw.max(1.0), "compact {} raw {}", d2, raw);
    }

    /// Property: stencil bounds never leave the box and hold the query cell
    #[test]
    fn test_stencil_inside_box(
        n in (1u32..12, 1u32..12, 1u32..12),
        cell in (-4i32..16, -4i32..16, -4i32..16),
        axis in axis_order(),
        half in any::<bool>(),
    ) {
        let mut config = DivConfig::new(KERNEL, DVec3::ZERO, DVec3::splat(DOMAIN));
        config.axis = axis;
        if half {
            config.cell_mode = celldiv::CellMode::Half;
        }
        let geometry = config.geometry().unwrap();
        let ncells = UVec3::new(n.0, n.1, n.2);
        let div = DivData::new(&geometry, ncells, UVec3::ZERO, &[]);
        let cell = IVec3::new(cell.0, cell.1, cell.2);
        let range = NeighborRange::around(&div, cell);

        let nc = div.nc;
        if !range.is_empty() {
            prop_assert!(range.ini1 >= 0 && range.fin1 <= nc.x);
            prop_assert!(range.ini2 >= 0 && range.fin2 <= nc.y * nc.x);
            prop_assert!(range.ini3 >= 0 && range.fin3 <= nc.z * nc.w);
            for (c2, c3) in range.rows(&div) {
                prop_assert!(((range.fin1 - 1) + c2 + c3) < div.box_cells() as i32);
            }
        }

        let inside = cell.cmpge(IVec3::ZERO).all() && cell.cmplt(ncells.as_ivec3()).all();
        if inside {
            let c = axis.reorder(cell);
            prop_assert!(range.ini1 <= c.x && c.x < range.fin1);
            prop_assert!(range.ini2 <= c.y * nc.x && c.y * nc.x < range.fin2);
            prop_assert!(range.ini3 <= c.z * nc.w && c.z * nc.w < range.fin3);
        }
    }
}
