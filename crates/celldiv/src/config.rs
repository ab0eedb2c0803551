//! Division configuration.
//!
//! Supplied by the surrounding simulation setup; loadable from JSON or YAML.

use std::path::Path;

use glam::{DVec3, UVec3};
use serde::{Deserialize, Serialize};

use crate::cell_code::CellCoder;
use crate::div_data::{AxisOrder, DivGeometry};
use crate::error::{CellDivError, CellDivResult};

/// Cell size relative to the interaction radius.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellMode {
    /// Cells as wide as the interaction radius, one layer of neighbor cells
    #[default]
    Full,
    /// Cells half the interaction radius, two layers of neighbor cells
    Half,
}

impl CellMode {
    pub fn stencil_radius(self) -> u32 {
        match self {
            CellMode::Full => 1,
            CellMode::Half => 2,
        }
    }
}

/// Configuration for a cell division domain
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DivConfig {
    /// Interaction radius (kernel support)
    pub kernel_size: f64,

    #[serde(default)]
    pub cell_mode: CellMode,

    #[serde(default)]
    pub axis: AxisOrder,

    /// Domain minimum corner
    #[serde(with = "dvec3_serde")]
    pub domain_min: DVec3,

    /// Domain maximum corner
    #[serde(with = "dvec3_serde")]
    pub domain_max: DVec3,

    /// Cell size of the compact position encoding (defaults to `kernel_size`)
    #[serde(default)]
    pub pos_cell_size: Option<f64>,

    /// Keep same-cell particles in slot order when sorting
    #[serde(default = "default_stable_sort")]
    pub stable_sort: bool,

    /// Re-check every stage's output (slow, for debugging)
    #[serde(default)]
    pub verify: bool,
}

fn default_stable_sort() -> bool {
    true
}

/// Domain corners as `{x, y, z}` maps.
mod dvec3_serde {
    use glam::DVec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Corner {
        x: f64,
        y: f64,
        z: f64,
    }

    pub fn serialize<S>(v: &DVec3, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Corner { x: v.x, y: v.y, z: v.z }.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DVec3, D::Error>
    where
        D: Deserializer<'de>,
    {
        let c = Corner::deserialize(deserializer)?;
        Ok(DVec3::new(c.x, c.y, c.z))
    }
}

impl DivConfig {
    /// Config with defaults for everything but the radius and domain.
    pub fn new(kernel_size: f64, domain_min: DVec3, domain_max: DVec3) -> Self {
        Self {
            kernel_size,
            cell_mode: CellMode::default(),
            axis: AxisOrder::default(),
            domain_min,
            domain_max,
            pos_cell_size: None,
            stable_sort: default_stable_sort(),
            verify: false,
        }
    }

    pub fn stencil_radius(&self) -> u32 {
        self.cell_mode.stencil_radius()
    }

    /// Edge length of a division cell.
    pub fn cell_size(&self) -> f64 {
        self.kernel_size / self.stencil_radius() as f64
    }

    pub fn pos_cell_size(&self) -> f64 {
        self.pos_cell_size.unwrap_or(self.kernel_size)
    }

    /// Division cells covering the domain.
    pub fn domain_cells(&self) -> UVec3 {
        let n = ((self.domain_max - self.domain_min) / self.cell_size()).ceil();
        n.max(DVec3::ONE).as_uvec3()
    }

    /// Encoding cells covering the domain.
    pub fn pos_cells(&self) -> UVec3 {
        let n = ((self.domain_max - self.domain_min) / self.pos_cell_size()).ceil();
        n.max(DVec3::ONE).as_uvec3()
    }

    /// Checks the domain against the radius and both cell encodings.
    pub fn validate(&self) -> CellDivResult<()> {
        if !(self.kernel_size.is_finite() && self.kernel_size > 0.0) {
            return Err(CellDivError::InvalidConfig(format!(
                "kernel_size must be positive, got {}",
                self.kernel_size
            )));
        }
        if !(self.domain_min.is_finite() && self.domain_max.is_finite()) {
            return Err(CellDivError::InvalidConfig("domain corners must be finite".into()));
        }
        if self.domain_max.cmple(self.domain_min).any() {
            return Err(CellDivError::InvalidConfig(format!(
                "domain max {} must exceed min {} on every axis",
                self.domain_max, self.domain_min
            )));
        }
        let pos_cell_size = self.pos_cell_size();
        if !(pos_cell_size.is_finite() && pos_cell_size > 0.0) {
            return Err(CellDivError::InvalidConfig(format!(
                "pos_cell_size must be positive, got {}",
                pos_cell_size
            )));
        }
        // Both encodings must address the whole domain
        CellCoder::for_cells(self.domain_cells())?;
        let pos_cells = self.pos_cells();
        if !CellCoder::POS_CELL.fits(pos_cells - UVec3::ONE) {
            return Err(CellDivError::InvalidConfig(format!(
                "domain needs {} position cells, at most {} available",
                pos_cells,
                CellCoder::POS_CELL.capacity()
            )));
        }
        Ok(())
    }

    /// Validated geometry for building `DivData`.
    pub fn geometry(&self) -> CellDivResult<DivGeometry> {
        self.validate()?;
        Ok(DivGeometry {
            axis: self.axis,
            stencil_radius: self.stencil_radius(),
            cell_size: self.cell_size(),
            cell_coder: CellCoder::for_cells(self.domain_cells())?,
            domain_min: self.domain_min,
            kernel_size2: (self.kernel_size * self.kernel_size) as f32,
            pos_cell_size: self.pos_cell_size(),
        })
    }

    /// Save configuration to JSON file
    pub fn save_json(&self, path: &Path) -> CellDivResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn load_json(path: &Path) -> CellDivResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn save_yaml(&self, path: &Path) -> CellDivResult<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Load configuration from YAML file
    pub fn load_yaml(path: &Path) -> CellDivResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&yaml)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DivConfig {
        DivConfig::new(0.1, DVec3::ZERO, DVec3::new(2.0, 1.0, 0.52))
    }

    #[test]
    fn test_derived_sizes() {
        let mut cfg = config();
        assert_eq!(cfg.stencil_radius(), 1);
        assert_eq!(cfg.domain_cells(), UVec3::new(20, 10, 6));
        cfg.cell_mode = CellMode::Half;
        assert_eq!(cfg.stencil_radius(), 2);
        assert!((cfg.cell_size() - 0.05).abs() < 1e-12);
        assert_eq!(cfg.domain_cells(), UVec3::new(40, 20, 11));
        // Encoding cells follow the kernel size, not the division cell
        assert_eq!(cfg.pos_cells(), UVec3::new(20, 10, 6));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_invalid_configs() {
        let mut cfg = config();
        cfg.kernel_size = 0.0;
        assert!(matches!(cfg.validate(), Err(CellDivError::InvalidConfig(_))));

        let mut cfg = config();
        cfg.domain_max.y = -1.0;
        assert!(cfg.validate().is_err());

        // 20 km domain does not fit the position encoding at 0.1 m
        let cfg = DivConfig::new(0.1, DVec3::ZERO, DVec3::new(20_000.0, 1.0, 1.0));
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.pos_cell_size = Some(-1.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_corners_serialize_as_maps() {
        let json = serde_json::to_value(config()).unwrap();
        assert_eq!(json["domain_max"], serde_json::json!({"x": 2.0, "y": 1.0, "z": 0.52}));
        let back: DivConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config());
    }

    #[test]
    fn test_geometry() {
        let geom = config().geometry().unwrap();
        assert_eq!(geom.stencil_radius, 1);
        assert_eq!(geom.cell_coder.bits(), [5, 4, 3]);
        assert!((geom.kernel_size2 - 0.01).abs() < 1e-8);
    }
}
