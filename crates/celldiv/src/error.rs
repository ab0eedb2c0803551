//! Error type shared by every division stage.

use std::fmt;

use glam::{DVec3, UVec3};
use thiserror::Error;

/// Pipeline stage that produced an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    CellAssign,
    BoundsScan,
    Sort,
    BeginEnd,
    Reorder,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::CellAssign => "cell assign",
            Stage::BoundsScan => "bounds scan",
            Stage::Sort => "sort",
            Stage::BeginEnd => "begin/end table",
            Stage::Reorder => "reorder",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum CellDivError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("{stage}: cell {cell} does not fit the cell code capacity {capacity}")]
    CellCodeOverflow {
        stage: Stage,
        cell: UVec3,
        capacity: UVec3,
    },

    #[error("{stage}: particle {index} at {pos} lies outside the domain [{min}, {max}]")]
    PositionOutOfDomain {
        stage: Stage,
        index: usize,
        pos: DVec3,
        min: DVec3,
        max: DVec3,
    },

    #[error("{stage}: scratch buffer holds {available} elements, {required} required")]
    ScratchTooSmall {
        stage: Stage,
        required: usize,
        available: usize,
    },

    #[error("{stage}: {what} has length {actual}, expected {expected}")]
    LengthMismatch {
        stage: Stage,
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{stage}: verification failed: {detail}")]
    Verification { stage: Stage, detail: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),
}

pub type CellDivResult<T> = Result<T, CellDivError>;

impl From<serde_json::Error> for CellDivError {
    fn from(err: serde_json::Error) -> Self {
        CellDivError::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for CellDivError {
    fn from(err: serde_yaml::Error) -> Self {
        CellDivError::Parse(err.to_string())
    }
}

/// Fails with `LengthMismatch` unless `actual >= expected`.
pub(crate) fn ensure_len(
    stage: Stage,
    what: &'static str,
    expected: usize,
    actual: usize,
) -> CellDivResult<()> {
    if actual < expected {
        return Err(CellDivError::LengthMismatch {
            stage,
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names_stage_and_sizes() {
        let err = CellDivError::ScratchTooSmall {
            stage: Stage::BoundsScan,
            required: 1542,
            available: 12,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("bounds scan"), "got {}", msg);
        assert!(msg.contains("1542") && msg.contains("12"), "got {}", msg);
    }

    #[test]
    fn test_every_stage_has_a_name() {
        let names: Vec<String> = [
            Stage::CellAssign,
            Stage::BoundsScan,
            Stage::Sort,
            Stage::BeginEnd,
            Stage::Reorder,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(names, ["cell assign", "bounds scan", "sort", "begin/end table", "reorder"]);
    }

    #[test]
    fn test_ensure_len() {
        assert!(ensure_len(Stage::Reorder, "dst", 4, 4).is_ok());
        assert!(ensure_len(Stage::Reorder, "dst", 4, 9).is_ok());
        let err = ensure_len(Stage::Reorder, "dst", 4, 3).unwrap_err();
        assert!(matches!(
            err,
            CellDivError::LengthMismatch { expected: 4, actual: 3, .. }
        ));
    }
}
