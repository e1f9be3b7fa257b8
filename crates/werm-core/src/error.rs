//! Error types for terminal construction and snapshot restore.

use std::fmt;

/// Rejected terminal dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionError {
    /// Both dimensions must be at least 1.
    InvalidDimension { cols: u16, rows: u16 },
}

impl fmt::Display for DimensionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDimension { cols, rows } => {
                write!(f, "invalid terminal dimensions {cols}x{rows}")
            }
        }
    }
}

impl std::error::Error for DimensionError {}

/// Failure to restore a terminal from a serialized snapshot.
#[derive(Debug)]
pub enum SnapshotError {
    /// The payload is not valid snapshot JSON.
    Json(serde_json::Error),
    /// The payload was written by an incompatible schema.
    UnsupportedVersion { found: u32, expected: u32 },
    /// The payload's rows, columns or cursor disagree with each other.
    Dimensions(String),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(e) => write!(f, "snapshot decode error: {e}"),
            Self::UnsupportedVersion { found, expected } => {
                write!(f, "unsupported snapshot version {found} (expected {expected})")
            }
            Self::Dimensions(msg) => write!(f, "inconsistent snapshot dimensions: {msg}"),
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<DimensionError> for SnapshotError {
    fn from(e: DimensionError) -> Self {
        Self::Dimensions(e.to_string())
    }
}
