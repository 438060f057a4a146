use std::path::PathBuf;

use thiserror::Error;

/// Placeholder used in diagnostics when an element carries no `gml:id`.
pub const UNKNOWN_ID: &str = "unknown";

/// A ring or polygon failed structural validity and was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("degenerate LinearRing gml:id=\"{id}\": {reason}")]
    DegenerateRing { id: String, reason: String },

    #[error("degenerate Polygon gml:id=\"{id}\": no valid rings")]
    DegeneratePolygon { id: String },
}

impl GeometryError {
    pub(crate) fn ring(id: Option<&str>, reason: impl Into<String>) -> Self {
        Self::DegenerateRing { id: id.unwrap_or(UNKNOWN_ID).to_string(), reason: reason.into() }
    }

    pub(crate) fn polygon(id: Option<&str>) -> Self {
        Self::DegeneratePolygon { id: id.unwrap_or(UNKNOWN_ID).to_string() }
    }

    /// Identifier of the offending element, `"unknown"` if it had none.
    pub fn element_id(&self) -> &str {
        match self {
            Self::DegenerateRing { id, .. } | Self::DegeneratePolygon { id } => id,
        }
    }
}

/// The ground union failed, including the split-and-retry fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FootprintError {
    #[error("footprint union of {polygons} polygons failed: {reason}")]
    ComputationFailed { polygons: usize, reason: String },
}

/// Raised by a union engine when the overlay cannot be computed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("topology fault: {0}")]
pub struct TopologyError(pub String);

/// Errors reported by a persistence collaborator. Surfaced unchanged to the caller.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error in store: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize import ledger: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("store rejected write: {0}")]
    Backend(String),
}

/// Failure that terminates the processing of one file (and only that file).
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("XML error in {file}: {source}")]
    MalformedDocument { file: String, source: roxmltree::Error },

    #[error("building {building} in {file}: {source}")]
    Footprint { file: String, building: String, source: FootprintError },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
