//! Error types for input normalization and reference loading.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Errors attached to a single entity, row or bundle.
///
/// None of these abort sibling inputs in the same run.
#[derive(Debug, Error)]
pub enum InputError {
    /// Malformed DMS or coordinate string
    #[error("invalid coordinates {input:?}: {reason}")]
    Parse { input: String, reason: String },

    /// Latitude/longitude outside [-90,90] / [-180,180]
    #[error("coordinates out of range: latitude {lat}, longitude {lon}")]
    Range { lat: f64, lon: f64 },

    /// Address could not be resolved to a coordinate
    #[error("could not geocode address {address:?}: {reason}")]
    Geocode { address: String, reason: String },

    /// One malformed row of a tabular batch
    #[error("row {row}: {reason}")]
    RowParse { row: usize, reason: String },

    /// Polygon bundle without all mandatory companion files
    #[error("bundle {base_name} is missing {}", missing.join(", "))]
    IncompleteBundle {
        base_name: String,
        missing: Vec<String>,
    },

    /// Polygon bundle present but unreadable
    #[error("could not read bundle {base_name}: {reason}")]
    BundleRead { base_name: String, reason: String },

    /// Projection that cannot be converted to EPSG:4674
    #[error("unsupported coordinate reference system: {0}")]
    UnsupportedCrs(String),

    /// Geometry type other than point, polygon or multipolygon
    #[error("unsupported geometry type: {0}")]
    UnsupportedGeometry(String),

    /// Tabular source that could not be opened or decoded
    #[error("could not read input: {0}")]
    Unreadable(String),
}

impl InputError {
    pub fn parse(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn row(row: usize, reason: impl Into<String>) -> Self {
        Self::RowParse {
            row,
            reason: reason.into(),
        }
    }

    pub fn bundle_read(base_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::BundleRead {
            base_name: base_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            InputError::Parse { .. } => "parse_error",
            InputError::Range { .. } => "range_error",
            InputError::Geocode { .. } => "geocode_error",
            InputError::RowParse { .. } => "row_parse_error",
            InputError::IncompleteBundle { .. } => "incomplete_bundle_error",
            InputError::BundleRead { .. } => "bundle_read_error",
            InputError::UnsupportedCrs(_) => "unsupported_crs",
            InputError::UnsupportedGeometry(_) => "unsupported_geometry",
            InputError::Unreadable(_) => "unreadable_input",
        }
    }
}

/// An input that failed normalization, with the entity/file it belongs to.
#[derive(Debug)]
pub struct InputFailure {
    /// Entity name, CSV source or bundle base name
    pub subject: String,
    pub error: InputError,
}

impl InputFailure {
    pub fn new(subject: impl Into<String>, error: InputError) -> Self {
        Self {
            subject: subject.into(),
            error,
        }
    }

    pub fn to_report(&self) -> FailureReport {
        FailureReport {
            subject: self.subject.clone(),
            kind: self.error.kind(),
            message: self.error.to_string(),
        }
    }
}

/// Serializable view of an [`InputFailure`]
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub subject: String,
    pub kind: &'static str,
    pub message: String,
}

/// Fatal error while loading a reference layer at startup
#[derive(Debug, Error)]
pub enum ReferenceLoadError {
    #[error("reference layer {layer} not found at {}", path.display())]
    Missing { layer: &'static str, path: PathBuf },

    #[error("reference layer {layer} at {} is malformed: {reason}", path.display())]
    Malformed {
        layer: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("reference layer {layer} uses an unsupported projection: {source}")]
    Crs {
        layer: &'static str,
        #[source]
        source: InputError,
    },
}
