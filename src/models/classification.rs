//! Per-entity classification output.

use serde::Serialize;

use super::FeatureId;

/// Code compared against for the GaK flag
pub const GAK_THRESHOLD: &str = "F";

/// Classification of one entity against both reference layers.
///
/// Absent matches are data: `None` attributes and `false` flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub entity_name: String,
    pub municipality_name: Option<String>,
    pub typology_code: Option<String>,
    pub gak_flag: bool,
    pub settlement_name: Option<String>,
    /// Set exactly when `settlement_name` is
    pub fcu_flag: bool,

    /// Matched typology feature, for drawing
    #[serde(skip)]
    pub typology_feature: Option<FeatureId>,

    /// Intersected settlement feature, for drawing; may be unnamed
    #[serde(skip)]
    pub settlement_feature: Option<FeatureId>,
}

/// True iff the code compares lexicographically greater than `"F"`.
pub fn is_gak(typology_code: Option<&str>) -> bool {
    typology_code.is_some_and(|code| code > GAK_THRESHOLD)
}
