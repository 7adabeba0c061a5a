//! Analyzed entities (points or shapes submitted for classification).

use serde::{Deserialize, Serialize};

use crate::crs::{CanonicalGeometry, GeometryKind};

/// Input representation an entity was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Degrees/minutes/seconds string
    Dms,
    /// Decimal latitude/longitude pair
    DecimalDegrees,
    /// Geocoded free-text address
    Address,
    /// One row of a tabular batch
    CsvRow,
    /// One feature of an uploaded polygon bundle
    ShapefileFeature,
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFormat::Dms => write!(f, "dms"),
            SourceFormat::DecimalDegrees => write!(f, "decimal_degrees"),
            SourceFormat::Address => write!(f, "address"),
            SourceFormat::CsvRow => write!(f, "csv_row"),
            SourceFormat::ShapefileFeature => write!(f, "shapefile_feature"),
        }
    }
}

/// A named geometry in EPSG:4674. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    name: String,
    geometry: CanonicalGeometry,
    source_format: SourceFormat,
}

impl Entity {
    pub fn new(
        name: impl Into<String>,
        geometry: CanonicalGeometry,
        source_format: SourceFormat,
    ) -> Self {
        Self {
            name: name.into(),
            geometry,
            source_format,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &CanonicalGeometry {
        &self.geometry
    }

    pub fn source_format(&self) -> SourceFormat {
        self.source_format
    }

    pub fn kind(&self) -> GeometryKind {
        self.geometry.kind()
    }
}

/// Name given to the n-th (0-based) feature of a bundle or unnamed row
pub fn generated_name(index: usize) -> String {
    format!("Entrada {}", index + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::{canonical_point, SourceCrs};

    #[test]
    fn test_generated_name_is_one_based() {
        assert_eq!(generated_name(0), "Entrada 1");
        assert_eq!(generated_name(9), "Entrada 10");
    }

    #[test]
    fn test_entity_accessors() {
        let geometry = canonical_point(-22.9, -43.2, SourceCrs::Sirgas2000).unwrap();
        let entity = Entity::new("Local A", geometry, SourceFormat::DecimalDegrees);
        assert_eq!(entity.name(), "Local A");
        assert_eq!(entity.kind(), GeometryKind::Point);
        assert_eq!(entity.geometry().epsg(), 4674);
        assert_eq!(entity.source_format().to_string(), "decimal_degrees");
    }
}
