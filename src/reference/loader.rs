//! Reference layer extraction from shapefiles.

use std::path::Path;

use geo::MultiPolygon;
use shapefile::dbase::Record;
use tracing::{info, warn};

use crate::config::ReferenceConfig;
use crate::crs::{canonicalize, SourceCrs};
use crate::error::ReferenceLoadError;
use crate::models::{SettlementFeature, TypologyFeature};
use crate::shapes::{field_text, read_projection, read_shapes, to_multipolygon};

pub const TYPOLOGY_LAYER: &str = "typology";
pub const SETTLEMENT_LAYER: &str = "settlement";

/// Load the intra-urban typology polygons.
pub fn load_typology(config: &ReferenceConfig) -> Result<Vec<TypologyFeature>, ReferenceLoadError> {
    let rows = load_layer(
        TYPOLOGY_LAYER,
        &config.typology_path,
        &[&config.municipality_field, &config.typology_field],
    )?;

    let features: Vec<TypologyFeature> = rows
        .into_iter()
        .map(|(geometry, record)| TypologyFeature {
            municipality_name: field_text(&record, &config.municipality_field),
            typology_code: field_text(&record, &config.typology_field),
            geometry,
        })
        .collect();

    warn_on_unusual_codes(&features);
    Ok(features)
}

/// Load the settlement (FCU) polygons.
pub fn load_settlements(
    config: &ReferenceConfig,
) -> Result<Vec<SettlementFeature>, ReferenceLoadError> {
    let rows = load_layer(
        SETTLEMENT_LAYER,
        &config.settlement_path,
        &[&config.settlement_field],
    )?;

    Ok(rows
        .into_iter()
        .map(|(geometry, record)| SettlementFeature {
            settlement_name: field_text(&record, &config.settlement_field),
            geometry,
        })
        .collect())
}

/// Read a polygon layer, canonicalize it and check its attribute fields.
fn load_layer(
    layer: &'static str,
    path: &Path,
    required_fields: &[&str],
) -> Result<Vec<(MultiPolygon<f64>, Record)>, ReferenceLoadError> {
    if !path.exists() {
        return Err(ReferenceLoadError::Missing {
            layer,
            path: path.to_path_buf(),
        });
    }

    let malformed = |reason: String| ReferenceLoadError::Malformed {
        layer,
        path: path.to_path_buf(),
        reason,
    };

    let crs = match read_projection(path).map_err(|e| malformed(format!("{:#}", e)))? {
        Some(wkt) => {
            SourceCrs::from_wkt(&wkt).map_err(|source| ReferenceLoadError::Crs { layer, source })?
        }
        None => {
            warn!(
                "No .prj next to {}, assuming EPSG:4674",
                path.display()
            );
            SourceCrs::Sirgas2000
        }
    };

    let shapes = read_shapes(path).map_err(|e| malformed(format!("{:#}", e)))?;

    if let Some(first) = shapes.first() {
        for field in required_fields {
            if first.record.get(field).is_none() {
                return Err(malformed(format!("missing attribute field {:?}", field)));
            }
        }
    }

    let mut rows = Vec::with_capacity(shapes.len());
    for shape in shapes {
        let geometry = canonicalize(shape.geometry, crs)
            .map_err(|e| malformed(format!("feature {}: {}", shape.index + 1, e)))?;
        let polygon = to_multipolygon(geometry.into_geometry())
            .ok_or_else(|| malformed(format!("feature {} is not a polygon", shape.index + 1)))?;
        rows.push((polygon, shape.record));
    }

    if rows.is_empty() {
        warn!("Reference layer {} at {} has no features", layer, path.display());
    }
    info!(
        "Loaded {} {} features from {} ({})",
        rows.len(),
        layer,
        path.display(),
        crs
    );

    Ok(rows)
}

/// The GaK rule compares codes as strings, which only matches the intended
/// ordering for single upper-case letters.
fn warn_on_unusual_codes(features: &[TypologyFeature]) {
    let mut unusual: Vec<&str> = features
        .iter()
        .filter_map(|f| f.typology_code.as_deref())
        .filter(|code| !is_single_letter(code))
        .collect();
    unusual.sort_unstable();
    unusual.dedup();

    if !unusual.is_empty() {
        warn!(
            "Typology codes compared lexicographically against \"F\" are not single letters: {}",
            unusual.join(", ")
        );
    }
}

fn is_single_letter(code: &str) -> bool {
    let mut chars = code.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_uppercase())
}
