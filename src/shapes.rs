//! Shapefile reading shared by uploaded bundles and reference layers.

use std::fs::{self, File};
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use geo::{Geometry, MultiPolygon};
use shapefile::dbase::{FieldValue, Record};
use shapefile::{Shape, ShapeReader};
use tracing::debug;

/// One feature of a shapefile, geometry still in the file's CRS
pub struct ShapeRecord {
    /// Position of the feature in the file
    pub index: usize,
    pub geometry: Geometry<f64>,
    pub record: Record,
}

/// Read every non-null feature of a `.shp` file with its `.dbf` attributes.
///
/// Companions are looked up next to `shp_path` with lower-case extensions.
pub fn read_shapes(shp_path: &Path) -> Result<Vec<ShapeRecord>> {
    let reader = shapefile::Reader::from_path(shp_path)
        .with_context(|| format!("Failed to open {}", shp_path.display()))?;
    collect_features(reader, shp_path)
}

/// Same as [`read_shapes`] with every companion given explicitly.
pub fn read_shapes_from(
    shp_path: &Path,
    shx_path: &Path,
    dbf_path: &Path,
) -> Result<Vec<ShapeRecord>> {
    let shp = File::open(shp_path)
        .with_context(|| format!("Failed to open {}", shp_path.display()))?;
    let shx = File::open(shx_path)
        .with_context(|| format!("Failed to open {}", shx_path.display()))?;
    let shape_reader = ShapeReader::with_shx(BufReader::new(shp), BufReader::new(shx))
        .with_context(|| format!("Failed to read {}", shp_path.display()))?;
    let dbase_reader = shapefile::dbase::Reader::from_path(dbf_path)
        .with_context(|| format!("Failed to read {}", dbf_path.display()))?;

    collect_features(shapefile::Reader::new(shape_reader, dbase_reader), shp_path)
}

fn collect_features<T, D>(
    mut reader: shapefile::Reader<T, D>,
    shp_path: &Path,
) -> Result<Vec<ShapeRecord>>
where
    T: Read + Seek,
    D: Read + Seek,
{
    let mut features = Vec::new();
    for (index, item) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) =
            item.with_context(|| format!("Failed to read feature {}", index + 1))?;

        if matches!(shape, Shape::NullShape) {
            debug!("Skipping null shape {} in {}", index, shp_path.display());
            continue;
        }

        let shape_type = shape.shapetype();
        // shapefile converts into geo-types directly
        let geometry = match geo_types::Geometry::<f64>::try_from(shape) {
            Ok(geometry) => geometry,
            Err(_) => anyhow::bail!(
                "feature {} has unsupported shape type {:?}",
                index + 1,
                shape_type
            ),
        };

        features.push(ShapeRecord {
            index,
            geometry: simplify_collection(geometry),
            record,
        });
    }

    Ok(features)
}

/// Contents of the `.prj` next to `shp_path`, if present
pub fn read_projection(shp_path: &Path) -> Result<Option<String>> {
    let prj = companion(shp_path, "prj");
    if !prj.exists() {
        return Ok(None);
    }
    let wkt = fs::read_to_string(&prj)
        .with_context(|| format!("Failed to read {}", prj.display()))?;
    Ok(Some(wkt))
}

/// Sibling file sharing the base name of `shp_path`
pub fn companion(shp_path: &Path, extension: &str) -> PathBuf {
    shp_path.with_extension(extension)
}

/// Attribute value as text; empty strings count as absent.
pub fn field_text(record: &Record, field: &str) -> Option<String> {
    let text = match record.get(field)? {
        FieldValue::Character(Some(s)) => s.trim().to_string(),
        FieldValue::Memo(s) => s.trim().to_string(),
        FieldValue::Numeric(Some(n)) => format_number(*n),
        FieldValue::Float(Some(n)) => format_number(*n as f64),
        FieldValue::Double(n) => format_number(*n),
        FieldValue::Integer(n) => n.to_string(),
        _ => return None,
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Polygon shapes convert to multipolygons; unwrap the single-part case.
fn simplify_collection(geometry: Geometry<f64>) -> Geometry<f64> {
    match geometry {
        Geometry::MultiPolygon(mut mp) if mp.0.len() == 1 => {
            Geometry::Polygon(mp.0.remove(0))
        }
        Geometry::MultiPoint(mut mp) if mp.0.len() == 1 => Geometry::Point(mp.0.remove(0)),
        other => other,
    }
}

/// Polygonal geometry as a multipolygon, `None` for anything else
pub fn to_multipolygon(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
        Geometry::MultiPolygon(mp) => Some(mp),
        _ => None,
    }
}
