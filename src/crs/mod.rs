//! Coordinate reference system handling.
//!
//! All geometries in the model are expressed in SIRGAS 2000 geographic
//! coordinates (EPSG:4674). [`canonicalize`] is the only way to build a
//! [`CanonicalGeometry`], so no input path can skip the conversion.

mod utm;

use std::fmt;
use std::sync::LazyLock;

use geo::{BoundingRect, Coord, Geometry, MapCoords, Point, Rect};
use regex::Regex;
use serde::Serialize;

use crate::error::InputError;

pub use utm::utm_to_geographic;

/// EPSG code of the canonical CRS (SIRGAS 2000)
pub const CANONICAL_EPSG: u32 = 4674;

/// CRS a geometry is expressed in before canonicalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCrs {
    /// SIRGAS 2000 geographic (EPSG:4674)
    Sirgas2000,
    /// WGS 84 geographic (EPSG:4326), treated as coincident with SIRGAS 2000
    Wgs84,
    /// Transverse Mercator zone on SIRGAS 2000 or WGS 84
    Utm { zone: u8, south: bool },
}

impl SourceCrs {
    /// EPSG code for logging
    pub fn epsg(&self) -> u32 {
        match self {
            SourceCrs::Sirgas2000 => 4674,
            SourceCrs::Wgs84 => 4326,
            // SIRGAS 2000 / UTM zone 17N..22N are 31971..31976, 17S..25S are 31977..31985
            SourceCrs::Utm { zone, south: true } => 31960 + *zone as u32,
            SourceCrs::Utm { zone, south: false } => 31954 + *zone as u32,
        }
    }

    /// Detect the CRS described by a shapefile `.prj` (ESRI WKT).
    pub fn from_wkt(wkt: &str) -> Result<Self, InputError> {
        static UTM_ZONE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(?i)UTM[ _]zone[ _](\d{1,2})\s*([NS])").expect("valid regex")
        });

        let trimmed = wkt.trim();
        let upper = trimmed.to_ascii_uppercase();
        let known_datum = upper.contains("SIRGAS") || upper.contains("WGS");

        if upper.starts_with("PROJCS") {
            let captures = UTM_ZONE
                .captures(trimmed)
                .filter(|_| known_datum)
                .ok_or_else(|| InputError::UnsupportedCrs(summarize_wkt(trimmed)))?;
            let zone: u8 = captures[1]
                .parse()
                .map_err(|_| InputError::UnsupportedCrs(summarize_wkt(trimmed)))?;
            if !(1..=60).contains(&zone) {
                return Err(InputError::UnsupportedCrs(summarize_wkt(trimmed)));
            }
            let south = captures[2].eq_ignore_ascii_case("S");
            return Ok(SourceCrs::Utm { zone, south });
        }

        if upper.starts_with("GEOGCS") {
            if upper.contains("SIRGAS") {
                return Ok(SourceCrs::Sirgas2000);
            }
            if upper.contains("WGS") {
                return Ok(SourceCrs::Wgs84);
            }
        }

        Err(InputError::UnsupportedCrs(summarize_wkt(trimmed)))
    }

    fn to_canonical(self, coord: Coord<f64>) -> Coord<f64> {
        match self {
            SourceCrs::Sirgas2000 | SourceCrs::Wgs84 => coord,
            SourceCrs::Utm { zone, south } => {
                let (x, y) = utm_to_geographic(coord.x, coord.y, zone, south);
                Coord { x, y }
            }
        }
    }
}

impl fmt::Display for SourceCrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// Name of the first WKT node, used in error messages.
fn summarize_wkt(wkt: &str) -> String {
    let head: String = wkt.chars().take_while(|c| *c != ',').take(80).collect();
    if head.is_empty() {
        "empty projection file".to_string()
    } else {
        head
    }
}

/// Kind of geometry an entity may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryKind {
    Point,
    Polygon,
}

/// A point, polygon or multipolygon expressed in EPSG:4674.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalGeometry {
    geometry: Geometry<f64>,
}

impl CanonicalGeometry {
    pub fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    pub fn into_geometry(self) -> Geometry<f64> {
        self.geometry
    }

    pub fn kind(&self) -> GeometryKind {
        match self.geometry {
            Geometry::Point(_) => GeometryKind::Point,
            _ => GeometryKind::Polygon,
        }
    }

    /// The point, when this is a point geometry
    pub fn as_point(&self) -> Option<Point<f64>> {
        match self.geometry {
            Geometry::Point(p) => Some(p),
            _ => None,
        }
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }

    pub fn epsg(&self) -> u32 {
        CANONICAL_EPSG
    }
}

/// Convert a geometry from `source` into the canonical CRS.
///
/// Accepts points, polygons and multipolygons; every resulting coordinate
/// must be a valid latitude/longitude.
pub fn canonicalize(
    geometry: Geometry<f64>,
    source: SourceCrs,
) -> Result<CanonicalGeometry, InputError> {
    match geometry {
        Geometry::Point(_) | Geometry::Polygon(_) | Geometry::MultiPolygon(_) => {}
        other => {
            return Err(InputError::UnsupportedGeometry(
                geometry_type_name(&other).to_string(),
            ))
        }
    }

    let geometry = geometry.map_coords(|c| source.to_canonical(c));

    if let Some(rect) = geometry.bounding_rect() {
        for corner in [rect.min(), rect.max()] {
            check_range(corner.y, corner.x)?;
        }
    }

    Ok(CanonicalGeometry { geometry })
}

/// Build a canonical point from latitude/longitude in decimal degrees.
pub fn canonical_point(
    lat: f64,
    lon: f64,
    source: SourceCrs,
) -> Result<CanonicalGeometry, InputError> {
    check_range(lat, lon)?;
    canonicalize(Geometry::Point(Point::new(lon, lat)), source)
}

fn check_range(lat: f64, lon: f64) -> Result<(), InputError> {
    let valid = lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon);
    if !valid {
        return Err(InputError::Range { lat, lon });
    }
    Ok(())
}

fn geometry_type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
