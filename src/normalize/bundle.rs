//! Polygon bundles: a shapefile and its companion files, uploaded together.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::crs::{canonicalize, SourceCrs};
use crate::error::InputError;
use crate::models::entity::generated_name;
use crate::models::{Entity, SourceFormat};
use crate::shapes::read_shapes_from;

/// Companion files every bundle must carry
pub const MANDATORY_EXTENSIONS: [&str; 4] = ["shp", "shx", "dbf", "prj"];

/// How a bundle is handed to the normalizer
#[derive(Debug, Clone)]
pub enum BundleSource {
    /// Directory holding the files, e.g. an extracted archive
    Directory(PathBuf),
    /// Explicit list of files
    Files(Vec<PathBuf>),
}

impl BundleSource {
    pub fn label(&self) -> String {
        match self {
            BundleSource::Directory(dir) => dir.display().to_string(),
            BundleSource::Files(files) => files
                .first()
                .and_then(|f| f.file_stem())
                .and_then(|s| s.to_str())
                .unwrap_or("bundle")
                .to_string(),
        }
    }
}

/// A set of files sharing one base name
#[derive(Debug, Clone)]
pub struct PolygonBundle {
    base_name: String,
    /// Lower-cased extension -> file
    files: BTreeMap<String, PathBuf>,
}

impl PolygonBundle {
    /// Group `files` by base name; exactly one `.shp` base name is expected.
    pub fn from_files(files: Vec<PathBuf>) -> Result<Self, InputError> {
        let mut shp_stems: Vec<String> = files
            .iter()
            .filter(|f| extension_of(f).as_deref() == Some("shp"))
            .filter_map(|f| stem_of(f))
            .collect();
        shp_stems.sort();
        shp_stems.dedup();

        let base_name = match shp_stems.as_slice() {
            [single] => single.clone(),
            [] => most_common_stem(&files).unwrap_or_else(|| "bundle".to_string()),
            several => {
                return Err(InputError::bundle_read(
                    several.join(", "),
                    format!("expected one feature set, found {}", several.len()),
                ))
            }
        };

        let files = files
            .into_iter()
            .filter(|f| stem_of(f).as_deref() == Some(base_name.as_str()))
            .filter_map(|f| extension_of(&f).map(|ext| (ext, f)))
            .collect();

        Ok(Self { base_name, files })
    }

    /// Collect the files under `dir` (nested folders included).
    pub fn discover(dir: &Path) -> Result<Self, InputError> {
        let label = dir.display().to_string();
        if !dir.is_dir() {
            return Err(InputError::bundle_read(label, "not a directory"));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true).max_depth(4) {
            let entry = entry.map_err(|e| InputError::bundle_read(&label, e))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        debug!("Found {} files under {}", files.len(), label);

        Self::from_files(files)
    }

    pub fn from_source(source: &BundleSource) -> Result<Self, InputError> {
        match source {
            BundleSource::Directory(dir) => Self::discover(dir),
            BundleSource::Files(files) => Self::from_files(files.clone()),
        }
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Mandatory companions that are absent, as `{base}.{ext}`
    pub fn missing_files(&self) -> Vec<String> {
        MANDATORY_EXTENSIONS
            .iter()
            .filter(|ext| !self.files.contains_key(**ext))
            .map(|ext| format!("{}.{}", self.base_name, ext))
            .collect()
    }

    /// Fail with `IncompleteBundle` unless every mandatory file is present.
    pub fn validate(&self) -> Result<(), InputError> {
        let missing = self.missing_files();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(InputError::IncompleteBundle {
                base_name: self.base_name.clone(),
                missing,
            })
        }
    }

    fn file(&self, extension: &str) -> Result<&Path, InputError> {
        self.files.get(extension).map(PathBuf::as_path).ok_or_else(|| {
            InputError::IncompleteBundle {
                base_name: self.base_name.clone(),
                missing: vec![format!("{}.{}", self.base_name, extension)],
            }
        })
    }

    /// Validate, then turn every feature into an entity named `Entrada {n}`.
    ///
    /// Any failure rejects the whole bundle; no partial entity set is returned.
    pub fn load(&self) -> Result<Vec<Entity>, InputError> {
        self.validate()?;

        let wkt = std::fs::read_to_string(self.file("prj")?)
            .map_err(|e| InputError::bundle_read(&self.base_name, e))?;
        let crs = SourceCrs::from_wkt(&wkt)?;

        // Resolved paths; extensions may be upper-case
        let shapes = read_shapes_from(self.file("shp")?, self.file("shx")?, self.file("dbf")?)
            .map_err(|e| InputError::bundle_read(&self.base_name, format!("{:#}", e)))?;

        let entities = shapes
            .into_iter()
            .map(|shape| {
                let geometry = canonicalize(shape.geometry, crs)?;
                Ok(Entity::new(
                    generated_name(shape.index),
                    geometry,
                    SourceFormat::ShapefileFeature,
                ))
            })
            .collect::<Result<Vec<_>, InputError>>()?;

        if entities.is_empty() {
            return Err(InputError::bundle_read(&self.base_name, "no features"));
        }

        info!(
            "Loaded {} features from bundle {} ({})",
            entities.len(),
            self.base_name,
            crs
        );
        Ok(entities)
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn stem_of(path: &Path) -> Option<String> {
    path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
}

fn most_common_stem(files: &[PathBuf]) -> Option<String> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for stem in files.iter().filter_map(|f| stem_of(f)) {
        *counts.entry(stem).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(stem, _)| stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::GeometryKind;
    use crate::shapes::fixtures::{write_squares, Square};
    use geo::BoundingRect;
    use std::fs;

    const SIRGAS_PRJ: &str = r#"GEOGCS["GCS_SIRGAS_2000",DATUM["D_SIRGAS_2000",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
    const UTM_23S_PRJ: &str = r#"PROJCS["SIRGAS_2000_UTM_Zone_23S",GEOGCS["GCS_SIRGAS_2000",DATUM["D_SIRGAS_2000",SPHEROID["GRS_1980",6378137.0,298.257222101]]],PROJECTION["Transverse_Mercator"]]"#;

    fn write_lotes(dir: &Path, base: &str, squares: &[Square], prj: &str) {
        write_squares(&dir.join(format!("{}.shp", base)), &["LOTE"], squares);
        fs::write(dir.join(format!("{}.prj", base)), prj).unwrap();
    }

    fn square(bounds: [f64; 4], lote: &str) -> Square<'_> {
        Square {
            bounds,
            values: vec![lote],
        }
    }

    fn touch_all(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), b"").unwrap();
        }
    }

    #[test]
    fn test_missing_prj_is_named() {
        let dir = tempfile::tempdir().unwrap();
        touch_all(dir.path(), &["lotes.shp", "lotes.shx", "lotes.dbf", "lotes.cpg"]);

        let bundle = PolygonBundle::discover(dir.path()).unwrap();
        assert_eq!(bundle.base_name(), "lotes");

        match bundle.load() {
            Err(InputError::IncompleteBundle { base_name, missing }) => {
                assert_eq!(base_name, "lotes");
                assert_eq!(missing, vec!["lotes.prj".to_string()]);
            }
            other => panic!("expected IncompleteBundle, got {:?}", other.map(|e| e.len())),
        }
    }

    #[test]
    fn test_extension_case_and_nesting() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("areas");
        fs::create_dir(&nested).unwrap();
        touch_all(&nested, &["areas.SHP", "areas.SHX", "areas.DBF", "areas.PRJ"]);

        let bundle = PolygonBundle::discover(dir.path()).unwrap();
        assert!(bundle.validate().is_ok());
    }

    #[test]
    fn test_no_shp_uses_common_stem() {
        let bundle = PolygonBundle::from_files(vec![
            PathBuf::from("x/areas.dbf"),
            PathBuf::from("x/areas.prj"),
        ])
        .unwrap();
        assert_eq!(bundle.base_name(), "areas");
        assert_eq!(
            bundle.missing_files(),
            vec!["areas.shp".to_string(), "areas.shx".to_string()]
        );
    }

    #[test]
    fn test_two_feature_sets_rejected() {
        let result = PolygonBundle::from_files(vec![
            PathBuf::from("a.shp"),
            PathBuf::from("b.shp"),
        ]);
        assert!(matches!(result, Err(InputError::BundleRead { .. })));
    }

    #[test]
    fn test_unknown_projection_rejects_bundle() {
        let dir = tempfile::tempdir().unwrap();
        touch_all(dir.path(), &["lotes.shp", "lotes.shx", "lotes.dbf"]);
        fs::write(
            dir.path().join("lotes.prj"),
            r#"PROJCS["RGF93_Lambert_93",GEOGCS["GCS_RGF_1993"]]"#,
        )
        .unwrap();

        let bundle = PolygonBundle::discover(dir.path()).unwrap();
        assert!(matches!(bundle.load(), Err(InputError::UnsupportedCrs(_))));
    }

    #[test]
    fn test_features_become_numbered_entities() {
        let dir = tempfile::tempdir().unwrap();
        write_lotes(
            dir.path(),
            "lotes",
            &[
                square([-43.30, -22.95, -43.28, -22.93], "12"),
                square([-43.10, -22.90, -43.08, -22.88], "13"),
            ],
            SIRGAS_PRJ,
        );

        let entities = PolygonBundle::discover(dir.path()).unwrap().load().unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].name(), "Entrada 1");
        assert_eq!(entities[1].name(), "Entrada 2");
        assert_eq!(entities[0].kind(), GeometryKind::Polygon);
        assert_eq!(entities[0].source_format(), SourceFormat::ShapefileFeature);
        assert_eq!(entities[0].geometry().epsg(), 4674);

        let rect = entities[1].geometry().bounding_rect().unwrap();
        assert!((rect.min().x - (-43.10)).abs() < 1e-9);
        assert!((rect.max().y - (-22.88)).abs() < 1e-9);
    }

    #[test]
    fn test_upper_case_extensions_load() {
        let dir = tempfile::tempdir().unwrap();
        write_lotes(
            dir.path(),
            "AREAS",
            &[square([-43.30, -22.95, -43.28, -22.93], "1")],
            SIRGAS_PRJ,
        );
        for ext in ["shp", "shx", "dbf", "prj"] {
            fs::rename(
                dir.path().join(format!("AREAS.{}", ext)),
                dir.path().join(format!("AREAS.{}", ext.to_ascii_uppercase())),
            )
            .unwrap();
        }

        let entities = PolygonBundle::discover(dir.path()).unwrap().load().unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].name(), "Entrada 1");
    }

    #[test]
    fn test_utm_bundle_is_reprojected() {
        let dir = tempfile::tempdir().unwrap();
        write_lotes(
            dir.path(),
            "lotes",
            &[square([687900.0, 7465900.0, 688100.0, 7466100.0], "7")],
            UTM_23S_PRJ,
        );

        let entities = PolygonBundle::discover(dir.path()).unwrap().load().unwrap();
        let rect = entities[0].geometry().geometry().bounding_rect().unwrap();
        let center = rect.center();
        assert!((center.x - (-43.17)).abs() < 0.05, "lon={}", center.x);
        assert!((center.y - (-22.90)).abs() < 0.05, "lat={}", center.y);
        assert!(rect.width() < 0.01);
    }
}
