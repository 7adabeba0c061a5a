use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::classifier::TieBreak;
use crate::report::Locale;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub reference: ReferenceConfig,
    pub geocoder: GeocoderConfig,
    pub classification: ClassificationConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReferenceConfig {
    pub typology_path: PathBuf,
    pub settlement_path: PathBuf,
    /// Municipality name attribute of the typology layer
    pub municipality_field: String,
    /// Typology code attribute of the typology layer
    pub typology_field: String,
    /// Settlement name attribute of the settlement layer
    pub settlement_field: String,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            typology_path: PathBuf::from("Tipologia Intraurbana/TipologiaIntraUrbana.shp"),
            settlement_path: PathBuf::from(
                "Favelas e Comunidades Urbanas/poligonos_FCUs_shp/qg_2022_670_fcu_agreg.shp",
            ),
            municipality_field: "NM_MUNICIP".to_string(),
            typology_field: "TipologiaI".to_string(),
            settlement_field: "nm_fcu".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeocoderConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Candidates scoring below this are ignored
    pub min_score: f64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: crate::geocode::ARCGIS_ENDPOINT.to_string(),
            timeout_secs: 10,
            min_score: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ClassificationConfig {
    pub tie_break: TieBreak,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub locale: Locale,
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }
}
