//! Geometry normalizer.
//!
//! Turns each supported input shape into canonical [`Entity`] values in
//! EPSG:4674. Inputs are a caller-owned list; every input is normalized on
//! its own, so a failure never affects its siblings.

mod bundle;
mod dms;
mod tabular;

use tracing::{debug, warn};

use crate::crs::{canonical_point, SourceCrs};
use crate::error::{InputError, InputFailure};
use crate::geocode::Geocoder;
use crate::models::entity::generated_name;
use crate::models::{Entity, SourceFormat};

pub use bundle::{BundleSource, PolygonBundle, MANDATORY_EXTENSIONS};
pub use dms::parse_dms;
pub use tabular::{read_batch, CsvSource, TabularBatch};

/// One user-submitted input
#[derive(Debug, Clone)]
pub enum EntityInput {
    /// `DD°MM'SS.S"H DDD°MM'SS.S"H`
    Dms { name: String, coordinates: String },
    /// Decimal degrees
    Decimal { name: String, lat: f64, lon: f64 },
    /// Free-text address, resolved by the geocoder
    Address { name: String, address: String },
    /// CSV rows
    Table(TabularBatch),
    /// Shapefile bundle
    Bundle(BundleSource),
}

impl EntityInput {
    /// What failures of this input are reported against
    pub fn subject(&self) -> String {
        match self {
            EntityInput::Dms { name, .. }
            | EntityInput::Decimal { name, .. }
            | EntityInput::Address { name, .. } => display_name(name),
            EntityInput::Table(batch) => batch.source.label(),
            EntityInput::Bundle(source) => source.label(),
        }
    }
}

/// Entities and failures produced by one input, in input order
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub entities: Vec<Entity>,
    pub failures: Vec<InputFailure>,
}

impl NormalizedBatch {
    fn single(subject: String, result: Result<Entity, InputError>) -> Self {
        match result {
            Ok(entity) => Self {
                entities: vec![entity],
                failures: Vec::new(),
            },
            Err(error) => Self {
                entities: Vec::new(),
                failures: vec![InputFailure::new(subject, error)],
            },
        }
    }
}

/// Normalize one input. Only the address path touches the network.
pub async fn normalize_input<G: Geocoder>(
    input: &EntityInput,
    geocoder: &G,
) -> NormalizedBatch {
    let subject = input.subject();

    match input {
        EntityInput::Dms { name, coordinates } => {
            let result = parse_dms(coordinates)
                .and_then(|(lat, lon)| canonical_point(lat, lon, SourceCrs::Sirgas2000))
                .map(|geometry| Entity::new(display_name(name), geometry, SourceFormat::Dms));
            NormalizedBatch::single(subject, result)
        }
        EntityInput::Decimal { name, lat, lon } => {
            let result = canonical_point(*lat, *lon, SourceCrs::Sirgas2000).map(|geometry| {
                Entity::new(display_name(name), geometry, SourceFormat::DecimalDegrees)
            });
            NormalizedBatch::single(subject, result)
        }
        EntityInput::Address { name, address } => {
            let result = geocode_address(address, geocoder)
                .await
                .map(|geometry| Entity::new(display_name(name), geometry, SourceFormat::Address));
            NormalizedBatch::single(subject, result)
        }
        EntityInput::Table(batch) => read_batch(batch),
        EntityInput::Bundle(source) => {
            let bundle = match PolygonBundle::from_source(source) {
                Ok(bundle) => bundle,
                Err(error) => {
                    return NormalizedBatch::single(bundle_subject(&subject, &error), Err(error))
                }
            };
            match bundle.load() {
                Ok(entities) => NormalizedBatch {
                    entities,
                    failures: Vec::new(),
                },
                Err(error) => {
                    debug!("Bundle {} rejected: {}", bundle.base_name(), error);
                    NormalizedBatch::single(bundle.base_name().to_string(), Err(error))
                }
            }
        }
    }
}

/// Normalize each input in order; one batch per input.
pub async fn normalize_all<G: Geocoder>(
    inputs: &[EntityInput],
    geocoder: &G,
) -> Vec<NormalizedBatch> {
    let mut batches = Vec::with_capacity(inputs.len());
    for input in inputs {
        let batch = normalize_input(input, geocoder).await;
        for failure in &batch.failures {
            warn!("{}: {}", failure.subject, failure.error);
        }
        batches.push(batch);
    }
    batches
}

async fn geocode_address<G: Geocoder>(
    address: &str,
    geocoder: &G,
) -> Result<crate::crs::CanonicalGeometry, InputError> {
    let geocode_error = |reason: String| InputError::Geocode {
        address: address.to_string(),
        reason,
    };

    let point = geocoder
        .geocode(address)
        .await
        .map_err(|e| geocode_error(format!("{:#}", e)))?
        .ok_or_else(|| geocode_error("no coordinate returned".to_string()))?;

    // The geocoder answers in WGS 84
    canonical_point(point.lat, point.lon, SourceCrs::Wgs84)
}

/// Bundle failures are reported against the bundle's base name when known.
fn bundle_subject(label: &str, error: &InputError) -> String {
    match error {
        InputError::IncompleteBundle { base_name, .. }
        | InputError::BundleRead { base_name, .. } => base_name.clone(),
        _ => label.to_string(),
    }
}

fn display_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        generated_name(0)
    } else {
        trimmed.to_string()
    }
}
