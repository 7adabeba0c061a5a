//! ArcGIS World Geocoding Service client (`findAddressCandidates`).

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{GeocodedPoint, Geocoder};
use crate::config::GeocoderConfig;

pub const ARCGIS_ENDPOINT: &str =
    "https://geocode.arcgis.com/arcgis/rest/services/World/GeocodeServer/findAddressCandidates";

/// Geocoder backed by ArcGIS, with a hard request timeout
pub struct ArcGisGeocoder {
    client: Client,
    endpoint: Url,
    min_score: f64,
}

#[derive(Debug, Deserialize)]
struct CandidatesResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    address: Option<String>,
    location: Location,
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Location {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    code: Option<i64>,
    message: String,
}

impl ArcGisGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).context("Invalid geocoder endpoint")?;
        let client = Client::builder()
            .user_agent(concat!("tipologia/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            min_score: config.min_score,
        })
    }

    fn request_url(&self, address: &str) -> Result<Url> {
        let url = Url::parse_with_params(
            self.endpoint.as_str(),
            &[
                ("SingleLine", address),
                ("f", "json"),
                ("maxLocations", "1"),
                ("outSR", "4326"),
            ],
        )?;
        Ok(url)
    }
}

impl Geocoder for ArcGisGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodedPoint>> {
        let url = self.request_url(address)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Geocoding request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            warn!("Geocoder answered {} for {:?}", status, address);
            anyhow::bail!("geocoder answered HTTP {}", status);
        }

        let body: CandidatesResponse = response
            .json()
            .await
            .context("Failed to parse geocoder response")?;

        let best = best_candidate(body, self.min_score)?;
        match &best {
            Some(point) => debug!("Geocoded {:?} to ({}, {})", address, point.lat, point.lon),
            None => debug!("No geocoding candidate for {:?}", address),
        }
        Ok(best)
    }
}

/// Score given to candidates the service left unscored
const UNSCORED: f64 = 0.0;

/// Pick the top candidate, turning service-level errors into `Err`.
fn best_candidate(body: CandidatesResponse, min_score: f64) -> Result<Option<GeocodedPoint>> {
    if let Some(error) = body.error {
        anyhow::bail!(
            "geocoder error {}: {}",
            error.code.map(|c| c.to_string()).unwrap_or_default(),
            error.message
        );
    }

    Ok(body
        .candidates
        .into_iter()
        .filter(|c| c.score.unwrap_or(UNSCORED) >= min_score)
        .max_by(|a, b| {
            a.score
                .unwrap_or(UNSCORED)
                .partial_cmp(&b.score.unwrap_or(UNSCORED))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|c| GeocodedPoint {
            lat: c.location.y,
            lon: c.location.x,
            score: c.score,
            matched_address: c.address,
        }))
}
