//! Address geocoding.
//!
//! The normalizer only sees the [`Geocoder`] trait; [`ArcGisGeocoder`] is the
//! production implementation backed by the ArcGIS World Geocoding Service.

mod arcgis;

use std::future::Future;

use serde::Serialize;

pub use arcgis::{ArcGisGeocoder, ARCGIS_ENDPOINT};

/// A resolved address in WGS 84 decimal degrees
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodedPoint {
    pub lat: f64,
    pub lon: f64,
    /// Provider's match score (0-100), when reported
    pub score: Option<f64>,
    /// Address as normalized by the provider
    pub matched_address: Option<String>,
}

/// Resolves free-text addresses to coordinates.
///
/// `Ok(None)` means the provider answered but found no candidate.
pub trait Geocoder {
    fn geocode(
        &self,
        address: &str,
    ) -> impl Future<Output = anyhow::Result<Option<GeocodedPoint>>> + Send;
}
