//! Reference layer features.

use geo::{BoundingRect, MultiPolygon};

/// Position of a feature in its reference layer (file order)
pub type FeatureId = usize;

/// Polygon of the intra-urban typology layer
#[derive(Debug, Clone)]
pub struct TypologyFeature {
    pub municipality_name: Option<String>,
    pub typology_code: Option<String>,
    pub geometry: MultiPolygon<f64>,
}

/// Polygon of the settlement (favelas e comunidades urbanas) layer
#[derive(Debug, Clone)]
pub struct SettlementFeature {
    pub settlement_name: Option<String>,
    pub geometry: MultiPolygon<f64>,
}

/// Access to a reference feature's polygon
pub trait ReferencePolygon {
    fn polygon(&self) -> &MultiPolygon<f64>;

    /// Bounding box as `(min_x, min_y, max_x, max_y)`
    fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        self.polygon()
            .bounding_rect()
            .map(|rect| (rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }
}

impl ReferencePolygon for TypologyFeature {
    fn polygon(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }
}

impl ReferencePolygon for SettlementFeature {
    fn polygon(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }
}
