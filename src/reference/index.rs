//! Spatial index for fast reference feature lookups.

use geo::{BoundingRect, Geometry, Intersects};
use rstar::{RTree, RTreeObject, AABB};
use tracing::debug;

use crate::models::reference::ReferencePolygon;
use crate::models::FeatureId;

/// Wrapper for R-tree indexing of reference features
#[derive(Clone)]
struct IndexedFeature {
    id: FeatureId,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedFeature {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// One reference layer: features in file order plus an R-tree over their boxes
pub struct LayerIndex<F> {
    features: Vec<F>,
    tree: RTree<IndexedFeature>,
}

impl<F: ReferencePolygon> LayerIndex<F> {
    /// Build the index. Features without a bounding box (empty polygons) are
    /// kept for id stability but never match.
    pub fn build(features: Vec<F>) -> Self {
        let indexed: Vec<IndexedFeature> = features
            .iter()
            .enumerate()
            .filter_map(|(id, feature)| {
                let (min_x, min_y, max_x, max_y) = feature.bbox()?;
                Some(IndexedFeature {
                    id,
                    envelope: AABB::from_corners([min_x, min_y], [max_x, max_y]),
                })
            })
            .collect();

        let tree = RTree::bulk_load(indexed);
        debug!(
            "Spatial index built with {} of {} features",
            tree.size(),
            features.len()
        );

        Self { features, tree }
    }

    /// Ids of all features intersecting `geometry` (boundary inclusive), in
    /// file order.
    pub fn intersecting(&self, geometry: &Geometry<f64>) -> Vec<FeatureId> {
        let Some(rect) = geometry.bounding_rect() else {
            return Vec::new();
        };
        let query_envelope = AABB::from_corners(
            [rect.min().x, rect.min().y],
            [rect.max().x, rect.max().y],
        );

        // Envelope candidates first, then the exact predicate
        let mut ids: Vec<FeatureId> = self
            .tree
            .locate_in_envelope_intersecting(&query_envelope)
            .filter(|indexed| geometry.intersects(self.features[indexed.id].polygon()))
            .map(|indexed| indexed.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn get(&self, id: FeatureId) -> Option<&F> {
        self.features.get(id)
    }

    pub fn features(&self) -> &[F] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
