//! Classification engine.
//!
//! Joins each entity against the typology layer and then the settlement
//! layer. Lookups are independent per entity and read-only on the store.

use geo::{Area, BooleanOps, Geometry, MultiPolygon};
use serde::Deserialize;
use tracing::debug;

use crate::models::classification::is_gak;
use crate::models::reference::ReferencePolygon;
use crate::models::{ClassificationResult, Entity, FeatureId};
use crate::reference::{LayerIndex, ReferenceStore};
use crate::shapes::to_multipolygon;

/// Which feature wins when an entity intersects several in one layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// First intersecting feature in layer file order
    LayerOrder,
    /// Feature sharing the largest area with a polygon entity; points and
    /// equal areas fall back to layer order
    #[default]
    LargestOverlap,
}

/// Runs the typology and settlement joins
pub struct Classifier<'a> {
    store: &'a ReferenceStore,
    tie_break: TieBreak,
}

impl<'a> Classifier<'a> {
    pub fn new(store: &'a ReferenceStore, tie_break: TieBreak) -> Self {
        Self { store, tie_break }
    }

    /// One result per entity, same order
    pub fn classify(&self, entities: &[Entity]) -> Vec<ClassificationResult> {
        entities.iter().map(|e| self.classify_entity(e)).collect()
    }

    pub fn classify_entity(&self, entity: &Entity) -> ClassificationResult {
        let geometry = entity.geometry().geometry();
        let area_probe = match geometry {
            Geometry::Point(_) => None,
            other => to_multipolygon(other.clone()),
        };

        let typology_feature =
            self.pick(self.store.typology_index(), geometry, area_probe.as_ref());
        let typology = typology_feature.and_then(|id| self.store.typology_index().get(id));
        let municipality_name = typology.and_then(|f| f.municipality_name.clone());
        let typology_code = typology.and_then(|f| f.typology_code.clone());
        let gak_flag = is_gak(typology_code.as_deref());

        let settlement_feature =
            self.pick(self.store.settlement_index(), geometry, area_probe.as_ref());
        let settlement_name = settlement_feature
            .and_then(|id| self.store.settlement_index().get(id))
            .and_then(|f| f.settlement_name.clone());
        // An unnamed settlement polygon does not count as FCU
        let fcu_flag = settlement_name.is_some();

        ClassificationResult {
            entity_name: entity.name().to_string(),
            municipality_name,
            typology_code,
            gak_flag,
            settlement_name,
            fcu_flag,
            typology_feature,
            settlement_feature,
        }
    }

    fn pick<F: ReferencePolygon>(
        &self,
        index: &LayerIndex<F>,
        geometry: &Geometry<f64>,
        area_probe: Option<&MultiPolygon<f64>>,
    ) -> Option<FeatureId> {
        let candidates = index.intersecting(geometry);
        let first = *candidates.first()?;
        if candidates.len() == 1 {
            return Some(first);
        }

        let chosen = match (self.tie_break, area_probe) {
            (TieBreak::LargestOverlap, Some(probe)) => {
                largest_overlap(index, &candidates, probe).unwrap_or(first)
            }
            _ => first,
        };
        debug!(
            "{} features intersect, chose {} ({:?})",
            candidates.len(),
            chosen,
            self.tie_break
        );
        Some(chosen)
    }
}

/// Candidate with the strictly largest shared area; earlier ids win ties.
fn largest_overlap<F: ReferencePolygon>(
    index: &LayerIndex<F>,
    candidates: &[FeatureId],
    probe: &MultiPolygon<f64>,
) -> Option<FeatureId> {
    let mut best: Option<(FeatureId, f64)> = None;
    for &id in candidates {
        let Some(feature) = index.get(id) else {
            continue;
        };
        let area = probe.intersection(feature.polygon()).unsigned_area();
        match best {
            Some((_, best_area)) if area <= best_area => {}
            _ => best = Some((id, area)),
        }
    }
    best.map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::{canonical_point, canonicalize, SourceCrs};
    use crate::models::{SettlementFeature, SourceFormat, TypologyFeature};
    use geo::{LineString, Polygon};

    fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![Polygon::new(
            LineString::from(vec![
                (min_x, min_y),
                (max_x, min_y),
                (max_x, max_y),
                (min_x, max_y),
                (min_x, min_y),
            ]),
            vec![],
        )])
    }

    fn typology(code: &str, municipality: &str, geometry: MultiPolygon<f64>) -> TypologyFeature {
        TypologyFeature {
            municipality_name: Some(municipality.to_string()),
            typology_code: Some(code.to_string()),
            geometry,
        }
    }

    fn point(name: &str, lat: f64, lon: f64) -> Entity {
        let geometry = canonical_point(lat, lon, SourceCrs::Sirgas2000).unwrap();
        Entity::new(name, geometry, SourceFormat::DecimalDegrees)
    }

    fn shape(name: &str, geometry: MultiPolygon<f64>) -> Entity {
        let geometry = canonicalize(Geometry::MultiPolygon(geometry), SourceCrs::Sirgas2000).unwrap();
        Entity::new(name, geometry, SourceFormat::ShapefileFeature)
    }

    /// Rio-ish layout: typology "G" west, "C" east, one settlement straddling
    fn store() -> ReferenceStore {
        ReferenceStore::from_features(
            vec![
                typology("G", "Rio de Janeiro", rect(-43.4, -23.0, -43.2, -22.8)),
                typology("C", "Niterói", rect(-43.2, -23.0, -43.0, -22.8)),
            ],
            vec![SettlementFeature {
                settlement_name: Some("Rocinha".to_string()),
                geometry: rect(-43.25, -22.99, -43.22, -22.97),
            }],
        )
    }

    #[test]
    fn test_point_in_gak_typology_and_settlement() {
        let store = store();
        let classifier = Classifier::new(&store, TieBreak::default());
        let result = classifier.classify_entity(&point("Local A", -22.98, -43.23));

        assert_eq!(result.entity_name, "Local A");
        assert_eq!(result.municipality_name.as_deref(), Some("Rio de Janeiro"));
        assert_eq!(result.typology_code.as_deref(), Some("G"));
        assert!(result.gak_flag);
        assert_eq!(result.settlement_name.as_deref(), Some("Rocinha"));
        assert!(result.fcu_flag);
        assert_eq!(result.typology_feature, Some(0));
        assert_eq!(result.settlement_feature, Some(0));
    }

    #[test]
    fn test_point_outside_everything() {
        let store = store();
        let classifier = Classifier::new(&store, TieBreak::default());
        let result = classifier.classify_entity(&point("Mar", -23.5, -42.0));

        assert_eq!(result.municipality_name, None);
        assert_eq!(result.typology_code, None);
        assert!(!result.gak_flag);
        assert_eq!(result.settlement_name, None);
        assert!(!result.fcu_flag);
    }

    #[test]
    fn test_non_gak_code() {
        let store = store();
        let classifier = Classifier::new(&store, TieBreak::default());
        let result = classifier.classify_entity(&point("Leste", -22.9, -43.1));
        assert_eq!(result.typology_code.as_deref(), Some("C"));
        assert!(!result.gak_flag);
        assert!(!result.fcu_flag);
    }

    #[test]
    fn test_flags_follow_matches() {
        let store = store();
        let classifier = Classifier::new(&store, TieBreak::LayerOrder);
        let entities = vec![
            point("a", -22.98, -43.23),
            point("b", -22.9, -43.1),
            point("c", -23.5, -42.0),
            shape("d", rect(-43.3, -22.95, -43.1, -22.85)),
        ];
        for result in classifier.classify(&entities) {
            assert_eq!(result.fcu_flag, result.settlement_name.is_some());
            assert_eq!(result.gak_flag, is_gak(result.typology_code.as_deref()));
        }
    }

    #[test]
    fn test_boundary_point_matches() {
        let store = store();
        let classifier = Classifier::new(&store, TieBreak::LayerOrder);
        // Shared edge of both typology polygons; layer order picks the first
        let result = classifier.classify_entity(&point("Borda", -22.9, -43.2));
        assert_eq!(result.typology_code.as_deref(), Some("G"));
    }

    #[test]
    fn test_polygon_tie_break() {
        let store = store();
        // Mostly inside the eastern polygon
        let entity = shape("Lote", rect(-43.25, -22.9, -43.05, -22.85));

        let by_order = Classifier::new(&store, TieBreak::LayerOrder).classify_entity(&entity);
        assert_eq!(by_order.typology_code.as_deref(), Some("G"));

        let by_area = Classifier::new(&store, TieBreak::LargestOverlap).classify_entity(&entity);
        assert_eq!(by_area.typology_code.as_deref(), Some("C"));
        assert_eq!(by_area.municipality_name.as_deref(), Some("Niterói"));
        assert!(!by_area.gak_flag);
    }

    #[test]
    fn test_empty_layers_yield_no_matches() {
        let store = ReferenceStore::from_features(vec![], vec![]);
        let classifier = Classifier::new(&store, TieBreak::default());
        let results = classifier.classify(&[point("a", -22.9, -43.2)]);
        assert_eq!(results.len(), 1);
        assert!(!results[0].gak_flag);
        assert!(!results[0].fcu_flag);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let store = store();
        let classifier = Classifier::new(&store, TieBreak::default());
        let entities = vec![
            point("a", -22.98, -43.23),
            shape("b", rect(-43.25, -22.9, -43.05, -22.85)),
        ];
        assert_eq!(classifier.classify(&entities), classifier.classify(&entities));
    }

    #[test]
    fn test_unnamed_settlement_is_not_fcu() {
        let store = ReferenceStore::from_features(
            vec![typology("G", "Rio de Janeiro", rect(-43.4, -23.0, -43.2, -22.8))],
            vec![SettlementFeature {
                settlement_name: None,
                geometry: rect(-43.25, -22.99, -43.22, -22.97),
            }],
        );
        let classifier = Classifier::new(&store, TieBreak::default());

        let result = classifier.classify_entity(&point("Local A", -22.98, -43.23));
        assert_eq!(result.settlement_name, None);
        assert!(!result.fcu_flag);
        assert_eq!(result.fcu_flag, result.settlement_name.is_some());
        assert_eq!(result.typology_code.as_deref(), Some("G"));
    }
}
