//! End-to-end run: normalize, classify, aggregate and compose.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::classifier::{Classifier, TieBreak};
use crate::config::Config;
use crate::error::FailureReport;
use crate::geocode::Geocoder;
use crate::map::{MapComposer, MapModel};
use crate::models::Entity;
use crate::normalize::{normalize_all, EntityInput, NormalizedBatch};
use crate::reference::ReferenceStore;
use crate::report::{aggregate, received, Locale, ReceivedRow, Table};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub tie_break: TieBreak,
    pub locale: Locale,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tie_break: config.classification.tie_break,
            locale: config.output.locale,
        }
    }
}

/// Everything one submission produces
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub received: Vec<ReceivedRow>,
    pub table: Table,
    pub map: MapModel,
    pub failures: Vec<FailureReport>,
    pub generated_at: DateTime<Utc>,
}

/// Normalize `inputs` and analyze the result.
pub async fn run<G: Geocoder>(
    inputs: &[EntityInput],
    geocoder: &G,
    store: &ReferenceStore,
    options: RunOptions,
) -> Analysis {
    let batches = normalize_all(inputs, geocoder).await;
    analyze(store, batches, options)
}

/// Classify already normalized batches. CPU bound: call from a blocking
/// context when inside an async runtime.
pub fn analyze(store: &ReferenceStore, batches: Vec<NormalizedBatch>, options: RunOptions) -> Analysis {
    let classifier = Classifier::new(store, options.tie_break);

    // Batches are independent; collect keeps input order
    let results: Vec<_> = batches
        .par_iter()
        .map(|batch| classifier.classify(&batch.entities))
        .collect();

    let mut entities: Vec<Entity> = Vec::new();
    let mut failures = Vec::new();
    for batch in batches {
        entities.extend(batch.entities);
        failures.extend(batch.failures.iter().map(|f| f.to_report()));
    }

    let table = aggregate(&results, options.locale);
    let flat: Vec<_> = results.into_iter().flatten().collect();
    let map = MapComposer::new(store).compose(&flat, &entities);

    info!(
        "Classified {} entities ({} with GaK, {} in FCU), {} failures",
        flat.len(),
        flat.iter().filter(|r| r.gak_flag).count(),
        flat.iter().filter(|r| r.fcu_flag).count(),
        failures.len()
    );

    Analysis {
        received: received(&entities),
        table,
        map,
        failures,
        generated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::{canonical_point, SourceCrs};
    use crate::error::{InputError, InputFailure};
    use crate::geocode::GeocodedPoint;
    use crate::models::{SettlementFeature, SourceFormat, TypologyFeature};
    use crate::normalize::{CsvSource, TabularBatch};
    use geo::{LineString, MultiPolygon, Polygon};

    struct NoGeocoder;

    impl Geocoder for NoGeocoder {
        async fn geocode(&self, _address: &str) -> anyhow::Result<Option<GeocodedPoint>> {
            Ok(None)
        }
    }

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

    fn store() -> ReferenceStore {
        ReferenceStore::from_features(
            vec![TypologyFeature {
                municipality_name: Some("Rio de Janeiro".into()),
                typology_code: Some("H".into()),
                geometry: rect(-43.3, -23.0, -43.1, -22.8),
            }],
            vec![SettlementFeature {
                settlement_name: Some("Providência".into()),
                geometry: rect(-43.20, -22.90, -43.19, -22.89),
            }],
        )
    }

    fn entities(names: &[&str]) -> Vec<Entity> {
        names
            .iter()
            .map(|name| {
                let geometry = canonical_point(-22.95, -43.2, SourceCrs::Sirgas2000).unwrap();
                Entity::new(*name, geometry, SourceFormat::ShapefileFeature)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_local_a_scenario() {
        let store = store();
        let inputs = vec![EntityInput::Dms {
            name: "Local A".to_string(),
            coordinates: r#"22°54'31.1"S 43°10'46.5"W"#.to_string(),
        }];
        let analysis = run(&inputs, &NoGeocoder, &store, RunOptions::default()).await;

        assert!(analysis.failures.is_empty());
        assert_eq!(analysis.received.len(), 1);
        let row = &analysis.table.rows()[0];
        assert_eq!(row.name, "Local A");
        assert_eq!(row.typology_code.as_deref(), Some("H"));
        assert!(row.gak);
        assert!(!row.fcu);
        assert_eq!(row.settlement_name, None);
    }

    #[tokio::test]
    async fn test_batch_isolation() {
        let store = store();
        let inputs = vec![EntityInput::Table(TabularBatch {
            source: CsvSource::Text {
                label: "pontos.csv".to_string(),
                content: "nome,lat,lon\nA,-22.95,-43.2\nB,abc,-43.2\nC,-22.96,-43.2\n".to_string(),
            },
            has_header: true,
        })];
        let analysis = run(&inputs, &NoGeocoder, &store, RunOptions::default()).await;

        assert_eq!(analysis.table.len(), 2);
        assert_eq!(analysis.failures.len(), 1);
        assert_eq!(analysis.failures[0].kind, "row_parse_error");
    }

    #[test]
    fn test_two_bundles_keep_order() {
        let store = store();
        let batches = vec![
            NormalizedBatch {
                entities: entities(&["Entrada 1", "Entrada 2", "Entrada 3"]),
                failures: Vec::new(),
            },
            NormalizedBatch {
                entities: Vec::new(),
                failures: vec![InputFailure::new(
                    "lotes",
                    InputError::IncompleteBundle {
                        base_name: "lotes".to_string(),
                        missing: vec!["lotes.prj".to_string()],
                    },
                )],
            },
            NormalizedBatch {
                entities: entities(&["Entrada 1", "Entrada 2"]),
                failures: Vec::new(),
            },
        ];

        let analysis = analyze(&store, batches, RunOptions::default());
        assert_eq!(analysis.table.len(), 5);
        let indexes: Vec<usize> = analysis.table.rows().iter().map(|r| r.index).collect();
        assert_eq!(indexes, vec![0, 1, 2, 3, 4]);
        assert_eq!(analysis.failures[0].subject, "lotes");
        assert_eq!(analysis.map.layers[2].features.features.len(), 5);
    }
}
