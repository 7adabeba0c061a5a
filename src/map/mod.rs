//! Map composer.
//!
//! Builds the layer stack drawn by the UI: matched typology polygons,
//! matched settlement polygons, then the entities on top.

mod style;

use geo::{Geometry, Rect};
use geojson::{Feature, FeatureCollection, JsonObject};
use hashbrown::HashSet;
use serde::Serialize;
use serde_json::Value;

use crate::models::classification::is_gak;
use crate::models::reference::ReferencePolygon;
use crate::models::{ClassificationResult, Entity, FeatureId};
use crate::reference::ReferenceStore;

pub use style::{Category, LayerStyle, ENTITY_COLOR, SETTLEMENT_COLOR, TAB20};

pub const TYPOLOGY_LAYER_NAME: &str = "Tipologia Intraurbana";
pub const SETTLEMENT_LAYER_NAME: &str = "Favelas e Comunidades Urbanas";
pub const ENTITY_LAYER_NAME: &str = "Pontos de interesse";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerRole {
    Typology,
    Settlement,
    Entities,
}

/// One drawable layer. Later layers render on top.
#[derive(Debug, Clone, Serialize)]
pub struct MapLayer {
    pub name: &'static str,
    pub role: LayerRole,
    pub style: LayerStyle,
    pub tooltip_fields: Vec<&'static str>,
    /// Can be hidden without changing the draw order of the others
    pub toggleable: bool,
    pub features: FeatureCollection,
}

/// Bounds of every entity geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl Viewport {
    fn from_rect(rect: Rect<f64>) -> Self {
        Self {
            min_lat: rect.min().y,
            min_lon: rect.min().x,
            max_lat: rect.max().y,
            max_lon: rect.max().x,
        }
    }

    fn extend(self, other: Viewport) -> Self {
        Self {
            min_lat: self.min_lat.min(other.min_lat),
            min_lon: self.min_lon.min(other.min_lon),
            max_lat: self.max_lat.max(other.max_lat),
            max_lon: self.max_lon.max(other.max_lon),
        }
    }

    /// `[[south, west], [north, east]]`, as Leaflet's `fitBounds` takes it
    pub fn bounds(&self) -> [[f64; 2]; 2] {
        [[self.min_lat, self.min_lon], [self.max_lat, self.max_lon]]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MapModel {
    pub layers: Vec<MapLayer>,
    /// `None` when there are no entities
    pub viewport: Option<Viewport>,
}

pub struct MapComposer<'a> {
    store: &'a ReferenceStore,
}

impl<'a> MapComposer<'a> {
    pub fn new(store: &'a ReferenceStore) -> Self {
        Self { store }
    }

    /// `results[i]` must be the classification of `entities[i]`.
    pub fn compose(&self, results: &[ClassificationResult], entities: &[Entity]) -> MapModel {
        let layers = vec![
            self.typology_layer(results),
            self.settlement_layer(results),
            entity_layer(results, entities),
        ];
        let viewport = entities
            .iter()
            .filter_map(|e| e.geometry().bounding_rect())
            .map(Viewport::from_rect)
            .reduce(Viewport::extend);

        MapModel { layers, viewport }
    }

    fn typology_layer(&self, results: &[ClassificationResult]) -> MapLayer {
        let index = self.store.typology_index();
        // Features without a code are not drawn
        let drawn: Vec<_> = matched(results.iter().map(|r| r.typology_feature))
            .filter_map(|id| index.get(id))
            .filter(|f| f.typology_code.is_some())
            .collect();

        let style = LayerStyle::categorical(
            "typology_code",
            drawn.iter().filter_map(|f| f.typology_code.as_deref()),
        );
        let features = drawn
            .iter()
            .map(|f| {
                let mut properties = JsonObject::new();
                properties.insert("typology_code".into(), json_opt(&f.typology_code));
                properties.insert("gak".into(), Value::Bool(is_gak(f.typology_code.as_deref())));
                properties.insert("municipality_name".into(), json_opt(&f.municipality_name));
                feature(polygon_geometry(*f), properties)
            })
            .collect();

        MapLayer {
            name: TYPOLOGY_LAYER_NAME,
            role: LayerRole::Typology,
            style,
            tooltip_fields: vec!["typology_code", "gak"],
            toggleable: true,
            features: collection(features),
        }
    }

    fn settlement_layer(&self, results: &[ClassificationResult]) -> MapLayer {
        let index = self.store.settlement_index();
        let features = matched(results.iter().map(|r| r.settlement_feature))
            .filter_map(|id| index.get(id))
            .map(|f| {
                let mut properties = JsonObject::new();
                properties.insert("settlement_name".into(), json_opt(&f.settlement_name));
                feature(polygon_geometry(f), properties)
            })
            .collect();

        MapLayer {
            name: SETTLEMENT_LAYER_NAME,
            role: LayerRole::Settlement,
            style: LayerStyle::Fixed {
                color: SETTLEMENT_COLOR,
            },
            tooltip_fields: vec!["settlement_name"],
            toggleable: true,
            features: collection(features),
        }
    }
}

fn entity_layer(results: &[ClassificationResult], entities: &[Entity]) -> MapLayer {
    let features = entities
        .iter()
        .zip(results)
        .map(|(entity, result)| {
            let mut properties = JsonObject::new();
            properties.insert("name".into(), Value::String(entity.name().to_string()));
            properties.insert("gak".into(), Value::Bool(result.gak_flag));
            properties.insert("fcu".into(), Value::Bool(result.fcu_flag));
            feature(entity.geometry().geometry().clone(), properties)
        })
        .collect();

    MapLayer {
        name: ENTITY_LAYER_NAME,
        role: LayerRole::Entities,
        style: LayerStyle::entity_marker(),
        tooltip_fields: vec!["name"],
        toggleable: true,
        features: collection(features),
    }
}

/// Distinct matched ids in first-seen order
fn matched(ids: impl Iterator<Item = Option<FeatureId>>) -> impl Iterator<Item = FeatureId> {
    let mut seen = HashSet::new();
    ids.flatten().filter(move |id| seen.insert(*id))
}

fn polygon_geometry<F: ReferencePolygon>(feature: &F) -> Geometry<f64> {
    Geometry::MultiPolygon(feature.polygon().clone())
}

fn json_opt(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}

fn feature(geometry: Geometry<f64>, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(&geometry))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
