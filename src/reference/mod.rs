//! Reference layer store.
//!
//! Holds the typology and settlement layers. Loaded once at startup and
//! read-only afterwards, so one store can be shared (`Arc`) by every run.

mod index;
mod loader;

use tracing::info;

use crate::config::ReferenceConfig;
use crate::error::ReferenceLoadError;
use crate::models::{SettlementFeature, TypologyFeature};

pub use index::LayerIndex;
pub use loader::{load_settlements, load_typology, SETTLEMENT_LAYER, TYPOLOGY_LAYER};

/// Both reference layers with their spatial indexes
pub struct ReferenceStore {
    typology: LayerIndex<TypologyFeature>,
    settlement: LayerIndex<SettlementFeature>,
}

impl ReferenceStore {
    /// Load both layers. Any failure is fatal: there is no degraded mode.
    pub fn load(config: &ReferenceConfig) -> Result<Self, ReferenceLoadError> {
        let (typology, settlement) =
            rayon::join(|| load_typology(config), || load_settlements(config));
        let store = Self::from_features(typology?, settlement?);

        info!(
            "Reference store ready: {} typology, {} settlement features",
            store.typology.len(),
            store.settlement.len()
        );
        Ok(store)
    }

    /// Build from already canonical features
    pub fn from_features(
        typology: Vec<TypologyFeature>,
        settlement: Vec<SettlementFeature>,
    ) -> Self {
        Self {
            typology: LayerIndex::build(typology),
            settlement: LayerIndex::build(settlement),
        }
    }

    pub fn typology_layer(&self) -> &[TypologyFeature] {
        self.typology.features()
    }

    pub fn settlement_layer(&self) -> &[SettlementFeature] {
        self.settlement.features()
    }

    pub fn typology_index(&self) -> &LayerIndex<TypologyFeature> {
        &self.typology
    }

    pub fn settlement_index(&self) -> &LayerIndex<SettlementFeature> {
        &self.settlement
    }
}
