//! Core data models for the classification pipeline.

pub mod classification;
pub mod entity;
pub mod reference;

pub use classification::ClassificationResult;
pub use entity::{Entity, SourceFormat};
pub use reference::{FeatureId, SettlementFeature, TypologyFeature};
