//! Tipologia - classification of points and shapes against intra-urban
//! typology and urban settlement (FCU) reference layers.
//!
//! This library provides the pipeline shared by the classify and serve binaries.

pub mod classifier;
pub mod config;
pub mod crs;
pub mod error;
pub mod geocode;
pub mod map;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod reference;
pub mod report;
pub mod shapes;

pub use models::{ClassificationResult, Entity, SourceFormat};
pub use pipeline::{analyze, run, Analysis, RunOptions};
