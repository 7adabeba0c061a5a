//! Classification server.
//!
//! Loads the reference layers once and exposes the pipeline over HTTP for
//! the UI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tipologia::config::Config;
use tipologia::geocode::ArcGisGeocoder;
use tipologia::normalize::{normalize_all, BundleSource, CsvSource, EntityInput, TabularBatch};
use tipologia::reference::ReferenceStore;
use tipologia::report::Locale;
use tipologia::{analyze, Analysis, RunOptions};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "serve")]
#[command(about = "Typology and FCU classification server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    listen: String,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Application state shared across handlers
struct AppState {
    store: Arc<ReferenceStore>,
    geocoder: ArcGisGeocoder,
    options: RunOptions,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = Config::load_or_default(args.config.as_deref())?;

    info!("Tipologia classification server");

    // No degraded mode: refuse to start without both layers
    let reference = config.reference.clone();
    let store = tokio::task::spawn_blocking(move || ReferenceStore::load(&reference))
        .await?
        .context("Failed to load reference layers")?;

    let state = Arc::new(AppState {
        store: Arc::new(store),
        geocoder: ArcGisGeocoder::new(&config.geocoder)?,
        options: RunOptions::from_config(&config),
    });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/v1/classify", post(classify_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Starting server on {}", args.listen);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        typology_features: state.store.typology_layer().len(),
        settlement_features: state.store.settlement_layer().len(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    typology_features: usize,
    settlement_features: usize,
}

#[derive(Debug, Deserialize)]
struct ClassifyRequest {
    inputs: Vec<InputPayload>,
    locale: Option<Locale>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputPayload {
    Dms {
        #[serde(default)]
        name: String,
        coordinates: String,
    },
    Decimal {
        #[serde(default)]
        name: String,
        lat: f64,
        lon: f64,
    },
    Address {
        #[serde(default)]
        name: String,
        address: String,
    },
    Csv {
        label: Option<String>,
        content: Option<String>,
        path: Option<PathBuf>,
        #[serde(default = "default_has_header")]
        has_header: bool,
    },
    Bundle {
        directory: Option<PathBuf>,
        #[serde(default)]
        files: Vec<PathBuf>,
    },
}

fn default_has_header() -> bool {
    true
}

impl TryFrom<InputPayload> for EntityInput {
    type Error = String;

    fn try_from(payload: InputPayload) -> Result<Self, Self::Error> {
        Ok(match payload {
            InputPayload::Dms { name, coordinates } => EntityInput::Dms { name, coordinates },
            InputPayload::Decimal { name, lat, lon } => EntityInput::Decimal { name, lat, lon },
            InputPayload::Address { name, address } => EntityInput::Address { name, address },
            InputPayload::Csv {
                label,
                content,
                path,
                has_header,
            } => {
                let source = match (content, path) {
                    (Some(content), _) => CsvSource::Text {
                        label: label.unwrap_or_else(|| "csv".to_string()),
                        content,
                    },
                    (None, Some(path)) => CsvSource::Path(path),
                    (None, None) => return Err("csv input needs content or path".to_string()),
                };
                EntityInput::Table(TabularBatch { source, has_header })
            }
            InputPayload::Bundle { directory, files } => match directory {
                Some(dir) => EntityInput::Bundle(BundleSource::Directory(dir)),
                None if !files.is_empty() => EntityInput::Bundle(BundleSource::Files(files)),
                None => return Err("bundle input needs a directory or files".to_string()),
            },
        })
    }
}

/// Normalize, classify, aggregate and compose one submission
async fn classify_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ClassifyRequest>,
) -> Result<Json<Analysis>, (StatusCode, String)> {
    let inputs = request
        .inputs
        .into_iter()
        .map(EntityInput::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;

    let batches = normalize_all(&inputs, &state.geocoder).await;

    let options = RunOptions {
        locale: request.locale.unwrap_or(state.options.locale),
        ..state.options
    };
    let store = state.store.clone();
    let analysis = tokio::task::spawn_blocking(move || analyze(&store, batches, options))
        .await
        .map_err(|e| {
            error!("Classification task failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    Ok(Json(analysis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_parsing() {
        let request: ClassifyRequest = serde_json::from_str(
            r#"{
                "inputs": [
                    {"type": "dms", "name": "Local A", "coordinates": "22°54'31.1\"S 43°10'46.5\"W"},
                    {"type": "decimal", "lat": -22.9, "lon": -43.2},
                    {"type": "csv", "content": "A,-22.9,-43.2", "has_header": false},
                    {"type": "bundle", "directory": "/tmp/lotes"}
                ],
                "locale": "en"
            }"#,
        )
        .unwrap();

        assert_eq!(request.locale, Some(Locale::En));
        let inputs: Vec<EntityInput> = request
            .inputs
            .into_iter()
            .map(|p| EntityInput::try_from(p).unwrap())
            .collect();
        assert!(matches!(inputs[0], EntityInput::Dms { .. }));
        assert!(matches!(&inputs[1], EntityInput::Decimal { name, .. } if name.is_empty()));
        assert!(matches!(
            &inputs[2],
            EntityInput::Table(TabularBatch { has_header: false, .. })
        ));
        assert!(matches!(inputs[3], EntityInput::Bundle(BundleSource::Directory(_))));
    }

    #[test]
    fn test_empty_csv_payload_rejected() {
        let payload: InputPayload = serde_json::from_str(r#"{"type": "csv"}"#).unwrap();
        assert!(EntityInput::try_from(payload).is_err());
    }
}
