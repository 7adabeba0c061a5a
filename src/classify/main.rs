//! Command-line classification.
//!
//! Normalizes the given inputs, classifies them against the reference
//! layers and writes the result table and map model.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tipologia::config::Config;
use tipologia::geocode::ArcGisGeocoder;
use tipologia::normalize::{normalize_input, BundleSource, CsvSource, EntityInput, TabularBatch};
use tipologia::reference::ReferenceStore;
use tipologia::report::Locale;
use tipologia::{analyze, Analysis, RunOptions};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "classify")]
#[command(about = "Classify points and shapes by intra-urban typology and FCU")]
struct Args {
    /// DMS coordinates, as NAME=TEXT (e.g. "Local A=22°54'31.1\"S 43°10'46.5\"W")
    #[arg(long)]
    dms: Vec<String>,

    /// Decimal coordinates, as NAME=LAT,LON
    #[arg(long)]
    point: Vec<String>,

    /// Address to geocode, as NAME=TEXT
    #[arg(long)]
    address: Vec<String>,

    /// CSV file of name,lat,lon rows (gzip allowed)
    #[arg(long)]
    csv: Vec<PathBuf>,

    /// CSV files have no header row
    #[arg(long)]
    no_header: bool,

    /// Directory holding one shapefile bundle
    #[arg(long)]
    bundle: Vec<PathBuf>,

    /// Result table output (.json for JSON records, CSV otherwise; stdout when absent)
    #[arg(long)]
    table_out: Option<PathBuf>,

    /// Map model output (JSON)
    #[arg(long)]
    map_out: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output locale (pt-BR or en)
    #[arg(long)]
    locale: Option<Locale>,

    /// Typology layer shapefile
    #[arg(long)]
    typology: Option<PathBuf>,

    /// Settlement layer shapefile
    #[arg(long)]
    settlement: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, the table may go to stdout
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches)?;

    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(path) = &args.typology {
        config.reference.typology_path = path.clone();
    }
    if let Some(path) = &args.settlement {
        config.reference.settlement_path = path.clone();
    }
    if let Some(locale) = args.locale {
        config.output.locale = locale;
    }

    let inputs = collect_inputs(&args, &matches)?;
    if inputs.is_empty() {
        anyhow::bail!("Nothing to classify: pass --dms, --point, --address, --csv or --bundle");
    }

    let store =
        ReferenceStore::load(&config.reference).context("Failed to load reference layers")?;
    let geocoder = ArcGisGeocoder::new(&config.geocoder)?;

    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut batches = Vec::with_capacity(inputs.len());
    for input in &inputs {
        pb.set_message(input.subject());
        let batch = normalize_input(input, &geocoder).await;
        for failure in &batch.failures {
            warn!("{}: {}", failure.subject, failure.error);
        }
        batches.push(batch);
        pb.inc(1);
    }
    pb.finish_with_message("Inputs read");

    let analysis = analyze(&store, batches, RunOptions::from_config(&config));
    info!(
        "{} entities received, {} rows, {} failures",
        analysis.received.len(),
        analysis.table.len(),
        analysis.failures.len()
    );

    write_table(&analysis, args.table_out.as_deref())?;
    if let Some(path) = &args.map_out {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &analysis.map)?;
        info!("Map model written to {}", path.display());
    }

    if analysis.table.is_empty() && !analysis.failures.is_empty() {
        anyhow::bail!("No input could be classified");
    }

    Ok(())
}

/// Inputs in command-line order, whatever flag introduced them.
fn collect_inputs(args: &Args, matches: &ArgMatches) -> Result<Vec<EntityInput>> {
    let mut inputs: Vec<(usize, EntityInput)> = Vec::new();

    for (position, arg) in positions(matches, "dms").zip(&args.dms) {
        let (name, coordinates) = split_named(arg)?;
        inputs.push((
            position,
            EntityInput::Dms {
                name: name.to_string(),
                coordinates: coordinates.to_string(),
            },
        ));
    }

    for (position, arg) in positions(matches, "point").zip(&args.point) {
        let (name, pair) = split_named(arg)?;
        let (lat, lon) = pair
            .split_once(',')
            .with_context(|| format!("Expected LAT,LON in {:?}", arg))?;
        inputs.push((
            position,
            EntityInput::Decimal {
                name: name.to_string(),
                lat: lat.trim().parse().with_context(|| format!("Bad latitude in {:?}", arg))?,
                lon: lon.trim().parse().with_context(|| format!("Bad longitude in {:?}", arg))?,
            },
        ));
    }

    for (position, arg) in positions(matches, "address").zip(&args.address) {
        let (name, address) = split_named(arg)?;
        inputs.push((
            position,
            EntityInput::Address {
                name: name.to_string(),
                address: address.to_string(),
            },
        ));
    }

    for (position, path) in positions(matches, "csv").zip(&args.csv) {
        inputs.push((
            position,
            EntityInput::Table(TabularBatch {
                source: CsvSource::Path(path.clone()),
                has_header: !args.no_header,
            }),
        ));
    }

    for (position, dir) in positions(matches, "bundle").zip(&args.bundle) {
        inputs.push((
            position,
            EntityInput::Bundle(BundleSource::Directory(dir.clone())),
        ));
    }

    inputs.sort_by_key(|(position, _)| *position);
    Ok(inputs.into_iter().map(|(_, input)| input).collect())
}

/// Argv positions of every value given for `id`
fn positions(matches: &ArgMatches, id: &str) -> impl Iterator<Item = usize> {
    matches
        .indices_of(id)
        .map(|indices| indices.collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter()
}

fn split_named(arg: &str) -> Result<(&str, &str)> {
    arg.split_once('=')
        .with_context(|| format!("Expected NAME=VALUE, got {:?}", arg))
}

fn write_table(analysis: &Analysis, path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        let stdout = io::stdout();
        analysis.table.write_csv(stdout.lock())?;
        return Ok(());
    };

    let mut writer = BufWriter::new(
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
    );
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        serde_json::to_writer_pretty(&mut writer, &analysis.table)?;
    } else {
        analysis.table.write_csv(&mut writer)?;
    }
    writer.flush()?;

    info!("Table written to {}", path.display());
    Ok(())
}
