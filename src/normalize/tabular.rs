//! Tabular batches: one entity per CSV row, with row-level isolation.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use flate2::read::GzDecoder;
use tracing::{debug, info};

use super::NormalizedBatch;
use crate::crs::{canonical_point, SourceCrs};
use crate::error::{InputError, InputFailure};
use crate::models::entity::generated_name;
use crate::models::{Entity, SourceFormat};

/// Where the rows come from
#[derive(Debug, Clone)]
pub enum CsvSource {
    /// In-memory text, e.g. an upload; `label` names it in failures
    Text { label: String, content: String },
    /// File on disk, gzip-compressed when it ends in `.gz`
    Path(PathBuf),
}

impl CsvSource {
    pub fn label(&self) -> String {
        match self {
            CsvSource::Text { label, .. } => label.clone(),
            CsvSource::Path(path) => path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("csv")
                .to_string(),
        }
    }
}

/// Rows of `name, latitude, longitude` (or `latitude, longitude`)
#[derive(Debug, Clone)]
pub struct TabularBatch {
    pub source: CsvSource,
    pub has_header: bool,
}

/// Parse every row independently; malformed rows become `RowParse` failures.
pub fn read_batch(batch: &TabularBatch) -> NormalizedBatch {
    let label = batch.source.label();
    let mut normalized = NormalizedBatch::default();

    let content = match read_source(&batch.source) {
        Ok(content) => content,
        Err(e) => {
            normalized
                .failures
                .push(InputFailure::new(label, InputError::Unreadable(e.to_string())));
            return normalized;
        }
    };
    let content = content.trim_start_matches('\u{feff}');

    let delimiter = sniff_delimiter(content);
    let decimal_comma = delimiter == b';';

    let mut reader = ReaderBuilder::new()
        .has_headers(batch.has_header)
        .delimiter(delimiter)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    for (i, result) in reader.records().enumerate() {
        let row = i + 1;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                normalized
                    .failures
                    .push(InputFailure::new(&label, InputError::row(row, e.to_string())));
                continue;
            }
        };

        if record.iter().all(|field| field.is_empty()) {
            debug!("Skipping blank row {} of {}", row, label);
            continue;
        }

        match parse_row(&record, row, decimal_comma) {
            Ok(entity) => normalized.entities.push(entity),
            Err((subject, error)) => {
                let subject = subject.unwrap_or_else(|| label.clone());
                normalized.failures.push(InputFailure::new(subject, error));
            }
        }
    }

    // A table without data rows must not vanish from the report
    if normalized.entities.is_empty() && normalized.failures.is_empty() {
        normalized.failures.push(InputFailure::new(
            &label,
            InputError::Unreadable("no data rows".to_string()),
        ));
    }

    info!(
        "Read {} rows from {} ({} failed)",
        normalized.entities.len() + normalized.failures.len(),
        label,
        normalized.failures.len()
    );

    normalized
}

fn read_source(source: &CsvSource) -> std::io::Result<String> {
    match source {
        CsvSource::Text { content, .. } => Ok(content.clone()),
        CsvSource::Path(path) => {
            let file = File::open(path)?;
            let mut reader: Box<dyn Read> = if is_gzip(path) {
                Box::new(GzDecoder::new(file))
            } else {
                Box::new(file)
            };
            let mut content = String::new();
            reader.read_to_string(&mut content)?;
            Ok(content)
        }
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("gz"))
}

/// `;` when the first line uses it (commas are then decimal separators), else `,`
fn sniff_delimiter(content: &str) -> u8 {
    let first_line = content.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    if first_line.contains(';') {
        b';'
    } else {
        b','
    }
}

/// Build the entity for one row. Errors carry the row's name when known.
fn parse_row(
    record: &StringRecord,
    row: usize,
    decimal_comma: bool,
) -> Result<Entity, (Option<String>, InputError)> {
    let fields: Vec<&str> = record.iter().collect();

    let (name, lat, lon) = match fields.as_slice() {
        [name, lat, lon] => {
            let name = if name.is_empty() {
                generated_name(row - 1)
            } else {
                name.to_string()
            };
            (name, *lat, *lon)
        }
        [lat, lon] => (generated_name(row - 1), *lat, *lon),
        other => {
            return Err((
                None,
                InputError::row(row, format!("expected 2 or 3 columns, found {}", other.len())),
            ))
        }
    };

    let fail = |reason: String| (Some(name.clone()), InputError::row(row, reason));

    let lat = parse_number(lat, decimal_comma)
        .ok_or_else(|| fail(format!("latitude {:?} is not a number", lat)))?;
    let lon = parse_number(lon, decimal_comma)
        .ok_or_else(|| fail(format!("longitude {:?} is not a number", lon)))?;

    let geometry = canonical_point(lat, lon, SourceCrs::Sirgas2000).map_err(|e| fail(e.to_string()))?;

    Ok(Entity::new(name, geometry, SourceFormat::CsvRow))
}

fn parse_number(field: &str, decimal_comma: bool) -> Option<f64> {
    let value = if decimal_comma {
        field.replace(',', ".").parse::<f64>()
    } else {
        field.parse::<f64>()
    };
    value.ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn text_batch(content: &str, has_header: bool) -> TabularBatch {
        TabularBatch {
            source: CsvSource::Text {
                label: "pontos.csv".to_string(),
                content: content.to_string(),
            },
            has_header,
        }
    }

    #[test]
    fn test_header_and_rows() {
        let batch = text_batch(
            "nome,latitude,longitude\nLocal A,-22.9086,-43.1796\nLocal B,-22.95,-43.2\n",
            true,
        );
        let normalized = read_batch(&batch);
        assert!(normalized.failures.is_empty());
        assert_eq!(normalized.entities.len(), 2);
        assert_eq!(normalized.entities[0].name(), "Local A");
        let point = normalized.entities[1].geometry().as_point().unwrap();
        assert_eq!(point.y(), -22.95);
        assert_eq!(point.x(), -43.2);
        assert_eq!(normalized.entities[0].source_format(), SourceFormat::CsvRow);
    }

    #[test]
    fn test_malformed_row_is_isolated() {
        let batch = text_batch(
            "Local A,-22.9,-43.1\nLocal B,abc,-43.1\nLocal C,-22.8,-43.0\nLocal D,-95.0,-43.0\n",
            false,
        );
        let normalized = read_batch(&batch);
        assert_eq!(normalized.entities.len(), 2);
        assert_eq!(normalized.failures.len(), 2);

        let names: Vec<&str> = normalized.entities.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["Local A", "Local C"]);

        assert_eq!(normalized.failures[0].subject, "Local B");
        assert!(matches!(
            normalized.failures[0].error,
            InputError::RowParse { row: 2, .. }
        ));
        assert!(matches!(
            normalized.failures[1].error,
            InputError::RowParse { row: 4, .. }
        ));
    }

    #[test]
    fn test_two_columns_and_semicolons() {
        let batch = text_batch("-22,9;-43,1\n\n-22,8;-43,0\n", false);
        let normalized = read_batch(&batch);
        assert!(normalized.failures.is_empty());
        assert_eq!(normalized.entities.len(), 2);
        assert_eq!(normalized.entities[0].name(), "Entrada 1");
        let point = normalized.entities[0].geometry().as_point().unwrap();
        assert_eq!(point.y(), -22.9);
    }

    #[test]
    fn test_wrong_column_count() {
        let batch = text_batch("a,b,c,d\n", false);
        let normalized = read_batch(&batch);
        assert!(normalized.entities.is_empty());
        assert_eq!(normalized.failures[0].subject, "pontos.csv");
    }

    #[test]
    fn test_gzip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pontos.csv.gz");
        let file = File::create(&path).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        encoder.write_all(b"nome,lat,lon\nLocal A,-22.9,-43.1\n").unwrap();
        encoder.finish().unwrap();

        let batch = TabularBatch {
            source: CsvSource::Path(path),
            has_header: true,
        };
        let normalized = read_batch(&batch);
        assert_eq!(normalized.entities.len(), 1);
    }

    #[test]
    fn test_missing_file() {
        let batch = TabularBatch {
            source: CsvSource::Path(PathBuf::from("/nonexistent/pontos.csv")),
            has_header: true,
        };
        let normalized = read_batch(&batch);
        assert!(matches!(
            normalized.failures[0].error,
            InputError::Unreadable(_)
        ));
    }

    #[test]
    fn test_semicolons_with_decimal_commas() {
        let batch = text_batch("Local A;-22,9;-43,1
Local B;-22,85;-43,05
", false);
        let normalized = read_batch(&batch);
        assert!(normalized.failures.is_empty());
        assert_eq!(normalized.entities.len(), 2);
        assert_eq!(normalized.entities[0].name(), "Local A");
        let point = normalized.entities[0].geometry().as_point().unwrap();
        assert_eq!(point.y(), -22.9);
        assert_eq!(point.x(), -43.1);
    }

    #[test]
    fn test_semicolon_header() {
        let batch = text_batch("nome;latitude;longitude
Local A;-22,9;-43,1
", true);
        let normalized = read_batch(&batch);
        assert_eq!(normalized.entities.len(), 1);
        assert_eq!(normalized.entities[0].name(), "Local A");
    }

    #[test]
    fn test_header_only_is_reported() {
        let batch = text_batch("nome,latitude,longitude
", true);
        let normalized = read_batch(&batch);
        assert!(normalized.entities.is_empty());
        assert_eq!(normalized.failures.len(), 1);
        assert_eq!(normalized.failures[0].subject, "pontos.csv");
        assert!(matches!(
            normalized.failures[0].error,
            InputError::Unreadable(_)
        ));
    }

    #[test]
    fn test_blank_content_is_reported() {
        let batch = text_batch("\n  \n,,\n", false);
        let normalized = read_batch(&batch);
        assert!(normalized.entities.is_empty());
        assert_eq!(normalized.failures.len(), 1);
        assert_eq!(normalized.failures[0].subject, "pontos.csv");
    }
}
