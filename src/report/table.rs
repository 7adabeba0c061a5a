//! Result table and the "received data" confirmation table.

use std::io::Write;

use serde::Serialize;

use super::locale::{Labels, Locale};
use crate::models::{ClassificationResult, Entity};

/// One presentation row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    /// Contiguous 0-based position in the combined table
    pub index: usize,
    pub name: String,
    pub municipality: Option<String>,
    pub typology_code: Option<String>,
    pub gak: bool,
    pub settlement_name: Option<String>,
    pub fcu: bool,
}

impl TableRow {
    fn cells(&self, labels: &Labels) -> [String; 6] {
        [
            self.name.clone(),
            self.municipality.clone().unwrap_or_default(),
            self.typology_code.clone().unwrap_or_default(),
            labels.flag(self.gak).to_string(),
            self.settlement_name.clone().unwrap_or_default(),
            labels.flag(self.fcu).to_string(),
        ]
    }
}

/// Classification results projected onto the localized columns
#[derive(Debug, Clone, Serialize)]
#[serde(into = "TableView")]
pub struct Table {
    locale: Locale,
    rows: Vec<TableRow>,
}

impl Table {
    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> [&'static str; 6] {
        self.locale.labels().columns()
    }

    /// Header plus one record per row; absent values are empty cells.
    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let labels = self.locale.labels();
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(labels.columns())?;
        for row in &self.rows {
            wtr.write_record(row.cells(labels))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// JSON form of a [`Table`]: localized headers plus one cell array per row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableView {
    pub columns: [&'static str; 6],
    pub rows: Vec<[Option<String>; 6]>,
}

impl From<Table> for TableView {
    fn from(table: Table) -> Self {
        let labels = table.locale.labels();
        let rows = table
            .rows
            .into_iter()
            .map(|row| {
                [
                    Some(row.name),
                    row.municipality,
                    row.typology_code,
                    Some(labels.flag(row.gak).to_string()),
                    row.settlement_name,
                    Some(labels.flag(row.fcu).to_string()),
                ]
            })
            .collect();

        TableView {
            columns: labels.columns(),
            rows,
        }
    }
}

/// Concatenate result sequences (one per input) into a single table.
///
/// Sub-sequence order is kept and rows are re-indexed contiguously. Nothing
/// is deduplicated.
pub fn aggregate(batches: &[Vec<ClassificationResult>], locale: Locale) -> Table {
    let rows = batches
        .iter()
        .flatten()
        .enumerate()
        .map(|(index, result)| TableRow {
            index,
            name: result.entity_name.clone(),
            municipality: result.municipality_name.clone(),
            typology_code: result.typology_code.clone(),
            gak: result.gak_flag,
            settlement_name: result.settlement_name.clone(),
            fcu: result.fcu_flag,
        })
        .collect();

    Table { locale, rows }
}

/// Point entity echoed back before classification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceivedRow {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Name and coordinates of every point entity, in input order. Polygon
/// entities have no single coordinate and are left out.
pub fn received(entities: &[Entity]) -> Vec<ReceivedRow> {
    entities
        .iter()
        .filter_map(|entity| {
            let point = entity.geometry().as_point()?;
            Some(ReceivedRow {
                name: entity.name().to_string(),
                latitude: point.y(),
                longitude: point.x(),
            })
        })
        .collect()
}
