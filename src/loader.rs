//! CSV observation loading.
//!
//! The file has a header row naming one timestamp column and any number of numeric
//! feature columns, e.g. the Jena climate recordings:
//!
//! ```text
//! "Date Time","p (mbar)","T (degC)",...
//! 01.01.2009 00:10:00,996.52,-8.02,...
//! ```

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use csv::StringRecord;
use thiserror::Error;
use tracing::info;

use crate::observation::{Observation, ObservationError};
use crate::table::DEFAULT_INDEX_COLUMN;

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvLoadOptions {
    pub index_column: String,
    pub timestamp_format: String,
    pub delimiter: u8,
}

impl Default for CsvLoadOptions {
    fn default() -> Self {
        Self {
            index_column: DEFAULT_INDEX_COLUMN.to_string(),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            delimiter: b',',
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("header has no index column '{0}'")]
    MissingIndexColumn(String),
    #[error("line {line}: failed to parse timestamp '{value}'")]
    ParseTimestamp { line: u64, value: String },
    #[error("line {line}: failed to parse column '{column}' value '{value}'")]
    ParseField {
        line: u64,
        column: String,
        value: String,
    },
    #[error("line {line}: {source}")]
    Observation {
        line: u64,
        #[source]
        source: ObservationError,
    },
}

pub fn load_observations_csv(
    path: &Path,
    options: &CsvLoadOptions,
) -> Result<Vec<Observation>, LoadError> {
    let file = File::open(path)?;
    let observations = read_observations_csv(file, options)?;
    info!(
        component = "loader",
        event = "loader.csv.loaded",
        path = %path.display(),
        rows = observations.len()
    );
    Ok(observations)
}

pub fn read_observations_csv<R: Read>(
    reader: R,
    options: &CsvLoadOptions,
) -> Result<Vec<Observation>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(options.delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let index_pos = headers
        .iter()
        .position(|name| name == options.index_column)
        .ok_or_else(|| LoadError::MissingIndexColumn(options.index_column.clone()))?;

    let mut observations = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |pos| pos.line());
        observations.push(parse_record(&record, &headers, index_pos, line, options)?);
    }

    Ok(observations)
}

fn parse_record(
    record: &StringRecord,
    headers: &StringRecord,
    index_pos: usize,
    line: u64,
    options: &CsvLoadOptions,
) -> Result<Observation, LoadError> {
    let raw_ts = record.get(index_pos).unwrap_or_default();
    let timestamp = if raw_ts.is_empty() {
        None
    } else {
        Some(parse_timestamp(raw_ts, &options.timestamp_format).ok_or_else(|| {
            LoadError::ParseTimestamp {
                line,
                value: raw_ts.to_string(),
            }
        })?)
    };

    let mut values = Vec::with_capacity(headers.len().saturating_sub(1));
    for (idx, column) in headers.iter().enumerate() {
        if idx == index_pos {
            continue;
        }
        values.push((column, parse_cell(record, idx, column, line)?));
    }

    Observation::new(timestamp, values).map_err(|source| LoadError::Observation { line, source })
}

fn parse_cell(
    record: &StringRecord,
    idx: usize,
    column: &str,
    line: u64,
) -> Result<Option<f64>, LoadError> {
    let raw = record.get(idx).unwrap_or_default();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| LoadError::ParseField {
            line,
            column: column.to_string(),
            value: raw.to_string(),
        })
}

pub fn parse_timestamp(raw: &str, naive_format: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, naive_format)
        .ok()
        .map(|naive| naive.and_utc())
}
