//! Columnar snapshots: one timestamp index plus named numeric columns.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const DEFAULT_INDEX_COLUMN: &str = "Date Time";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    #[error("schema has {expected} columns but {found} were supplied")]
    ColumnCountMismatch { expected: usize, found: usize },
    #[error("column '{column}' has {found} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("timestamps must be strictly ascending: {previous} is followed by {next}")]
    UnsortedTimestamps {
        previous: DateTime<Utc>,
        next: DateTime<Utc>,
    },
    #[error("column '{0}' appears more than once")]
    DuplicateColumn(String),
    #[error("schema fingerprint mismatch: expected {expected}, got {actual}")]
    SchemaFingerprintMismatch { expected: String, actual: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    index: String,
    columns: Vec<String>,
}

impl ColumnSchema {
    pub fn new(index: impl Into<String>, columns: Vec<String>) -> Result<Self, TableError> {
        let index = index.into();
        let mut seen = HashSet::new();
        seen.insert(index.as_str());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(TableError::DuplicateColumn(column.clone()));
            }
        }
        Ok(Self { index, columns })
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.position(column).is_some()
    }

    pub fn with_appended(&self, extra: &[String]) -> Result<Self, TableError> {
        let mut columns = self.columns.clone();
        columns.extend(extra.iter().cloned());
        Self::new(self.index.clone(), columns)
    }

    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("index:{};", self.index));
        hasher.update("columns:");
        for column in &self.columns {
            hasher.update(column.as_bytes());
            hasher.update(":f64;");
        }
        hex::encode(hasher.finalize())
    }
}

pub fn assert_schema_compatible(
    expected_fingerprint: &str,
    actual: &ColumnSchema,
) -> Result<(), TableError> {
    let actual_fingerprint = actual.fingerprint();
    if expected_fingerprint != actual_fingerprint {
        return Err(TableError::SchemaFingerprintMismatch {
            expected: expected_fingerprint.to_string(),
            actual: actual_fingerprint,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    schema: Arc<ColumnSchema>,
    timestamps: Vec<DateTime<Utc>>,
    columns: Vec<Vec<Option<f64>>>,
}

impl Table {
    pub fn new(
        schema: Arc<ColumnSchema>,
        timestamps: Vec<DateTime<Utc>>,
        columns: Vec<Vec<Option<f64>>>,
    ) -> Result<Self, TableError> {
        if columns.len() != schema.len() {
            return Err(TableError::ColumnCountMismatch {
                expected: schema.len(),
                found: columns.len(),
            });
        }
        for (name, values) in schema.columns().iter().zip(&columns) {
            if values.len() != timestamps.len() {
                return Err(TableError::LengthMismatch {
                    column: name.clone(),
                    expected: timestamps.len(),
                    found: values.len(),
                });
            }
        }
        if let Some(pair) = timestamps.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(TableError::UnsortedTimestamps {
                previous: pair[0],
                next: pair[1],
            });
        }

        Ok(Self {
            schema,
            timestamps,
            columns,
        })
    }

    pub(crate) fn with_columns(&self, columns: Vec<Vec<Option<f64>>>) -> Self {
        debug_assert_eq!(columns.len(), self.columns.len());
        Self {
            schema: Arc::clone(&self.schema),
            timestamps: self.timestamps.clone(),
            columns,
        }
    }

    pub(crate) fn retain_rows(&self, keep: impl Fn(DateTime<Utc>) -> bool) -> Self {
        let kept: Vec<usize> = self
            .timestamps
            .iter()
            .enumerate()
            .filter(|(_, ts)| keep(**ts))
            .map(|(idx, _)| idx)
            .collect();

        Self {
            schema: Arc::clone(&self.schema),
            timestamps: kept.iter().map(|&idx| self.timestamps[idx]).collect(),
            columns: self
                .columns
                .iter()
                .map(|values| kept.iter().map(|&idx| values[idx]).collect())
                .collect(),
        }
    }

    pub fn slice(&self, rows: Range<usize>) -> Self {
        let end = rows.end.min(self.len());
        let start = rows.start.min(end);
        Self {
            schema: Arc::clone(&self.schema),
            timestamps: self.timestamps[start..end].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|values| values[start..end].to_vec())
                .collect(),
        }
    }

    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.schema
            .position(name)
            .map(|idx| self.columns[idx].as_slice())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> {
        self.schema
            .columns()
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter().map(Vec::as_slice))
    }

    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        self.column(column)
            .and_then(|values| values.get(row).copied())
            .flatten()
    }
}
