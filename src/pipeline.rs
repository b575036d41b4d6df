//! Preprocessing pipeline: observations to raw, processed, normalized and date-limited
//! snapshots, plus the training/validation/test slices cut from the last one.
//!
//! Every stage is a plain function of the previous snapshot and the configuration.
//! [`Preprocessor`] caches the four snapshots and recomputes the dependent ones only
//! through [`Preprocessor::reconfigure`], which swaps new snapshots in after all of them
//! were computed successfully.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bounds::ValueBoundsTable;
use crate::features::{engineer_features, FeatureEngineering};
use crate::normalization::{NormalizationMethod, NormalizationStats};
use crate::observation::Observation;
use crate::table::{ColumnSchema, Table, TableError, DEFAULT_INDEX_COLUMN};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("no observations supplied")]
    EmptyInput,
    #[error("observation at {timestamp} has features {found:?}, expected {expected:?}")]
    SchemaMismatch {
        timestamp: DateTime<Utc>,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("invalid date range: first {first} must be earlier than last {last}")]
    InvalidRange {
        first: DateTime<Utc>,
        last: DateTime<Utc>,
    },
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("{stage} snapshot has no rows")]
    EmptySnapshot { stage: &'static str },
    #[error("{method} normalization needs at least one training row")]
    EmptyTrainingPrefix { method: &'static str },
    #[error(transparent)]
    Table(#[from] TableError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRatios {
    pub training: u32,
    pub validation: u32,
    pub test: u32,
}

impl SplitRatios {
    pub const fn new(training: u32, validation: u32, test: u32) -> Self {
        Self {
            training,
            validation,
            test,
        }
    }

    pub fn is_valid(&self) -> bool {
        u64::from(self.training) + u64::from(self.validation) + u64::from(self.test) == 100
    }
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self::new(70, 20, 10)
    }
}

impl From<[u32; 3]> for SplitRatios {
    fn from([training, validation, test]: [u32; 3]) -> Self {
        Self::new(training, validation, test)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
}

impl DateRange {
    pub const fn new(first: Option<DateTime<Utc>>, last: Option<DateTime<Utc>>) -> Self {
        Self { first, last }
    }

    pub const fn unbounded() -> Self {
        Self::new(None, None)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        match (self.first, self.last) {
            (Some(first), Some(last)) if first >= last => {
                Err(PipelineError::InvalidRange { first, last })
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessorOptions {
    pub index_column: String,
    pub split: SplitRatios,
    pub normalization: NormalizationMethod,
    pub date_range: DateRange,
    pub value_bounds: Option<ValueBoundsTable>,
    pub feature_engineering: Option<FeatureEngineering>,
}

impl Default for PreprocessorOptions {
    fn default() -> Self {
        Self {
            index_column: DEFAULT_INDEX_COLUMN.to_string(),
            split: SplitRatios::default(),
            normalization: NormalizationMethod::None,
            date_range: DateRange::unbounded(),
            value_bounds: None,
            feature_engineering: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reconfiguration {
    pub normalization: Option<NormalizationMethod>,
    pub date_range: Option<DateRange>,
    pub split: Option<SplitRatios>,
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    split: SplitRatios,
    normalization: NormalizationMethod,
    stats: Option<NormalizationStats>,
    first_date: DateTime<Utc>,
    last_date: DateTime<Utc>,
    raw: Table,
    processed: Table,
    normalized: Table,
    date_limited: Table,
}

impl Preprocessor {
    pub fn new(
        observations: &[Observation],
        options: PreprocessorOptions,
    ) -> Result<Self, PipelineError> {
        info!(
            component = "pipeline",
            event = "pipeline.build.start",
            observations = observations.len(),
            normalization = options.normalization.as_str(),
            feature_engineering = options.feature_engineering.is_some(),
            clamping = options.value_bounds.is_some()
        );

        let split = if options.split.is_valid() {
            options.split
        } else {
            log_ignored_split(options.split);
            SplitRatios::default()
        };

        let raw = build_raw_table(observations, &options.index_column)?;
        let clamped = match &options.value_bounds {
            Some(bounds) => clamp_outliers(&raw, bounds),
            None => raw.clone(),
        };
        let mut processed = resample_hourly(&clamped);
        if processed.is_empty() {
            return Err(PipelineError::EmptySnapshot { stage: "processed" });
        }
        if let Some(cfg) = &options.feature_engineering {
            processed = engineer_features(&processed, cfg)?;
        }

        let (normalized, stats) = normalize(&processed, options.normalization, split.training)?;
        options.date_range.validate()?;
        let (first_date, last_date) =
            effective_date_range(&normalized, options.date_range.first, options.date_range.last)?;
        let date_limited = limit_date_range(&normalized, first_date, last_date)?;

        info!(
            component = "pipeline",
            event = "pipeline.build.finish",
            raw_rows = raw.len(),
            processed_rows = processed.len(),
            normalized_rows = normalized.len(),
            date_limited_rows = date_limited.len(),
            column_count = processed.schema().len(),
            first_date = %first_date,
            last_date = %last_date
        );

        Ok(Self {
            split,
            normalization: options.normalization,
            stats,
            first_date,
            last_date,
            raw,
            processed,
            normalized,
            date_limited,
        })
    }

    /// Applies `update` atomically: either every affected snapshot is replaced or,
    /// on error, the pipeline is left exactly as it was.
    pub fn reconfigure(&mut self, update: Reconfiguration) -> Result<(), PipelineError> {
        let mut split = self.split;
        if let Some(requested) = update.split {
            if requested.is_valid() {
                split = requested;
            } else {
                log_ignored_split(requested);
            }
        }
        let normalization = update.normalization.unwrap_or(self.normalization);
        let refit = update.normalization.is_some() || split.training != self.split.training;

        let renormalized = if refit {
            Some(normalize(&self.processed, normalization, split.training)?)
        } else {
            None
        };
        let normalized = renormalized
            .as_ref()
            .map_or(&self.normalized, |(table, _)| table);

        let (first_date, last_date) = match update.date_range {
            Some(range) => {
                range.validate()?;
                effective_date_range(normalized, range.first, range.last)?
            }
            None => effective_date_range(normalized, Some(self.first_date), Some(self.last_date))?,
        };
        let date_limited = limit_date_range(normalized, first_date, last_date)?;

        if let Some((table, stats)) = renormalized {
            self.normalized = table;
            self.stats = stats;
        }
        self.split = split;
        self.normalization = normalization;
        self.first_date = first_date;
        self.last_date = last_date;
        self.date_limited = date_limited;

        info!(
            component = "pipeline",
            event = "pipeline.reconfigure",
            normalization = normalization.as_str(),
            refit,
            training = split.training,
            validation = split.validation,
            test = split.test,
            first_date = %first_date,
            last_date = %last_date,
            date_limited_rows = self.date_limited.len()
        );

        Ok(())
    }

    pub fn set_normalization(&mut self, method: NormalizationMethod) -> Result<(), PipelineError> {
        self.reconfigure(Reconfiguration {
            normalization: Some(method),
            ..Reconfiguration::default()
        })
    }

    pub fn set_date_range(&mut self, range: DateRange) -> Result<(), PipelineError> {
        self.reconfigure(Reconfiguration {
            date_range: Some(range),
            ..Reconfiguration::default()
        })
    }

    /// Returns `Ok(false)` when `ratios` do not sum to 100 and were ignored.
    pub fn set_split_ratios(&mut self, ratios: SplitRatios) -> Result<bool, PipelineError> {
        self.reconfigure(Reconfiguration {
            split: Some(ratios),
            ..Reconfiguration::default()
        })?;
        Ok(ratios.is_valid())
    }

    pub fn training_set(&self) -> Table {
        self.date_limited.slice(self.split_ranges()[0].clone())
    }

    pub fn validation_set(&self) -> Table {
        self.date_limited.slice(self.split_ranges()[1].clone())
    }

    pub fn test_set(&self) -> Table {
        self.date_limited.slice(self.split_ranges()[2].clone())
    }

    pub fn split_ranges(&self) -> [Range<usize>; 3] {
        let rows = self.date_limited.len();
        let training = split_row_count(rows, self.split.training);
        let validation = split_row_count(rows, self.split.validation);
        let test = split_row_count(rows, self.split.test);
        [
            0..training,
            training..training + validation,
            training + validation..training + validation + test,
        ]
    }

    pub fn raw(&self) -> &Table {
        &self.raw
    }

    pub fn processed(&self) -> &Table {
        &self.processed
    }

    pub fn normalized(&self) -> &Table {
        &self.normalized
    }

    pub fn date_limited(&self) -> &Table {
        &self.date_limited
    }

    pub fn schema(&self) -> &ColumnSchema {
        self.processed.schema()
    }

    pub fn split_ratios(&self) -> SplitRatios {
        self.split
    }

    pub fn normalization(&self) -> NormalizationMethod {
        self.normalization
    }

    pub fn normalization_stats(&self) -> Option<&NormalizationStats> {
        self.stats.as_ref()
    }

    pub fn first_date(&self) -> DateTime<Utc> {
        self.first_date
    }

    pub fn last_date(&self) -> DateTime<Utc> {
        self.last_date
    }
}

pub fn split_row_count(rows: usize, percentage: u32) -> usize {
    (rows as f64 * f64::from(percentage) / 100.0).round_ties_even() as usize
}

/// Sorted by timestamp; for repeated timestamps the first one in input order survives.
pub fn deduplicate(observations: &[Observation]) -> (Vec<&Observation>, usize) {
    let mut unique: Vec<&Observation> = observations.iter().collect();
    unique.sort_by_key(|obs| obs.timestamp());
    let before = unique.len();
    unique.dedup_by_key(|obs| obs.timestamp());
    let dropped = before - unique.len();
    (unique, dropped)
}

pub fn build_raw_table(
    observations: &[Observation],
    index_column: &str,
) -> Result<Table, PipelineError> {
    let first = observations.first().ok_or(PipelineError::EmptyInput)?;
    let expected: Vec<String> = first.feature_names().map(str::to_string).collect();
    let expected_set: HashSet<&str> = expected.iter().map(String::as_str).collect();

    for obs in observations {
        let same_features =
            obs.len() == expected.len() && obs.feature_names().all(|name| expected_set.contains(name));
        if !same_features {
            return Err(PipelineError::SchemaMismatch {
                timestamp: obs.timestamp(),
                expected,
                found: obs.feature_names().map(str::to_string).collect(),
            });
        }
    }

    let (unique, dropped) = deduplicate(observations);
    if dropped > 0 {
        warn!(
            component = "pipeline",
            event = "pipeline.raw.duplicates_dropped",
            dropped,
            kept = unique.len()
        );
    }

    let timestamps = unique.iter().map(|obs| obs.timestamp()).collect();
    let columns = expected
        .iter()
        .map(|name| unique.iter().map(|obs| obs.value(name)).collect())
        .collect();
    let schema = ColumnSchema::new(index_column, expected.clone())?;

    Ok(Table::new(Arc::new(schema), timestamps, columns)?)
}

pub fn clamp_outliers(table: &Table, bounds: &ValueBoundsTable) -> Table {
    let mut clamped_cells = 0usize;
    let columns = table
        .columns()
        .map(|(name, cells)| match bounds.bounds_for_column(name) {
            Some(range) => cells
                .iter()
                .map(|cell| {
                    cell.map(|v| {
                        let pinned = range.clamp(v);
                        if pinned != v {
                            clamped_cells += 1;
                        }
                        pinned
                    })
                })
                .collect(),
            None => cells.to_vec(),
        })
        .collect();

    debug!(
        component = "pipeline",
        event = "pipeline.clamp.finish",
        clamped_cells
    );

    table.with_columns(columns)
}

pub fn resample_hourly(table: &Table) -> Table {
    table.retain_rows(is_on_the_hour)
}

pub fn is_on_the_hour(ts: DateTime<Utc>) -> bool {
    ts.minute() == 0 && ts.second() == 0 && ts.nanosecond() == 0
}

pub fn normalize(
    processed: &Table,
    method: NormalizationMethod,
    training_percentage: u32,
) -> Result<(Table, Option<NormalizationStats>), PipelineError> {
    if method == NormalizationMethod::None {
        return Ok((processed.clone(), None));
    }
    let prefix_rows = split_row_count(processed.len(), training_percentage);
    if prefix_rows == 0 {
        return Err(PipelineError::EmptyTrainingPrefix {
            method: method.as_str(),
        });
    }

    match NormalizationStats::fit(&processed.slice(0..prefix_rows), method) {
        Some(stats) => Ok((stats.apply(processed), Some(stats))),
        None => Ok((processed.clone(), None)),
    }
}

/// Clamps the requested bounds between the first and last timestamp of `normalized`.
/// A bound that leaves no overlap with the dataset is rejected.
pub fn effective_date_range(
    normalized: &Table,
    first: Option<DateTime<Utc>>,
    last: Option<DateTime<Utc>>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), PipelineError> {
    let empty = PipelineError::EmptySnapshot {
        stage: "normalized",
    };
    let dataset_first = normalized.first_timestamp().ok_or_else(|| empty.clone())?;
    let dataset_last = normalized.last_timestamp().ok_or(empty)?;

    if first.is_some_and(|ts| ts > dataset_last) || last.is_some_and(|ts| ts < dataset_first) {
        return Err(PipelineError::EmptySnapshot {
            stage: "date_limited",
        });
    }

    Ok((
        first.map_or(dataset_first, |ts| ts.clamp(dataset_first, dataset_last)),
        last.map_or(dataset_last, |ts| ts.clamp(dataset_first, dataset_last)),
    ))
}

pub fn limit_date_range(
    normalized: &Table,
    first: DateTime<Utc>,
    last: DateTime<Utc>,
) -> Result<Table, PipelineError> {
    let timestamps = normalized.timestamps();
    let start = timestamps.partition_point(|ts| *ts < first);
    let end = timestamps.partition_point(|ts| *ts <= last);
    if end <= start {
        return Err(PipelineError::EmptySnapshot {
            stage: "date_limited",
        });
    }
    Ok(normalized.slice(start..end))
}

fn log_ignored_split(requested: SplitRatios) {
    warn!(
        component = "pipeline",
        event = "pipeline.split_ratios.ignored",
        training = requested.training,
        validation = requested.validation,
        test = requested.test,
        reason = "percentages must sum to 100"
    );
}
