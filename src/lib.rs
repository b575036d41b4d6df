//! Time-series forecasting data preparation.
//!
//! Current implemented scope:
//! - observation ingestion from CSV with per-row validation
//! - preprocessing: dedup, unit-bound clamping, hourly resampling, optional engineered
//!   columns, training-prefix normalization and date limiting
//! - chronological training/validation/test splits
//! - sliding-window feature/label tensors

mod bounds;
mod builder;
mod config;
mod features;
mod loader;
mod normalization;
mod observability;
mod observation;
mod pipeline;
mod table;
mod window;

pub use bounds::{unit_of_measure, BoundsError, ValueBounds, ValueBoundsTable};
pub use builder::PreprocessorBuilder;
pub use config::{ConfigError, ForecastConfig};
pub use features::{
    engineer_features, time_encoding, wind_components, FeatureEngineering, TimeEncoding,
    WindVectorSpec, DAY_COS, DAY_SIN, YEAR_COS, YEAR_SIN,
};
pub use loader::{
    load_observations_csv, parse_timestamp, read_observations_csv, CsvLoadOptions, LoadError,
    DEFAULT_TIMESTAMP_FORMAT,
};
pub use normalization::{ColumnScaling, NormalizationMethod, NormalizationStats};
pub use observability::{
    init_logging, log_run_finish, log_run_start, log_split_windows, logging_config_from_env,
    LogFormat, LoggingConfig, LoggingInitError,
};
pub use observation::{Observation, ObservationError};
pub use pipeline::{
    build_raw_table, clamp_outliers, deduplicate, effective_date_range, is_on_the_hour,
    limit_date_range, normalize, resample_hourly, split_row_count, DateRange, PipelineError,
    Preprocessor, PreprocessorOptions, Reconfiguration, SplitRatios,
};
pub use table::{assert_schema_compatible, ColumnSchema, Table, TableError, DEFAULT_INDEX_COLUMN};
pub use window::{LabelPolicy, WindowError, WindowGenerator, WindowTensors};
