//! JSON run configuration tying the preprocessor and the window generator together.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builder::PreprocessorBuilder;
use crate::features::FeatureEngineering;
use crate::normalization::NormalizationMethod;
use crate::pipeline::SplitRatios;
use crate::table::DEFAULT_INDEX_COLUMN;
use crate::window::{LabelPolicy, WindowError, WindowGenerator};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Window(#[from] WindowError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForecastConfig {
    #[serde(default = "default_index_column")]
    pub index_column: String,
    pub label_columns: Vec<String>,
    pub input_width: usize,
    pub output_width: usize,
    pub offset: usize,
    #[serde(default = "default_split")]
    pub split: [u32; 3],
    #[serde(default)]
    pub normalization: NormalizationMethod,
    #[serde(default)]
    pub first_valid_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_valid_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub feature_engineering: bool,
    #[serde(default)]
    pub label_policy: LabelPolicy,
}

fn default_index_column() -> String {
    DEFAULT_INDEX_COLUMN.to_string()
}

fn default_split() -> [u32; 3] {
    let split = SplitRatios::default();
    [split.training, split.validation, split.test]
}

impl ForecastConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn builder(&self) -> PreprocessorBuilder {
        let builder = PreprocessorBuilder::new()
            .index_column(self.index_column.clone())
            .split(self.split)
            .normalize(self.normalization)
            .date_range(self.first_valid_date, self.last_valid_date);
        if self.feature_engineering {
            builder.feature_engineering(FeatureEngineering::jena_climate())
        } else {
            builder
        }
    }

    pub fn window_generator(&self) -> Result<WindowGenerator, ConfigError> {
        let generator = WindowGenerator::new(
            self.input_width,
            self.output_width,
            self.offset,
            self.label_columns.iter().cloned(),
        )?;
        Ok(generator.with_label_policy(self.label_policy))
    }
}
