//! Fluent assembly of [`PreprocessorOptions`].

use chrono::{DateTime, Utc};

use crate::bounds::ValueBoundsTable;
use crate::features::FeatureEngineering;
use crate::normalization::NormalizationMethod;
use crate::observation::Observation;
use crate::pipeline::{DateRange, PipelineError, Preprocessor, PreprocessorOptions, SplitRatios};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreprocessorBuilder {
    options: PreprocessorOptions,
}

impl PreprocessorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn split(mut self, split: impl Into<SplitRatios>) -> Self {
        self.options.split = split.into();
        self
    }

    pub fn normalize(mut self, method: NormalizationMethod) -> Self {
        self.options.normalization = method;
        self
    }

    pub fn date_range(mut self, first: Option<DateTime<Utc>>, last: Option<DateTime<Utc>>) -> Self {
        self.options.date_range = DateRange::new(first, last);
        self
    }

    pub fn value_bounds(mut self, bounds: ValueBoundsTable) -> Self {
        self.options.value_bounds = Some(bounds);
        self
    }

    pub fn feature_engineering(mut self, cfg: FeatureEngineering) -> Self {
        self.options.feature_engineering = Some(cfg);
        self
    }

    pub fn index_column(mut self, name: impl Into<String>) -> Self {
        self.options.index_column = name.into();
        self
    }

    pub fn options(&self) -> &PreprocessorOptions {
        &self.options
    }

    pub fn build(&self, observations: &[Observation]) -> Result<Preprocessor, PipelineError> {
        Preprocessor::new(observations, self.options.clone())
    }
}
