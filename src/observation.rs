//! Timestamped sensor observations as handed over by a loader.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObservationError {
    #[error("observation has no timestamp")]
    MissingTimestamp,
    #[error("observation at {timestamp} has no value for feature '{feature}'")]
    MissingValue {
        timestamp: DateTime<Utc>,
        feature: String,
    },
    #[error("observation at {timestamp} lists feature '{feature}' more than once")]
    DuplicateFeature {
        timestamp: DateTime<Utc>,
        feature: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    timestamp: DateTime<Utc>,
    features: Vec<(String, f64)>,
}

impl Observation {
    pub fn new<I, K>(timestamp: Option<DateTime<Utc>>, values: I) -> Result<Self, ObservationError>
    where
        I: IntoIterator<Item = (K, Option<f64>)>,
        K: Into<String>,
    {
        let timestamp = timestamp.ok_or(ObservationError::MissingTimestamp)?;
        let mut features: Vec<(String, f64)> = Vec::new();

        for (name, value) in values {
            let feature = name.into();
            if features.iter().any(|(existing, _)| *existing == feature) {
                return Err(ObservationError::DuplicateFeature { timestamp, feature });
            }
            match value {
                Some(v) if v.is_finite() => features.push((feature, v)),
                _ => return Err(ObservationError::MissingValue { timestamp, feature }),
            }
        }

        Ok(Self {
            timestamp,
            features,
        })
    }

    pub fn from_values<I, K>(timestamp: DateTime<Utc>, values: I) -> Result<Self, ObservationError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self::new(
            Some(timestamp),
            values.into_iter().map(|(name, value)| (name, Some(value))),
        )
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn features(&self) -> &[(String, f64)] {
        &self.features
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(|(name, _)| name.as_str())
    }

    pub fn value(&self, feature: &str) -> Option<f64> {
        self.features
            .iter()
            .find(|(name, _)| name == feature)
            .map(|(_, value)| *value)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
