//! Optional engineered columns: wind vectors and cyclical time encodings.

use std::f64::consts::PI;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::pipeline::PipelineError;
use crate::table::Table;

const SECONDS_IN_DAY: f64 = 24.0 * 60.0 * 60.0;
const SECONDS_IN_YEAR: f64 = 365.2425 * SECONDS_IN_DAY;

pub const DAY_SIN: &str = "day sin";
pub const DAY_COS: &str = "day cos";
pub const YEAR_SIN: &str = "year sin";
pub const YEAR_COS: &str = "year cos";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindVectorSpec {
    pub speed: String,
    pub direction_deg: String,
    pub x_name: String,
    pub y_name: String,
}

impl WindVectorSpec {
    pub fn new(
        speed: impl Into<String>,
        direction_deg: impl Into<String>,
        x_name: impl Into<String>,
        y_name: impl Into<String>,
    ) -> Self {
        Self {
            speed: speed.into(),
            direction_deg: direction_deg.into(),
            x_name: x_name.into(),
            y_name: y_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureEngineering {
    pub wind_vectors: Vec<WindVectorSpec>,
    pub time_encodings: bool,
}

impl FeatureEngineering {
    pub fn jena_climate() -> Self {
        Self {
            wind_vectors: vec![
                WindVectorSpec::new("wv (m/s)", "wd (deg)", "wx (m/s)", "wy (m/s)"),
                WindVectorSpec::new(
                    "max. wv (m/s)",
                    "wd (deg)",
                    "max. wx (m/s)",
                    "max. wy (m/s)",
                ),
            ],
            time_encodings: true,
        }
    }

    pub fn time_only() -> Self {
        Self {
            wind_vectors: Vec::new(),
            time_encodings: true,
        }
    }

    pub fn engineered_columns(&self) -> Vec<String> {
        let mut columns = Vec::new();
        for spec in &self.wind_vectors {
            columns.push(spec.x_name.clone());
            columns.push(spec.y_name.clone());
        }
        if self.time_encodings {
            for name in [DAY_SIN, DAY_COS, YEAR_SIN, YEAR_COS] {
                columns.push(name.to_string());
            }
        }
        columns
    }
}

pub fn engineer_features(table: &Table, cfg: &FeatureEngineering) -> Result<Table, PipelineError> {
    let schema = table.schema().with_appended(&cfg.engineered_columns())?;
    let mut columns: Vec<Vec<Option<f64>>> = table
        .columns()
        .map(|(_, cells)| cells.to_vec())
        .collect();

    for spec in &cfg.wind_vectors {
        let speed = source_column(table, &spec.speed)?;
        let direction = source_column(table, &spec.direction_deg)?;
        let (x, y): (Vec<Option<f64>>, Vec<Option<f64>>) = speed
            .iter()
            .zip(direction)
            .map(|(speed, direction)| match (speed, direction) {
                (Some(speed), Some(direction)) => {
                    let (x, y) = wind_components(*speed, *direction);
                    (Some(x), Some(y))
                }
                _ => (None, None),
            })
            .unzip();
        columns.push(x);
        columns.push(y);
    }

    if cfg.time_encodings {
        let encoded: Vec<TimeEncoding> = table.timestamps().iter().map(|ts| time_encoding(*ts)).collect();
        columns.push(encoded.iter().map(|e| Some(e.day_sin)).collect());
        columns.push(encoded.iter().map(|e| Some(e.day_cos)).collect());
        columns.push(encoded.iter().map(|e| Some(e.year_sin)).collect());
        columns.push(encoded.iter().map(|e| Some(e.year_cos)).collect());
    }

    info!(
        component = "features",
        event = "features.engineered",
        wind_vectors = cfg.wind_vectors.len(),
        time_encodings = cfg.time_encodings,
        column_count = schema.len()
    );

    Ok(Table::new(Arc::new(schema), table.timestamps().to_vec(), columns)?)
}

pub fn wind_components(speed: f64, direction_deg: f64) -> (f64, f64) {
    let radians = direction_deg * PI / 180.0;
    (speed * radians.cos(), speed * radians.sin())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeEncoding {
    pub day_sin: f64,
    pub day_cos: f64,
    pub year_sin: f64,
    pub year_cos: f64,
}

pub fn time_encoding(ts: DateTime<Utc>) -> TimeEncoding {
    let seconds = ts.timestamp() as f64;
    let day_angle = seconds * (2.0 * PI / SECONDS_IN_DAY);
    let year_angle = seconds * (2.0 * PI / SECONDS_IN_YEAR);
    TimeEncoding {
        day_sin: day_angle.sin(),
        day_cos: day_angle.cos(),
        year_sin: year_angle.sin(),
        year_cos: year_angle.cos(),
    }
}

fn source_column<'a>(table: &'a Table, name: &str) -> Result<&'a [Option<f64>], PipelineError> {
    table
        .column(name)
        .ok_or_else(|| PipelineError::UnknownColumn(name.to_string()))
}
