//! Physical value bounds keyed by unit of measurement.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoundsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid bounds document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bounds for unit '{unit}' are inverted: min {min} > max {max}")]
    InvertedBounds { unit: String, min: f64, max: f64 },
    #[error("bounds for unit '{unit}' are not finite")]
    NonFiniteBounds { unit: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueBounds {
    pub min: f64,
    pub max: f64,
}

impl ValueBounds {
    pub fn clamp(&self, value: f64) -> f64 {
        self.min.max(self.max.min(value))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueBoundsTable {
    bounds: BTreeMap<String, ValueBounds>,
}

impl ValueBoundsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jena_climate() -> Self {
        let mut table = Self::new();
        for (unit, min, max) in [
            ("mbar", 0.0, 1150.0),
            ("degC", -50.0, 50.0),
            ("K", 220.0, 325.0),
            ("%", 0.0, 100.0),
            ("g/kg", 0.0, 30.0),
            ("mmol/mol", 0.0, 40.0),
            ("g/m**3", 800.0, 1500.0),
            ("m/s", 0.0, 70.0),
            ("deg", 0.0, 360.0),
        ] {
            table.bounds.insert(unit.to_string(), ValueBounds { min, max });
        }
        table
    }

    pub fn from_json_str(raw: &str) -> Result<Self, BoundsError> {
        let parsed: BTreeMap<String, [f64; 2]> = serde_json::from_str(raw)?;
        let mut table = Self::new();
        for (unit, [min, max]) in parsed {
            table.insert(unit, min, max)?;
        }
        Ok(table)
    }

    pub fn from_path(path: &Path) -> Result<Self, BoundsError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn insert(&mut self, unit: impl Into<String>, min: f64, max: f64) -> Result<(), BoundsError> {
        let unit = unit.into();
        if !min.is_finite() || !max.is_finite() {
            return Err(BoundsError::NonFiniteBounds { unit });
        }
        if min > max {
            return Err(BoundsError::InvertedBounds { unit, min, max });
        }
        self.bounds.insert(unit, ValueBounds { min, max });
        Ok(())
    }

    pub fn get(&self, unit: &str) -> Option<ValueBounds> {
        self.bounds.get(unit).copied()
    }

    pub fn bounds_for_column(&self, column: &str) -> Option<ValueBounds> {
        unit_of_measure(column).and_then(|unit| self.get(unit))
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }
}

pub fn unit_of_measure(column: &str) -> Option<&str> {
    let open = column.rfind('(')?;
    let rest = &column[open + 1..];
    let unit = match rest.find(')') {
        Some(close) => &rest[..close],
        None => rest,
    };
    if unit.is_empty() {
        None
    } else {
        Some(unit)
    }
}
