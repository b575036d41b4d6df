//! Column scaling fitted on the training prefix and applied to every row.

use serde::{Deserialize, Serialize};

use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMethod {
    #[default]
    None,
    MinMax,
    Standardization,
}

impl NormalizationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            NormalizationMethod::None => "none",
            NormalizationMethod::MinMax => "min_max",
            NormalizationMethod::Standardization => "standardization",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnScaling {
    pub shift: f64,
    pub scale: f64,
}

impl ColumnScaling {
    const IDENTITY: ColumnScaling = ColumnScaling {
        shift: 0.0,
        scale: 1.0,
    };

    pub fn apply(&self, value: f64) -> f64 {
        (value - self.shift) / self.scale
    }

    pub fn invert(&self, value: f64) -> f64 {
        value * self.scale + self.shift
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub method: NormalizationMethod,
    pub training_rows: usize,
    pub columns: Vec<(String, ColumnScaling)>,
}

impl NormalizationStats {
    /// Missing cells are skipped. A column with zero spread (or no values at all)
    /// gets a scale of 1 so it maps to a constant instead of NaN.
    pub fn fit(prefix: &Table, method: NormalizationMethod) -> Option<Self> {
        let fit_column: fn(&[f64]) -> ColumnScaling = match method {
            NormalizationMethod::None => return None,
            NormalizationMethod::MinMax => min_max_scaling,
            NormalizationMethod::Standardization => standard_scaling,
        };

        let columns = prefix
            .columns()
            .map(|(name, cells)| {
                let values: Vec<f64> = cells.iter().flatten().copied().collect();
                let scaling = if values.is_empty() {
                    ColumnScaling::IDENTITY
                } else {
                    fit_column(&values)
                };
                (name.to_string(), scaling)
            })
            .collect();

        Some(Self {
            method,
            training_rows: prefix.len(),
            columns,
        })
    }

    pub fn apply(&self, table: &Table) -> Table {
        let columns = table
            .columns()
            .zip(&self.columns)
            .map(|((_, cells), (_, scaling))| {
                cells
                    .iter()
                    .map(|cell| cell.map(|v| scaling.apply(v)))
                    .collect()
            })
            .collect();
        table.with_columns(columns)
    }

    pub fn scaling(&self, column: &str) -> Option<ColumnScaling> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, scaling)| *scaling)
    }

    pub fn denormalize(&self, column: &str, value: f64) -> Option<f64> {
        self.scaling(column).map(|scaling| scaling.invert(value))
    }
}

fn min_max_scaling(values: &[f64]) -> ColumnScaling {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    ColumnScaling {
        shift: min,
        scale: if range > 0.0 { range } else { 1.0 },
    }
}

fn standard_scaling(values: &[f64]) -> ColumnScaling {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|v| {
            let d = *v - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let std = variance.sqrt();
    ColumnScaling {
        shift: mean,
        scale: if std > 0.0 { std } else { 1.0 },
    }
}
