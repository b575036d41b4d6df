//! Sliding windows over a table, producing feature and label tensors.

use chrono::{DateTime, Utc};
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::table::Table;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WindowError {
    #[error("invalid window configuration: {0}")]
    InvalidConfiguration(String),
    #[error("missing value in column '{column}' at row {row} ({timestamp})")]
    DataCompleteness {
        row: usize,
        column: String,
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelPolicy {
    #[default]
    ExcludeFromFeatures,
    RetainInFeatures,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowTensors {
    pub features: Array3<f32>,
    pub labels: Array3<f32>,
    pub feature_columns: Vec<String>,
    pub label_columns: Vec<String>,
}

impl WindowTensors {
    pub fn num_windows(&self) -> usize {
        self.features.dim().0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowGenerator {
    input_width: usize,
    output_width: usize,
    offset: usize,
    label_columns: Vec<String>,
    label_policy: LabelPolicy,
}

impl WindowGenerator {
    pub fn new<I, S>(
        input_width: usize,
        output_width: usize,
        offset: usize,
        label_columns: I,
    ) -> Result<Self, WindowError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if input_width == 0 || output_width == 0 || offset == 0 {
            return Err(WindowError::InvalidConfiguration(format!(
                "input width, output width and offset must all be > 0 \
                 (got {input_width}, {output_width}, {offset})"
            )));
        }
        if input_width
            .checked_add(offset)
            .and_then(|sum| sum.checked_add(output_width))
            .is_none()
        {
            return Err(WindowError::InvalidConfiguration(format!(
                "window size {input_width} + {offset} + {output_width} overflows usize"
            )));
        }

        let label_columns: Vec<String> = label_columns.into_iter().map(Into::into).collect();
        if label_columns.is_empty() {
            return Err(WindowError::InvalidConfiguration(
                "at least one label column is required".to_string(),
            ));
        }
        for (idx, name) in label_columns.iter().enumerate() {
            if label_columns[..idx].contains(name) {
                return Err(WindowError::InvalidConfiguration(format!(
                    "label column '{name}' is listed more than once"
                )));
            }
        }

        Ok(Self {
            input_width,
            output_width,
            offset,
            label_columns,
            label_policy: LabelPolicy::default(),
        })
    }

    pub fn with_label_policy(mut self, label_policy: LabelPolicy) -> Self {
        self.label_policy = label_policy;
        self
    }

    pub fn input_width(&self) -> usize {
        self.input_width
    }

    pub fn output_width(&self) -> usize {
        self.output_width
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn label_columns(&self) -> &[String] {
        &self.label_columns
    }

    pub fn label_policy(&self) -> LabelPolicy {
        self.label_policy
    }

    pub fn window_size(&self) -> usize {
        self.input_width + self.offset + self.output_width
    }

    pub fn num_windows(&self, rows: usize) -> usize {
        rows.saturating_sub(self.window_size())
    }

    pub fn generate(&self, table: &Table) -> Result<WindowTensors, WindowError> {
        let schema = table.schema();
        let label_idx = self
            .label_columns
            .iter()
            .map(|name| {
                schema.position(name).ok_or_else(|| {
                    WindowError::InvalidConfiguration(format!(
                        "label column '{name}' is not in the table schema"
                    ))
                })
            })
            .collect::<Result<Vec<usize>, WindowError>>()?;
        let feature_idx: Vec<usize> = (0..schema.len())
            .filter(|idx| {
                self.label_policy == LabelPolicy::RetainInFeatures || !label_idx.contains(idx)
            })
            .collect();

        let columns: Vec<(&str, &[Option<f64>])> = table.columns().collect();
        let windows = self.num_windows(table.len());
        let mut features = Array3::<f32>::zeros((windows, self.input_width, feature_idx.len()));
        let mut labels = Array3::<f32>::zeros((windows, self.output_width, label_idx.len()));
        let label_offset = self.input_width + self.offset;

        for start in 0..windows {
            for step in 0..self.input_width {
                let row = start + step;
                for (slot, &col) in feature_idx.iter().enumerate() {
                    features[[start, step, slot]] = cell(table, &columns, row, col)? as f32;
                }
            }
            for step in 0..self.output_width {
                let row = start + label_offset + step;
                for (slot, &col) in label_idx.iter().enumerate() {
                    labels[[start, step, slot]] = cell(table, &columns, row, col)? as f32;
                }
            }
        }

        info!(
            component = "window",
            event = "window.generate.finish",
            rows = table.len(),
            windows,
            window_size = self.window_size(),
            feature_shape = ?features.dim(),
            label_shape = ?labels.dim(),
            label_policy = ?self.label_policy
        );

        Ok(WindowTensors {
            features,
            labels,
            feature_columns: feature_idx
                .iter()
                .map(|&idx| schema.columns()[idx].clone())
                .collect(),
            label_columns: self.label_columns.clone(),
        })
    }
}

fn cell(
    table: &Table,
    columns: &[(&str, &[Option<f64>])],
    row: usize,
    col: usize,
) -> Result<f64, WindowError> {
    let (name, values) = columns[col];
    values[row].ok_or_else(|| WindowError::DataCompleteness {
        row,
        column: name.to_string(),
        timestamp: table.timestamps()[row],
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::table::ColumnSchema;

    // Columns `A..E`; cell value = `row * 10 + column index`.
    fn grid(rows: usize) -> Table {
        let names = ["A", "B", "C", "D", "E"];
        let schema =
            ColumnSchema::new("Date Time", names.iter().map(|n| n.to_string()).collect()).unwrap();
        let start = Utc.with_ymd_and_hms(2010, 10, 10, 20, 0, 0).unwrap();
        let timestamps = (0..rows)
            .map(|r| start + Duration::hours(r as i64))
            .collect();
        let columns = (0..names.len())
            .map(|c| (0..rows).map(|r| Some((r * 10 + c) as f64)).collect())
            .collect();
        Table::new(Arc::new(schema), timestamps, columns).unwrap()
    }

    #[test]
    fn rejects_non_positive_parameters_and_bad_labels() {
        for (input, output, offset) in [(0, 1, 5), (10, 0, 5), (10, 1, 0)] {
            let err = WindowGenerator::new(input, output, offset, ["D"]).unwrap_err();
            assert!(matches!(err, WindowError::InvalidConfiguration(_)));
        }
        assert!(matches!(
            WindowGenerator::new(1, 1, 1, Vec::<String>::new()).unwrap_err(),
            WindowError::InvalidConfiguration(_)
        ));
        assert!(matches!(
            WindowGenerator::new(1, 1, 1, ["D", "D"]).unwrap_err(),
            WindowError::InvalidConfiguration(_)
        ));
    }

    #[test]
    fn rejects_window_size_overflow() {
        let overflowing = [(usize::MAX, 1, 1), (1, usize::MAX, 1), (2, 2, usize::MAX - 3)];
        for (input, output, offset) in overflowing {
            let err = WindowGenerator::new(input, output, offset, ["x"]).unwrap_err();
            assert!(matches!(err, WindowError::InvalidConfiguration(_)));
        }
        let widest = WindowGenerator::new(usize::MAX - 2, 1, 1, ["x"]).unwrap();
        assert_eq!(widest.window_size(), usize::MAX);
        assert_eq!(widest.num_windows(10), 0);
    }

    #[test]
    fn window_size_and_count() {
        let generator = WindowGenerator::new(10, 1, 5, ["D"]).unwrap();
        assert_eq!(generator.window_size(), 16);
        assert_eq!(generator.num_windows(100), 84);
        assert_eq!(generator.num_windows(16), 0);
        assert_eq!(generator.num_windows(3), 0);
    }

    #[test]
    fn windows_pick_feature_and_label_rows() {
        let generator = WindowGenerator::new(3, 2, 2, ["D"]).unwrap();
        let tensors = generator.generate(&grid(10)).unwrap();

        assert_eq!(tensors.num_windows(), 3);
        assert_eq!(tensors.features.dim(), (3, 3, 4));
        assert_eq!(tensors.labels.dim(), (3, 2, 1));
        assert_eq!(tensors.feature_columns, ["A", "B", "C", "E"]);
        assert_eq!(tensors.label_columns, ["D"]);

        // window 1, second input row (row 2), column E
        assert_eq!(tensors.features[[1, 1, 3]], 24.0);
        // window 2 labels start at row 2 + 3 + 2 = 7
        assert_eq!(tensors.labels[[2, 0, 0]], 73.0);
        assert_eq!(tensors.labels[[2, 1, 0]], 83.0);
    }

    #[test]
    fn retain_policy_keeps_label_columns_in_features() {
        let generator = WindowGenerator::new(2, 1, 1, ["B"])
            .unwrap()
            .with_label_policy(LabelPolicy::RetainInFeatures);
        let tensors = generator.generate(&grid(6)).unwrap();

        assert_eq!(tensors.features.dim(), (2, 2, 5));
        assert_eq!(tensors.features[[0, 1, 1]], 11.0);
        assert_eq!(tensors.labels[[1, 0, 0]], 41.0);
    }

    #[test]
    fn short_table_yields_empty_tensors() {
        let generator = WindowGenerator::new(10, 1, 5, ["D"]).unwrap();
        let tensors = generator.generate(&grid(16)).unwrap();
        assert_eq!(tensors.features.dim(), (0, 10, 4));
        assert_eq!(tensors.labels.dim(), (0, 1, 1));
    }

    #[test]
    fn unknown_label_column_is_rejected() {
        let generator = WindowGenerator::new(2, 1, 1, ["Z"]).unwrap();
        assert!(matches!(
            generator.generate(&grid(10)).unwrap_err(),
            WindowError::InvalidConfiguration(_)
        ));
    }

    #[test]
    fn clone_is_independent() {
        let original = WindowGenerator::new(4, 2, 3, ["A", "C"]).unwrap();
        let copy = original.clone().with_label_policy(LabelPolicy::RetainInFeatures);

        assert_eq!(original.label_policy(), LabelPolicy::ExcludeFromFeatures);
        assert_eq!(copy.window_size(), original.window_size());
        assert_eq!(copy.label_columns(), original.label_columns());
    }
}
