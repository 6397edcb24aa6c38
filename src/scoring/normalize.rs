use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::error::{DataError, PipelineError};
use crate::table::PopulationTable;

/// Observed bounds of one column over the current population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnRange {
    pub min: f64,
    pub max: f64,
}

impl ColumnRange {
    pub fn fit(values: &[f64]) -> Option<Self> {
        let (first, rest) = values.split_first()?;
        Some(rest.iter().fold(
            ColumnRange {
                min: *first,
                max: *first,
            },
            |range, &v| ColumnRange {
                min: range.min.min(v),
                max: range.max.max(v),
            },
        ))
    }

    /// Min-max scale into [0, 1]. A zero-variance column scales to 0.0.
    pub fn scale(&self, value: f64) -> f64 {
        if self.max == self.min {
            0.0
        } else {
            (value - self.min) / (self.max - self.min)
        }
    }
}

/// Rescale each column in place with min-max scaling fit on the whole
/// table. Fitting and applying happen in the same pass.
pub fn normalize_min_max(
    table: &mut PopulationTable,
    columns: &[String],
) -> Result<BTreeMap<String, ColumnRange>, PipelineError> {
    let mut ranges = BTreeMap::new();

    for column in columns {
        let idx = table.require_column(column)?;
        let values = table
            .numeric_column(idx)?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.ok_or_else(|| DataError::MissingValue {
                    row: row + 1,
                    column: column.clone(),
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let range = ColumnRange::fit(&values).ok_or_else(|| DataError::InsufficientData {
            column: column.clone(),
        })?;
        let scaled: Vec<f64> = values.iter().map(|&v| range.scale(v)).collect();
        table.set_numeric_column(idx, &scaled);

        debug!(column = column.as_str(), min = range.min, max = range.max, "normalized");
        ranges.insert(column.clone(), range);
    }

    Ok(ranges)
}
