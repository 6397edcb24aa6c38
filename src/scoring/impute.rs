use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{DataError, PipelineError};
use crate::table::PopulationTable;

/// Fill missing cells in each column with the mean of that column's
/// present values. Returns the mean used for every column.
///
/// Columns are independent of each other. A column with no present value
/// at all cannot be averaged and aborts with [`DataError::InsufficientData`].
pub fn impute_means(
    table: &mut PopulationTable,
    columns: &[String],
) -> Result<BTreeMap<String, f64>, PipelineError> {
    let mut means = BTreeMap::new();

    for column in columns {
        let idx = table.require_column(column)?;
        let values = table.numeric_column(idx)?;

        let present: Vec<f64> = values.iter().flatten().copied().collect();
        if present.is_empty() {
            return Err(DataError::InsufficientData {
                column: column.clone(),
            }
            .into());
        }
        let mean = present.iter().sum::<f64>() / present.len() as f64;

        let missing = values.len() - present.len();
        if missing > 0 {
            let filled: Vec<f64> = values.iter().map(|v| v.unwrap_or(mean)).collect();
            table.set_numeric_column(idx, &filled);
            debug!(column = column.as_str(), missing, mean, "imputed missing values");
        }

        means.insert(column.clone(), mean);
    }

    Ok(means)
}
