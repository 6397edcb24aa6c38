use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use super::compensation::Compensation;
use crate::error::{ConfigError, DataError, PipelineError};
use crate::table::{PopulationTable, Value};

/// Default weight per KPI column.
pub const DEFAULT_WEIGHTS: [(&str, f64); 14] = [
    ("MVP_Share_1st", 2.6),
    ("DPOY", 0.35),
    ("Titles", 0.5),
    ("Finals_MVP", 1.0),
    ("AllNBA_1st", 1.5),
    ("AllDefense_1st", 0.6),
    ("AllStar", 1.0),
    ("Top3_VORP_Sum", 1.0),
    ("Top3_WS48_Sum", 1.0),
    ("Career_WS", 1.5),
    ("Playoff_WS", 1.0),
    ("AllNBA_2nd", 0.75),
    ("AllDefense_2nd", 0.3),
    ("Height", 0.2),
];

/// Weight per KPI column.
///
/// Entries are kept sorted by column name, so the weighted sum is always
/// accumulated in the same order no matter where the table came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightTable(BTreeMap<String, f64>);

impl Default for WeightTable {
    fn default() -> Self {
        Self(
            DEFAULT_WEIGHTS
                .iter()
                .map(|(column, weight)| (column.to_string(), *weight))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, f64>> for WeightTable {
    fn from(weights: BTreeMap<String, f64>) -> Self {
        Self(weights)
    }
}

impl WeightTable {
    pub fn get(&self, column: &str) -> Option<f64> {
        self.0.get(column).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(c, w)| (c.as_str(), *w))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop entries for columns outside `kpis`.
    pub fn restricted_to(&self, kpis: &[String]) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(column, _)| kpis.contains(column))
                .map(|(c, w)| (c.clone(), *w))
                .collect(),
        )
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiContribution {
    pub kpi: String,
    pub weight: f64,
    pub normalized: f64,
    pub weighted: f64, // weight * normalized
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub weighted_sum: f64,
    pub compensation: Compensation,
    pub contributions: Vec<KpiContribution>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Combine one row's weighted contributions with its compensation.
pub fn calculate_score(
    contributions: Vec<KpiContribution>,
    compensation: Compensation,
) -> ScoreResult {
    let weighted_sum: f64 = contributions.iter().map(|c| c.weighted).sum();
    ScoreResult {
        score: weighted_sum * compensation.total(),
        breakdown: ScoreBreakdown {
            weighted_sum,
            compensation,
            contributions,
        },
    }
}

/// Score every row of a normalized table, in row order.
///
/// `kpis` is the normalized feature set; a weight for any other column is a
/// configuration error.
pub fn score_population(
    table: &PopulationTable,
    kpis: &[String],
    weights: &WeightTable,
    compensation: &[Compensation],
) -> Result<Vec<ScoreResult>, PipelineError> {
    let mut lookup = Vec::with_capacity(weights.len());
    for (column, weight) in weights.iter() {
        if !kpis.iter().any(|k| k == column) {
            return Err(ConfigError::UnknownWeightColumn(column.to_string()).into());
        }
        lookup.push((column, table.require_column(column)?, weight));
    }

    let results = table
        .rows()
        .iter()
        .zip(compensation)
        .enumerate()
        .map(|(row, (record, comp))| -> Result<ScoreResult, PipelineError> {
            let contributions = lookup
                .iter()
                .map(|&(column, idx, weight)| -> Result<KpiContribution, DataError> {
                    let normalized = feature_value(record.get(idx), row, column)?;
                    Ok(KpiContribution {
                        kpi: column.to_string(),
                        weight,
                        normalized,
                        weighted: weight * normalized,
                    })
                })
                .collect::<Result<Vec<_>, DataError>>()?;
            Ok(calculate_score(contributions, *comp))
        })
        .collect::<Result<Vec<_>, PipelineError>>()?;

    debug!(rows = results.len(), weights = lookup.len(), "scored population");
    Ok(results)
}

fn feature_value(value: &Value, row: usize, column: &str) -> Result<f64, DataError> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Missing => Err(DataError::MissingValue {
            row: row + 1,
            column: column.to_string(),
        }),
        Value::Text(s) => Err(DataError::NotNumeric {
            row: row + 1,
            column: column.to_string(),
            value: s.clone(),
        }),
    }
}
