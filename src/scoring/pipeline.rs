//! Batch entry point: impute, compensate, normalize, score, rank.
//!
//! A run owns its table for its whole duration and produces either a fully
//! ranked table or an error. Statistics are fit on the table being scored
//! and are not reused across runs.

use std::collections::{BTreeMap, HashSet};

use anyhow::{bail, Result};
use serde::Serialize;
use tracing::{debug, info};

use super::compensation::compute_compensation;
use super::config::PipelineConfig;
use super::engine::{score_population, ScoreBreakdown, ScoreResult};
use super::impute::impute_means;
use super::normalize::{normalize_min_max, ColumnRange};
use super::rank::rank_order;
use crate::error::{DataError, PipelineError, SchemaError};
use crate::table::{PopulationTable, Value, PLAYER_COLUMN};

pub const COMPENSATION_COLUMN: &str = "Compensation";
pub const SCORE_COLUMN: &str = "Score";
pub const RANK_COLUMN: &str = "Rank";

/// Per-column statistics fit on the population of one run.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FeatureStatistics {
    /// Mean of present values, per imputed column
    pub means: BTreeMap<String, f64>,
    /// Pre-normalization bounds, per KPI column
    pub ranges: BTreeMap<String, ColumnRange>,
}

/// Output of a run: the top rows sorted by rank, with derived columns
/// appended after the input columns.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedTable {
    table: PopulationTable,
    results: Vec<ScoreResult>,
    statistics: FeatureStatistics,
    kpis: Vec<String>,
    factor_columns: [String; 3],
    population: usize,
}

/// Borrowed view of one ranked row.
#[derive(Debug, Clone, Copy)]
pub struct RankedRow<'a> {
    pub rank: usize,
    pub score: f64,
    pub breakdown: &'a ScoreBreakdown,
    table: &'a PopulationTable,
    index: usize,
}

impl<'a> RankedRow<'a> {
    pub fn player(&self) -> String {
        self.value(PLAYER_COLUMN)
            .map(|v| v.to_string())
            .unwrap_or_default()
    }

    pub fn value(&self, column: &str) -> Option<&'a Value> {
        self.table.value(self.index, column)
    }
}

impl RankedTable {
    pub fn table(&self) -> &PopulationTable {
        &self.table
    }

    pub fn statistics(&self) -> &FeatureStatistics {
        &self.statistics
    }

    /// KPI columns, normalized in the output table.
    pub fn kpis(&self) -> &[String] {
        &self.kpis
    }

    /// Names of the era, height and override factor columns.
    pub fn factor_columns(&self) -> &[String; 3] {
        &self.factor_columns
    }

    /// Size of the population before truncation.
    pub fn population_size(&self) -> usize {
        self.population
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<RankedRow<'_>> {
        let result = self.results.get(index)?;
        Some(RankedRow {
            rank: index + 1,
            score: result.score,
            breakdown: &result.breakdown,
            table: &self.table,
            index,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = RankedRow<'_>> {
        (0..self.len()).filter_map(move |i| self.row(i))
    }

    /// Exact-match lookup by player identity.
    pub fn find(&self, player: &str) -> Option<RankedRow<'_>> {
        self.table
            .find_row(PLAYER_COLUMN, player)
            .and_then(|i| self.row(i))
    }

    /// Look up two distinct ranked players for a side-by-side view.
    pub fn compare(
        &self,
        first: &str,
        second: &str,
    ) -> Result<(RankedRow<'_>, RankedRow<'_>)> {
        if first == second {
            bail!("Pick two different players to compare (got '{}' twice)", first);
        }
        let lookup = |name: &str| match self.find(name) {
            Some(row) => Ok(row),
            None => bail!("'{}' is not in the top {} ranking", name, self.len()),
        };
        Ok((lookup(first)?, lookup(second)?))
    }
}

/// Score and rank a population.
pub fn run_pipeline(
    mut table: PopulationTable,
    config: &PipelineConfig,
) -> Result<RankedTable, PipelineError> {
    config.validate()?;
    check_schema(&table, config)?;
    check_identities(&table)?;
    let population = table.len();
    info!(rows = population, kpis = config.kpis.len(), "scoring population");

    let means = impute_means(&mut table, &config.impute_columns())?;

    // Compensation reads Height and Peak_Year in natural units, so it runs
    // before the KPI columns are rescaled in place.
    let compensation = compute_compensation(&table, &config.compensation)?;
    let ranges = normalize_min_max(&mut table, &config.kpis)?;
    let results = score_population(&table, &config.kpis, &config.weights, &compensation)?;

    let scores: Vec<f64> = results.iter().map(|r| r.score).collect();
    let order = rank_order(&scores, config.top_n)?;

    let tables = config.compensation.tables();
    let factor_columns = tables.map(|t| t.factor_column());
    for (i, column) in factor_columns.iter().enumerate() {
        let values = compensation
            .iter()
            .map(|c| Value::Number(c.factors()[i]))
            .collect();
        table.append_column(column, values);
    }
    table.append_column(
        COMPENSATION_COLUMN,
        compensation.iter().map(|c| Value::Number(c.total())).collect(),
    );
    table.append_column(SCORE_COLUMN, scores.into_iter().map(Value::Number).collect());

    table.reorder(&order);
    let mut results: Vec<Option<ScoreResult>> = results.into_iter().map(Some).collect();
    let results: Vec<ScoreResult> = order.iter().filter_map(|&i| results[i].take()).collect();
    table.append_column(
        RANK_COLUMN,
        (1..=order.len()).map(|r| Value::Number(r as f64)).collect(),
    );

    debug!(kept = order.len(), "ranked population");
    info!(
        rows = order.len(),
        top = ?table.value(0, PLAYER_COLUMN).map(|v| v.to_string()),
        "ranking complete"
    );

    Ok(RankedTable {
        table,
        results,
        statistics: FeatureStatistics { means, ranges },
        kpis: config.kpis.clone(),
        factor_columns,
        population,
    })
}

fn check_schema(table: &PopulationTable, config: &PipelineConfig) -> Result<(), SchemaError> {
    for column in config.required_columns() {
        table.require_column(&column)?;
    }
    Ok(())
}

/// Player names must be present and unique.
fn check_identities(table: &PopulationTable) -> Result<(), PipelineError> {
    let idx = table.require_column(PLAYER_COLUMN)?;
    let mut seen = HashSet::new();
    for (row, record) in table.rows().iter().enumerate() {
        let value = record.get(idx);
        if value.is_missing() {
            return Err(DataError::MissingIdentity { row: row + 1 }.into());
        }
        let name = value.to_string();
        if !seen.insert(name.clone()) {
            return Err(DataError::DuplicateIdentity(name).into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, ErrorKind};
    use crate::scoring::config::KPI_COLUMNS;
    use crate::scoring::factors::FactorRule;
    use crate::table::{read_csv, write_csv};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn header() -> Vec<String> {
        let mut columns = vec!["Player".to_string()];
        columns.extend(KPI_COLUMNS.iter().map(|k| k.to_string()));
        columns.push("Peak_Year".to_string());
        columns.push("Team".to_string());
        columns
    }

    /// A row whose every KPI is `level`, with the given height and year.
    fn athlete(name: &str, level: f64, height: f64, year: f64) -> Vec<Value> {
        let mut cells = vec![Value::Text(name.to_string())];
        for kpi in KPI_COLUMNS {
            cells.push(Value::Number(if kpi == "Height" { height } else { level }));
        }
        cells.push(Value::Number(year));
        cells.push(Value::Text("XYZ".to_string()));
        cells
    }

    fn population(rows: Vec<Vec<Value>>) -> PopulationTable {
        let mut table = PopulationTable::new(header());
        for row in rows {
            table.push_row(row).unwrap();
        }
        table
    }

    fn small_population() -> PopulationTable {
        population(vec![
            athlete("Bench", 0.0, 80.0, 1990.0),
            athlete("Star", 10.0, 80.0, 1990.0),
            athlete("Veteran", 10.0, 80.0, 1970.0),
        ])
    }

    #[test]
    fn test_ranks_by_score() {
        let ranked = run_pipeline(small_population(), &PipelineConfig::default()).unwrap();

        let names: Vec<String> = ranked.rows().map(|r| r.player()).collect();
        assert_eq!(names, vec!["Star", "Veteran", "Bench"]);
        assert_eq!(ranked.row(0).unwrap().rank, 1);
        assert_eq!(ranked.population_size(), 3);
    }

    #[test]
    fn test_output_columns_appended_in_order() {
        let ranked = run_pipeline(small_population(), &PipelineConfig::default()).unwrap();
        let columns = ranked.table().columns();
        let tail: Vec<&str> = columns[columns.len() - 6..]
            .iter()
            .map(|c| c.as_str())
            .collect();
        assert_eq!(
            tail,
            vec!["Era_Factor", "Height_Factor", "ABA_Factor", "Compensation", "Score", "Rank"]
        );
        // Extra input columns pass through untouched.
        assert_eq!(
            ranked.table().value(0, "Team"),
            Some(&Value::Text("XYZ".to_string()))
        );
    }

    #[test]
    fn test_era_compensation_applies() {
        let ranked = run_pipeline(small_population(), &PipelineConfig::default()).unwrap();
        let star = ranked.find("Star").unwrap();
        let veteran = ranked.find("Veteran").unwrap();

        assert_eq!(veteran.value("Era_Factor"), Some(&Value::Number(0.87)));
        assert_eq!(star.value("Era_Factor"), Some(&Value::Number(1.0)));
        assert_eq!(veteran.score, star.score * 0.87);
    }

    #[test]
    fn test_height_factor_uses_inches() {
        let table = population(vec![
            athlete("Guard", 5.0, 70.0, 1995.0),
            athlete("Center", 5.0, 85.0, 1995.0),
        ]);
        let ranked = run_pipeline(table, &PipelineConfig::default()).unwrap();

        let guard = ranked.find("Guard").unwrap();
        let center = ranked.find("Center").unwrap();
        assert_eq!(guard.value("Height_Factor"), Some(&Value::Number(1.12)));
        assert_eq!(center.value("Height_Factor"), Some(&Value::Number(1.0)));
        // Height itself is a KPI and comes out normalized.
        assert_eq!(guard.value("Height"), Some(&Value::Number(0.0)));
        assert_eq!(center.value("Height"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_identity_override() {
        let mut config = PipelineConfig::default();
        config.compensation.identity.rules = vec![FactorRule::exact("Star", 0.5)];

        let ranked = run_pipeline(small_population(), &config).unwrap();
        let star = ranked.find("Star").unwrap();
        assert_eq!(star.value("ABA_Factor"), Some(&Value::Number(0.5)));
        assert_eq!(star.value("Compensation"), Some(&Value::Number(0.5)));
        assert_eq!(star.breakdown.compensation.identity, 0.5);
    }

    #[test]
    fn test_missing_kpi_is_imputed() {
        let mut bench = athlete("Bench", 0.0, 80.0, 1990.0);
        bench[13] = Value::Missing; // AllStar
        let table = population(vec![
            bench,
            athlete("Star", 10.0, 80.0, 1990.0),
            athlete("Mid", 2.0, 80.0, 1990.0),
        ]);
        let ranked = run_pipeline(table, &PipelineConfig::default()).unwrap();
        assert_eq!(ranked.statistics().means["AllStar"], 6.0);
        assert_eq!(
            ranked.statistics().ranges["Career_WS"],
            ColumnRange {
                min: 0.0,
                max: 10.0
            }
        );
        // Ranges are fit after imputation, so the filled 6 sits inside.
        assert_eq!(
            ranked.statistics().ranges["AllStar"],
            ColumnRange {
                min: 2.0,
                max: 10.0
            }
        );
        // The imputed 6 sits halfway between the observed 2 and 10.
        let bench = ranked.find("Bench").unwrap();
        assert_eq!(bench.value("AllStar"), Some(&Value::Number(0.5)));
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let mut table =
            PopulationTable::new(vec!["Player".to_string(), "AllStar".to_string()]);
        table
            .push_row(vec![Value::Text("Solo".to_string()), Value::Number(1.0)])
            .unwrap();
        let err = run_pipeline(table, &PipelineConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(
            err,
            PipelineError::Schema(SchemaError::MissingColumn("MVP_Share_1st".to_string()))
        );
    }

    #[test]
    fn test_empty_kpi_column_is_data_error() {
        let rows = (0..3)
            .map(|i| {
                let mut row = athlete(&format!("P{}", i), 1.0, 80.0, 1990.0);
                row[2] = Value::Missing; // DPOY
                row
            })
            .collect();
        let err = run_pipeline(population(rows), &PipelineConfig::default()).unwrap_err();
        assert_eq!(
            err,
            PipelineError::Data(DataError::InsufficientData {
                column: "DPOY".to_string()
            })
        );
    }

    #[test]
    fn test_duplicate_player_is_data_error() {
        let table = population(vec![
            athlete("Twin", 1.0, 80.0, 1990.0),
            athlete("Twin", 2.0, 80.0, 1990.0),
        ]);
        let err = run_pipeline(table, &PipelineConfig::default()).unwrap_err();
        assert_eq!(
            err,
            PipelineError::Data(DataError::DuplicateIdentity("Twin".to_string()))
        );
    }

    #[test]
    fn test_zero_top_n_is_config_error() {
        let config = PipelineConfig {
            top_n: 0,
            ..PipelineConfig::default()
        };
        let err = run_pipeline(small_population(), &config).unwrap_err();
        assert_eq!(err, PipelineError::Config(ConfigError::InvalidTopN));
    }

    #[test]
    fn test_top_100_of_150() {
        let rows = (0..150)
            .map(|i| {
                athlete(
                    &format!("Player {}", i),
                    (i % 37) as f64,
                    70.0 + (i % 15) as f64,
                    1950.0 + (i % 50) as f64,
                )
            })
            .collect();
        let ranked = run_pipeline(population(rows), &PipelineConfig::default()).unwrap();

        assert_eq!(ranked.len(), 100);
        let ranks: Vec<usize> = ranked.rows().map(|r| r.rank).collect();
        assert_eq!(ranks, (1..=100).collect::<Vec<_>>());
        for pair in ranked.rows().collect::<Vec<_>>().windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(ranked.table().value(99, "Rank"), Some(&Value::Number(100.0)));
    }

    #[test]
    fn test_equal_scores_keep_input_order() {
        let table = population(vec![
            athlete("Zeta", 3.0, 80.0, 1990.0),
            athlete("Low", 1.0, 80.0, 1990.0),
            athlete("Alpha", 3.0, 80.0, 1990.0),
        ]);
        let ranked = run_pipeline(table, &PipelineConfig::default()).unwrap();
        let names: Vec<String> = ranked.rows().map(|r| r.player()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Low"]);
    }

    /// Write a table out as CSV and read it back, as a file load would.
    fn through_csv(table: &PopulationTable) -> PopulationTable {
        let mut buf = Vec::new();
        write_csv(table, &mut buf).unwrap();
        read_csv(buf.as_slice()).unwrap()
    }

    #[test]
    fn test_numeric_looking_names_stay_distinct() {
        let table = through_csv(&population(vec![
            athlete("007", 4.0, 80.0, 1990.0),
            athlete("1", 8.0, 80.0, 1990.0),
            athlete("1.0", 2.0, 80.0, 1990.0),
        ]));
        let ranked = run_pipeline(table, &PipelineConfig::default()).unwrap();

        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked.find("007").unwrap().rank, 2);
        assert_eq!(ranked.find("1").unwrap().rank, 1);
        assert_eq!(ranked.find("1.0").unwrap().player(), "1.0");

        let (a, b) = ranked.compare("1", "1.0").unwrap();
        assert_eq!((a.rank, b.rank), (1, 3));
    }

    #[test]
    fn test_infinite_kpi_cell_is_data_error() {
        let mut bench = athlete("Bench", 1.0, 80.0, 1990.0);
        bench[13] = Value::Text("inf".to_string()); // AllStar, as written in a file
        let table = through_csv(&population(vec![
            athlete("Star", 3.0, 80.0, 1990.0),
            bench,
        ]));
        let err = run_pipeline(table, &PipelineConfig::default()).unwrap_err();
        assert_eq!(
            err,
            PipelineError::Data(DataError::NotNumeric {
                row: 2,
                column: "AllStar".to_string(),
                value: "inf".to_string()
            })
        );
    }

    #[test]
    fn test_infinite_number_is_data_error() {
        let mut star = athlete("Star", 3.0, 80.0, 1990.0);
        star[5] = Value::Number(f64::NEG_INFINITY); // Top3_VORP_Sum
        let table = population(vec![star, athlete("Bench", 1.0, 80.0, 1990.0)]);
        let err = run_pipeline(table, &PipelineConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Data);
    }

    #[test]
    fn test_compare_lookup() {
        let ranked = run_pipeline(small_population(), &PipelineConfig::default()).unwrap();
        let (a, b) = ranked.compare("Bench", "Star").unwrap();
        assert_eq!(a.player(), "Bench");
        assert_eq!(b.rank, 1);

        assert!(ranked.compare("Star", "Star").is_err());
        assert!(ranked.compare("Star", "Nobody").is_err());
    }

    #[test]
    fn test_run_is_deterministic() {
        let csv_text = {
            let mut buf = Vec::new();
            write_csv(&small_population(), &mut buf).unwrap();
            buf
        };
        let render = || {
            let table = read_csv(csv_text.as_slice()).unwrap();
            let ranked = run_pipeline(table, &PipelineConfig::default()).unwrap();
            let mut out = Vec::new();
            write_csv(ranked.table(), &mut out).unwrap();
            out
        };
        assert_eq!(render(), render());
    }

    proptest! {
        /// Property: ranks are 1..=min(N, population) and scores never
        /// increase down the ranking.
        #[test]
        fn ranking_is_dense_and_monotone(
            levels in prop::collection::vec((0u8..20, 66u8..90, 1940u16..2020), 1..40),
            top_n in 1usize..50,
        ) {
            let rows = levels
                .iter()
                .enumerate()
                .map(|(i, &(level, height, year))| {
                    athlete(&format!("P{}", i), level as f64, height as f64, year as f64)
                })
                .collect();
            let config = PipelineConfig { top_n, ..PipelineConfig::default() };
            let ranked = run_pipeline(population(rows), &config).unwrap();

            prop_assert_eq!(ranked.len(), top_n.min(levels.len()));
            let rows: Vec<_> = ranked.rows().collect();
            for (i, row) in rows.iter().enumerate() {
                prop_assert_eq!(row.rank, i + 1);
                prop_assert_eq!(row.value("Rank"), Some(&Value::Number((i + 1) as f64)));
            }
            for pair in rows.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
        }
    }
}
