use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::compensation::{
    range_rules, CompensationTables, CLASSIC_ERA_STEPS, DEFAULT_OVERRIDE_NAME,
    ERA_FACTOR_NAME, EXTENDED_ERA_STEPS, HEIGHT_FACTOR_NAME, HEIGHT_STEPS,
};
use super::engine::WeightTable;
use super::factors::{parse_multiplier, FactorRule, FactorTable, RangeOp};
use crate::error::{ConfigError, PipelineError};
use crate::table::{HEIGHT_COLUMN, PEAK_YEAR_COLUMN, PLAYER_COLUMN};

/// The fourteen KPI columns, in display order.
pub const KPI_COLUMNS: [&str; 14] = [
    "MVP_Share_1st",
    "DPOY",
    "Titles",
    "Finals_MVP",
    "Top3_VORP_Sum",
    "Playoff_WS",
    "Top3_WS48_Sum",
    "Career_WS",
    "AllNBA_1st",
    "AllNBA_2nd",
    "AllDefense_1st",
    "AllDefense_2nd",
    "AllStar",
    "Height",
];

pub const DEFAULT_TOP_N: usize = 100;

/// Named era tier tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EraPreset {
    /// 1982+ / 1975+ / earlier
    Classic,
    /// 1982+ / 1975+ / 1965+ / 1955+ / earlier
    #[default]
    Extended,
}

impl EraPreset {
    pub fn steps(self) -> &'static [(RangeOp, f64)] {
        match self {
            EraPreset::Classic => &CLASSIC_ERA_STEPS,
            EraPreset::Extended => &EXTENDED_ERA_STEPS,
        }
    }

    pub fn buckets(self) -> Vec<Bucket> {
        Bucket::from_steps(self.steps())
    }
}

/// Main scoring configuration.
///
/// Every field is optional; anything left out falls back to the built-in
/// tables. Ranges and effects use the same mini-language everywhere.
///
/// Example YAML:
/// ```yaml
/// scoring:
///   top_n: 50
///   weights:
///     MVP_Share_1st: 3.0
///     AllStar: 1.0
///   era:
///     preset: classic
///   height:
///     buckets:
///       - { range: "<=72", effect: "x1.12" }
///       - { range: ">72", effect: "x1" }
///   overrides:
///     name: ABA
///     players:
///       - { player: "Julius Erving", effect: "x0.95" }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    /// KPI columns to normalize and score, in order
    #[serde(default)]
    pub kpis: Option<Vec<String>>,

    /// Weight per KPI column. Defaults to the built-in weights of the
    /// configured KPIs.
    #[serde(default)]
    pub weights: Option<BTreeMap<String, f64>>,

    /// Era factor: a preset or explicit buckets over the peak year
    #[serde(default)]
    pub era: Option<EraConfig>,

    /// Height factor buckets over height in inches
    #[serde(default)]
    pub height: Option<StepConfig>,

    /// Exact-match per-player multipliers
    #[serde(default)]
    pub overrides: Option<OverrideConfig>,

    /// Number of ranked rows to keep (default: 100)
    #[serde(default)]
    pub top_n: Option<usize>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            kpis: Some(KPI_COLUMNS.iter().map(|k| k.to_string()).collect()),
            weights: Some(WeightTable::default().as_map().clone()),
            era: Some(EraConfig {
                preset: None,
                column: Some(PEAK_YEAR_COLUMN.to_string()),
                buckets: Some(EraPreset::Extended.buckets()),
            }),
            height: Some(StepConfig {
                column: Some(HEIGHT_COLUMN.to_string()),
                buckets: Some(Bucket::from_steps(&HEIGHT_STEPS)),
            }),
            overrides: Some(OverrideConfig {
                name: Some(DEFAULT_OVERRIDE_NAME.to_string()),
                column: Some(PLAYER_COLUMN.to_string()),
                players: Some(Vec::new()),
            }),
            top_n: Some(DEFAULT_TOP_N),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct EraConfig {
    /// Named tier table; mutually exclusive with `buckets`
    #[serde(default)]
    pub preset: Option<EraPreset>,

    /// Column holding the peak year (default: Peak_Year)
    #[serde(default)]
    pub column: Option<String>,

    #[serde(default)]
    pub buckets: Option<Vec<Bucket>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    #[serde(default)]
    pub column: Option<String>,

    #[serde(default)]
    pub buckets: Option<Vec<Bucket>>,
}

/// Range bucket: first bucket whose range matches sets the factor.
/// Range format: "<N", "<=N", ">N", ">=N", "N-M" (inclusive range)
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Bucket {
    pub range: String,

    /// Multiplier, e.g. "x0.96"
    pub effect: String,
}

impl Bucket {
    fn from_steps(steps: &[(RangeOp, f64)]) -> Vec<Bucket> {
        steps
            .iter()
            .map(|(range, multiplier)| Bucket {
                range: range.to_string(),
                effect: format!("x{}", multiplier),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct OverrideConfig {
    /// Prefix of the derived `<name>_Factor` column (default: ABA)
    #[serde(default)]
    pub name: Option<String>,

    /// Column matched against `player` (default: Player)
    #[serde(default)]
    pub column: Option<String>,

    #[serde(default)]
    pub players: Option<Vec<PlayerOverride>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PlayerOverride {
    /// Exact, case-sensitive identity
    pub player: String,

    pub effect: String,
}

/// Fully resolved configuration handed to the pipeline entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub kpis: Vec<String>,
    pub weights: WeightTable,
    pub compensation: CompensationTables,
    pub top_n: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::with_era_preset(EraPreset::default())
    }
}

impl PipelineConfig {
    /// Built-in tables with the given era tiers.
    pub fn with_era_preset(preset: EraPreset) -> Self {
        let mut compensation = CompensationTables::default();
        compensation.era.rules = range_rules(preset.steps());
        Self {
            kpis: KPI_COLUMNS.iter().map(|k| k.to_string()).collect(),
            weights: WeightTable::default(),
            compensation,
            top_n: DEFAULT_TOP_N,
        }
    }

    /// Resolve a scoring config. Syntax problems are reported together as
    /// [`ConfigError::Invalid`]; consistency problems as their own variant.
    pub fn from_scoring(config: &ScoringConfig) -> Result<Self, PipelineError> {
        let resolved = config.compile().map_err(ConfigError::Invalid)?;
        resolved.validate()?;
        Ok(resolved)
    }

    /// First consistency problem, if any.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.problems().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Every consistency problem.
    pub fn problems(&self) -> Vec<ConfigError> {
        let mut problems = Vec::new();
        if self.top_n == 0 {
            problems.push(ConfigError::InvalidTopN);
        }
        for (column, _) in self.weights.iter() {
            if !self.kpis.iter().any(|k| k == column) {
                problems.push(ConfigError::UnknownWeightColumn(column.to_string()));
            }
        }
        problems
    }

    /// Numeric columns filled by the imputer: the KPIs plus the columns the
    /// era and height tables read.
    pub fn impute_columns(&self) -> Vec<String> {
        let mut columns = self.kpis.clone();
        for extra in [&self.compensation.era.column, &self.compensation.height.column] {
            if !columns.contains(extra) {
                columns.push(extra.clone());
            }
        }
        columns
    }

    /// Every column the pipeline reads, identity first.
    pub fn required_columns(&self) -> Vec<String> {
        let mut columns = vec![PLAYER_COLUMN.to_string()];
        let sources = self.compensation.tables().map(|t| t.column.clone());
        for column in self.kpis.iter().chain(sources.iter()) {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
        columns
    }
}

impl ScoringConfig {
    /// Build typed tables, collecting every syntax problem.
    pub fn compile(&self) -> Result<PipelineConfig, Vec<String>> {
        let mut errors = Vec::new();

        let kpis: Vec<String> = self
            .kpis
            .clone()
            .unwrap_or_else(|| KPI_COLUMNS.iter().map(|k| k.to_string()).collect());
        if kpis.is_empty() {
            errors.push("scoring.kpis: must list at least one column".to_string());
        }
        let mut seen = HashSet::new();
        for kpi in &kpis {
            if !seen.insert(kpi) {
                errors.push(format!("scoring.kpis: '{}' is listed twice", kpi));
            }
        }

        let weights = match &self.weights {
            Some(map) => {
                for (column, weight) in map {
                    if !weight.is_finite() {
                        errors.push(format!(
                            "scoring.weights.{}: must be a finite number",
                            column
                        ));
                    }
                }
                WeightTable::from(map.clone())
            }
            None => WeightTable::default().restricted_to(&kpis),
        };

        let era_config = self.era.clone().unwrap_or_default();
        let era_rules = match (&era_config.preset, &era_config.buckets) {
            (Some(_), Some(_)) => {
                errors.push("scoring.era: set either preset or buckets, not both".to_string());
                Vec::new()
            }
            (None, Some(buckets)) => {
                compile_buckets("scoring.era.buckets", buckets, &mut errors)
            }
            (preset, None) => range_rules(preset.unwrap_or_default().steps()),
        };

        let height_config = self.height.clone().unwrap_or_default();
        let height_rules = match &height_config.buckets {
            Some(buckets) => compile_buckets("scoring.height.buckets", buckets, &mut errors),
            None => range_rules(&HEIGHT_STEPS),
        };

        let override_config = self.overrides.clone().unwrap_or_default();
        let override_rules = compile_overrides(
            override_config.players.as_deref().unwrap_or_default(),
            &mut errors,
        );

        let compensation = CompensationTables {
            era: FactorTable::new(
                ERA_FACTOR_NAME,
                era_config.column.unwrap_or_else(|| PEAK_YEAR_COLUMN.to_string()),
                era_rules,
            ),
            height: FactorTable::new(
                HEIGHT_FACTOR_NAME,
                height_config.column.unwrap_or_else(|| HEIGHT_COLUMN.to_string()),
                height_rules,
            ),
            identity: FactorTable::new(
                override_config
                    .name
                    .unwrap_or_else(|| DEFAULT_OVERRIDE_NAME.to_string()),
                override_config
                    .column
                    .unwrap_or_else(|| PLAYER_COLUMN.to_string()),
                override_rules,
            ),
        };

        let name = &compensation.identity.name;
        if name.trim().is_empty() {
            errors.push("scoring.overrides.name: must not be empty".to_string());
        } else if name == ERA_FACTOR_NAME || name == HEIGHT_FACTOR_NAME {
            errors.push(format!(
                "scoring.overrides.name: '{}' clashes with a built-in factor column",
                name
            ));
        }

        if errors.is_empty() {
            Ok(PipelineConfig {
                kpis,
                weights,
                compensation,
                top_n: self.top_n.unwrap_or(DEFAULT_TOP_N),
            })
        } else {
            Err(errors)
        }
    }
}

fn compile_buckets(path: &str, buckets: &[Bucket], errors: &mut Vec<String>) -> Vec<FactorRule> {
    let mut rules = Vec::with_capacity(buckets.len());
    for (i, bucket) in buckets.iter().enumerate() {
        let range = RangeOp::parse(&bucket.range).map_err(|e| {
            format!("{}[{}].range: invalid '{}' - {}", path, i, bucket.range, e)
        });
        let multiplier = parse_multiplier(&bucket.effect).map_err(|e| {
            format!("{}[{}].effect: invalid '{}' - {}", path, i, bucket.effect, e)
        });
        match (range, multiplier) {
            (Ok(range), Ok(multiplier)) => rules.push(FactorRule::range(range, multiplier)),
            (range, multiplier) => {
                errors.extend(range.err());
                errors.extend(multiplier.err());
            }
        }
    }
    rules
}

fn compile_overrides(players: &[PlayerOverride], errors: &mut Vec<String>) -> Vec<FactorRule> {
    let mut rules = Vec::with_capacity(players.len());
    let mut seen = HashSet::new();
    for (i, entry) in players.iter().enumerate() {
        if entry.player.trim().is_empty() {
            errors.push(format!("scoring.overrides.players[{}].player: must not be empty", i));
            continue;
        }
        if !seen.insert(entry.player.as_str()) {
            errors.push(format!(
                "scoring.overrides.players[{}].player: '{}' is listed twice",
                i, entry.player
            ));
            continue;
        }
        match parse_multiplier(&entry.effect) {
            Ok(multiplier) => rules.push(FactorRule::exact(entry.player.clone(), multiplier)),
            Err(e) => errors.push(format!(
                "scoring.overrides.players[{}].effect: invalid '{}' - {}",
                i, entry.effect, e
            )),
        }
    }
    rules
}
