//! Era, height and identity compensation.
//!
//! Each sub-factor is a [`FactorTable`] lookup over one column of the row;
//! the row's compensation is their product. Nothing here looks across rows.

use tracing::debug;

use super::factors::{FactorRule, FactorTable, RangeOp};
use crate::error::SchemaError;
use crate::table::{PopulationTable, Value, HEIGHT_COLUMN, PEAK_YEAR_COLUMN, PLAYER_COLUMN};

/// Five-tier era table. Later peaks sit closer to 1.0.
pub const EXTENDED_ERA_STEPS: [(RangeOp, f64); 5] = [
    (RangeOp::GreaterEqual(1982.0), 1.00),
    (RangeOp::GreaterEqual(1975.0), 0.96),
    (RangeOp::GreaterEqual(1965.0), 0.87),
    (RangeOp::GreaterEqual(1955.0), 0.75),
    (RangeOp::LessThan(1955.0), 0.60),
];

/// Three-tier era table.
pub const CLASSIC_ERA_STEPS: [(RangeOp, f64); 3] = [
    (RangeOp::GreaterEqual(1982.0), 1.00),
    (RangeOp::GreaterEqual(1975.0), 0.96),
    (RangeOp::LessThan(1975.0), 0.87),
];

/// Shorter players get a bonus; anyone over 77 inches is neutral.
pub const HEIGHT_STEPS: [(RangeOp, f64); 4] = [
    (RangeOp::LessEqual(72.0), 1.12),
    (RangeOp::LessEqual(74.0), 1.06),
    (RangeOp::LessEqual(77.0), 1.02),
    (RangeOp::GreaterThan(77.0), 1.00),
];

pub const ERA_FACTOR_NAME: &str = "Era";
pub const HEIGHT_FACTOR_NAME: &str = "Height";
/// Identity overrides historically corrected for play in the ABA.
pub const DEFAULT_OVERRIDE_NAME: &str = "ABA";

pub fn range_rules(steps: &[(RangeOp, f64)]) -> Vec<FactorRule> {
    steps
        .iter()
        .map(|(range, multiplier)| FactorRule::range(range.clone(), *multiplier))
        .collect()
}

/// The three lookup tables that make up a row's compensation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompensationTables {
    pub era: FactorTable,
    pub height: FactorTable,
    pub identity: FactorTable,
}

impl Default for CompensationTables {
    fn default() -> Self {
        Self {
            era: FactorTable::new(
                ERA_FACTOR_NAME,
                PEAK_YEAR_COLUMN,
                range_rules(&EXTENDED_ERA_STEPS),
            ),
            height: FactorTable::new(
                HEIGHT_FACTOR_NAME,
                HEIGHT_COLUMN,
                range_rules(&HEIGHT_STEPS),
            ),
            identity: FactorTable::new(DEFAULT_OVERRIDE_NAME, PLAYER_COLUMN, Vec::new()),
        }
    }
}

impl CompensationTables {
    /// Tables in output column order.
    pub fn tables(&self) -> [&FactorTable; 3] {
        [&self.era, &self.height, &self.identity]
    }
}

/// Per-row sub-factors. Read-only once computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compensation {
    pub era: f64,
    pub height: f64,
    pub identity: f64,
}

impl Compensation {
    pub const NEUTRAL: Compensation = Compensation {
        era: 1.0,
        height: 1.0,
        identity: 1.0,
    };

    pub fn total(&self) -> f64 {
        self.era * self.height * self.identity
    }

    /// Sub-factors in the same order as [`CompensationTables::tables`].
    pub fn factors(&self) -> [f64; 3] {
        [self.era, self.height, self.identity]
    }
}

pub fn compensate_row(
    tables: &CompensationTables,
    era: &Value,
    height: &Value,
    identity: &Value,
) -> Compensation {
    Compensation {
        era: tables.era.lookup(era),
        height: tables.height.lookup(height),
        identity: tables.identity.lookup(identity),
    }
}

/// Compute compensation for every row, in row order.
pub fn compute_compensation(
    table: &PopulationTable,
    tables: &CompensationTables,
) -> Result<Vec<Compensation>, SchemaError> {
    let era_idx = table.require_column(&tables.era.column)?;
    let height_idx = table.require_column(&tables.height.column)?;
    let identity_idx = table.require_column(&tables.identity.column)?;

    let factors: Vec<Compensation> = table
        .rows()
        .iter()
        .map(|row| {
            compensate_row(
                tables,
                row.get(era_idx),
                row.get(height_idx),
                row.get(identity_idx),
            )
        })
        .collect();

    let overridden = factors.iter().filter(|c| c.identity != 1.0).count();
    debug!(rows = factors.len(), overridden, "computed compensation");
    Ok(factors)
}
