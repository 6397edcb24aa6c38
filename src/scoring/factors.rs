use anyhow::{bail, Result};
use std::fmt;

use crate::table::Value;

/// Threshold expression over a numeric field.
///
/// Formats: `<N`, `<=N`, `>N`, `>=N`, `N-M` (inclusive) or a bare `N`.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeOp {
    LessThan(f64),
    LessEqual(f64),
    GreaterThan(f64),
    GreaterEqual(f64),
    Equal(f64),
    Between(f64, f64), // Inclusive range: N-M
}

impl RangeOp {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(val) = s.strip_prefix(">=") {
            Ok(RangeOp::GreaterEqual(val.trim().parse()?))
        } else if let Some(val) = s.strip_prefix("<=") {
            Ok(RangeOp::LessEqual(val.trim().parse()?))
        } else if let Some(val) = s.strip_prefix('>') {
            Ok(RangeOp::GreaterThan(val.trim().parse()?))
        } else if let Some(val) = s.strip_prefix('<') {
            Ok(RangeOp::LessThan(val.trim().parse()?))
        } else if s.contains('-') && !s.starts_with('-') {
            let parts: Vec<&str> = s.split('-').collect();
            if parts.len() == 2 {
                let low: f64 = parts[0].trim().parse()?;
                let high: f64 = parts[1].trim().parse()?;
                if low > high {
                    bail!("Range lower bound exceeds upper bound: {}", s)
                }
                Ok(RangeOp::Between(low, high))
            } else {
                bail!("Invalid range format: {}", s)
            }
        } else {
            Ok(RangeOp::Equal(s.parse()?))
        }
    }

    pub fn matches(&self, value: f64) -> bool {
        match self {
            RangeOp::LessThan(n) => value < *n,
            RangeOp::LessEqual(n) => value <= *n,
            RangeOp::GreaterThan(n) => value > *n,
            RangeOp::GreaterEqual(n) => value >= *n,
            RangeOp::Equal(n) => value == *n,
            RangeOp::Between(low, high) => value >= *low && value <= *high,
        }
    }
}

impl fmt::Display for RangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeOp::LessThan(n) => write!(f, "<{}", n),
            RangeOp::LessEqual(n) => write!(f, "<={}", n),
            RangeOp::GreaterThan(n) => write!(f, ">{}", n),
            RangeOp::GreaterEqual(n) => write!(f, ">={}", n),
            RangeOp::Equal(n) => write!(f, "{}", n),
            RangeOp::Between(low, high) => write!(f, "{}-{}", low, high),
        }
    }
}

/// Parse a multiplicative effect: `x1.12` or a bare `1.12`.
///
/// Compensation only ever scales a score, so additive `+N` effects are
/// rejected.
pub fn parse_multiplier(s: &str) -> Result<f64> {
    let s = s.trim();
    if s.starts_with('+') {
        bail!("Compensation effects must be multiplicative (xN): {}", s)
    }
    let raw = s.strip_prefix('x').unwrap_or(s).trim();
    let value: f64 = raw.parse()?;
    if !value.is_finite() || value < 0.0 {
        bail!("Multiplier must be a non-negative finite number: {}", s)
    }
    Ok(value)
}

/// One entry of a compensation lookup table.
#[derive(Debug, Clone, PartialEq)]
pub enum FactorRule {
    /// Applies when a numeric field falls inside the range.
    Range { range: RangeOp, multiplier: f64 },
    /// Applies when a field equals the key exactly.
    Exact { key: String, multiplier: f64 },
}

impl FactorRule {
    pub fn range(range: RangeOp, multiplier: f64) -> Self {
        FactorRule::Range { range, multiplier }
    }

    pub fn exact(key: impl Into<String>, multiplier: f64) -> Self {
        FactorRule::Exact {
            key: key.into(),
            multiplier,
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            FactorRule::Range { multiplier, .. } | FactorRule::Exact { multiplier, .. } => {
                *multiplier
            }
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Missing) => false,
            (FactorRule::Range { range, .. }, Value::Number(n)) => range.matches(*n),
            (FactorRule::Range { .. }, Value::Text(_)) => false,
            (FactorRule::Exact { key, .. }, v) => v.to_string() == *key,
        }
    }
}

/// A named step function over one column: the first matching rule wins,
/// and a value no rule matches gets a neutral `1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorTable {
    /// Output prefix; the derived column is `<name>_Factor`.
    pub name: String,
    /// Column the rules are evaluated against.
    pub column: String,
    pub rules: Vec<FactorRule>,
}

impl FactorTable {
    pub fn new(name: impl Into<String>, column: impl Into<String>, rules: Vec<FactorRule>) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            rules,
        }
    }

    pub fn factor_column(&self) -> String {
        format!("{}_Factor", self.name)
    }

    pub fn lookup(&self, value: &Value) -> f64 {
        self.rules
            .iter()
            .find(|rule| rule.matches(value))
            .map(FactorRule::multiplier)
            .unwrap_or(1.0)
    }
}
