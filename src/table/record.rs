use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{DataError, SchemaError};

/// Identity column every population must carry.
pub const PLAYER_COLUMN: &str = "Player";
/// Calendar year of a player's competitive peak.
pub const PEAK_YEAR_COLUMN: &str = "Peak_Year";
/// Height in inches.
pub const HEIGHT_COLUMN: &str = "Height";

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Number(f64),
    Text(String),
}

impl Value {
    /// Classify a raw CSV cell. Empty strings and the usual NA spellings are
    /// missing; anything that parses as a finite `f64` is a number.
    /// `inf` and friends stay text so numeric columns reject them.
    pub fn parse(raw: &str) -> Self {
        match Self::parse_text(raw) {
            Value::Text(s) => match s.parse::<f64>() {
                Ok(n) if n.is_finite() => Value::Number(n),
                _ => Value::Text(s),
            },
            other => other,
        }
    }

    /// Classify a cell that is never numeric, such as an identity. The text
    /// is kept as written, so "007" and "1.0" survive unchanged.
    pub fn parse_text(raw: &str) -> Self {
        let raw = raw.trim();
        match raw {
            "" | "NA" | "N/A" | "NaN" | "nan" | "null" | "None" => Value::Missing,
            _ => Value::Text(raw.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Missing => serializer.serialize_none(),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// One athlete: cells aligned with the owning table's columns.
#[derive(Debug, Clone, PartialEq)]
pub struct AthleteRecord {
    cells: Vec<Value>,
}

impl AthleteRecord {
    pub fn new(cells: Vec<Value>) -> Self {
        Self { cells }
    }

    pub fn get(&self, index: usize) -> &Value {
        &self.cells[index]
    }

    pub fn cells(&self) -> &[Value] {
        &self.cells
    }
}

/// Ordered collection of athlete rows sharing one header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PopulationTable {
    columns: Vec<String>,
    rows: Vec<AthleteRecord>,
}

impl PopulationTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[AthleteRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row. The row must have exactly one cell per column.
    pub fn push_row(&mut self, cells: Vec<Value>) -> Result<(), SchemaError> {
        if cells.len() != self.columns.len() {
            return Err(SchemaError::RowWidth {
                row: self.rows.len() + 1,
                expected: self.columns.len(),
                found: cells.len(),
            });
        }
        self.rows.push(AthleteRecord::new(cells));
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, SchemaError> {
        self.column_index(name)
            .ok_or_else(|| SchemaError::MissingColumn(name.to_string()))
    }

    /// Cell lookup by row position and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| r.get(idx))
    }

    /// Read a column as numbers, keeping missing cells as `None`.
    /// Text or a non-finite number in the column is a data error.
    pub fn numeric_column(&self, index: usize) -> Result<Vec<Option<f64>>, DataError> {
        let not_numeric = |row: usize, value: String| DataError::NotNumeric {
            row: row + 1,
            column: self.columns[index].clone(),
            value,
        };
        self.rows
            .iter()
            .enumerate()
            .map(|(row, record)| match record.get(index) {
                Value::Number(n) if n.is_finite() => Ok(Some(*n)),
                Value::Number(n) => Err(not_numeric(row, n.to_string())),
                Value::Missing => Ok(None),
                Value::Text(s) => Err(not_numeric(row, s.clone())),
            })
            .collect()
    }

    /// Overwrite a column with numbers, one per row in row order.
    pub fn set_numeric_column(&mut self, index: usize, values: &[f64]) {
        debug_assert_eq!(values.len(), self.rows.len());
        for (record, v) in self.rows.iter_mut().zip(values) {
            record.cells[index] = Value::Number(*v);
        }
    }

    /// Append a derived column. A column that already exists under the same
    /// name is overwritten in place so the header stays unique.
    pub fn append_column(&mut self, name: &str, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.rows.len());
        match self.column_index(name) {
            Some(idx) => {
                tracing::warn!(column = name, "input column replaced by derived column");
                for (record, v) in self.rows.iter_mut().zip(values) {
                    record.cells[idx] = v;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (record, v) in self.rows.iter_mut().zip(values) {
                    record.cells.push(v);
                }
            }
        }
    }

    /// Keep only the rows at `order`, in that order.
    pub fn reorder(&mut self, order: &[usize]) {
        let mut taken: Vec<Option<AthleteRecord>> =
            std::mem::take(&mut self.rows).into_iter().map(Some).collect();
        self.rows = order.iter().filter_map(|&i| taken[i].take()).collect();
    }

    /// Position of the first row whose `column` cell displays as `key`.
    pub fn find_row(&self, column: &str, key: &str) -> Option<usize> {
        let idx = self.column_index(column)?;
        self.rows
            .iter()
            .position(|r| !r.get(idx).is_missing() && r.get(idx).to_string() == key)
    }

    /// Project the table onto a subset of its columns.
    pub fn select<S: AsRef<str>>(&self, columns: &[S]) -> Result<PopulationTable, SchemaError> {
        let indices = columns
            .iter()
            .map(|c| self.require_column(c.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PopulationTable {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| {
                    AthleteRecord::new(indices.iter().map(|&i| r.get(i).clone()).collect())
                })
                .collect(),
        })
    }
}
