//! Typed errors raised by the scoring pipeline.
//!
//! Every stage fails fast: the first invalid input aborts the run and no
//! partial table is produced. Errors fall into three kinds, mirrored by the
//! three wrapped enums below.

use thiserror::Error;

/// Which stage of input checking rejected the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Schema,
    Data,
    Config,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Schema(_) => ErrorKind::Schema,
            PipelineError::Data(_) => ErrorKind::Data,
            PipelineError::Config(_) => ErrorKind::Config,
        }
    }
}

/// The table does not have the shape the pipeline needs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    #[error("required column '{0}' is missing")]
    MissingColumn(String),

    #[error("row {row} has {found} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// The table has the right columns but their contents cannot be scored.
///
/// Row numbers are 1-based data rows (the header is not counted).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataError {
    #[error("column '{column}' has no values to average")]
    InsufficientData { column: String },

    #[error("row {row}, column '{column}': expected a number, found '{value}'")]
    NotNumeric {
        row: usize,
        column: String,
        value: String,
    },

    #[error("row {row}, column '{column}': value is missing")]
    MissingValue { row: usize, column: String },

    #[error("row {row} has no player name")]
    MissingIdentity { row: usize },

    #[error("player '{0}' appears more than once")]
    DuplicateIdentity(String),
}

/// The pipeline configuration is inconsistent.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("weight table references '{0}', which is not a KPI column")]
    UnknownWeightColumn(String),

    #[error("top_n must be at least 1")]
    InvalidTopN,

    #[error("{}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_follows_variant() {
        let schema: PipelineError = SchemaError::MissingColumn("Height".to_string()).into();
        let data: PipelineError = DataError::InsufficientData {
            column: "DPOY".to_string(),
        }
        .into();
        let config: PipelineError = ConfigError::InvalidTopN.into();

        assert_eq!(schema.kind(), ErrorKind::Schema);
        assert_eq!(data.kind(), ErrorKind::Data);
        assert_eq!(config.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_messages_name_the_column() {
        let err: PipelineError = SchemaError::MissingColumn("Peak_Year".to_string()).into();
        assert_eq!(
            err.to_string(),
            "schema error: required column 'Peak_Year' is missing"
        );
    }

    #[test]
    fn test_invalid_config_joins_all_problems() {
        let err = ConfigError::Invalid(vec!["first".to_string(), "second".to_string()]);
        assert_eq!(err.to_string(), "first; second");
    }
}
