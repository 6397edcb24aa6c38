use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::scoring::ScoringConfig;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// CSV used when no input path is given on the command line
    #[serde(default)]
    pub input: Option<PathBuf>,

    /// Columns shown by `rank` in table and TSV output
    #[serde(default)]
    pub columns: Option<Vec<String>>,

    #[serde(default)]
    pub scoring: Option<ScoringConfig>,
}
