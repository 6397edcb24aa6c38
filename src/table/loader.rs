use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use super::record::{PopulationTable, Value, PLAYER_COLUMN};

/// Default input file, relative to the working directory.
pub const DEFAULT_INPUT: &str = "players_stats.csv";

/// Load a population table from a CSV file with a header row.
pub fn load_csv(path: &Path) -> Result<PopulationTable> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open player data at {}", path.display()))?;
    let table = read_csv(file)
        .with_context(|| format!("Failed to read player data from {}", path.display()))?;
    info!(
        path = %path.display(),
        rows = table.len(),
        columns = table.columns().len(),
        "loaded population table"
    );
    Ok(table)
}

/// Read a population table from any CSV source.
///
/// Every cell goes through [`Value::parse`] except the `Player` identity,
/// which is always kept as written. Other columns are not typed at load
/// time; the pipeline decides which ones must be numeric.
pub fn read_csv<R: Read>(reader: R) -> Result<PopulationTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(str::to_string)
        .collect();
    debug!(?headers, "csv header");

    let identity = headers.iter().position(|h| h == PLAYER_COLUMN);
    let mut table = PopulationTable::new(headers);
    for (i, record) in csv_reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed CSV record {}", i + 1))?;
        let cells = record
            .iter()
            .enumerate()
            .map(|(col, raw)| {
                if Some(col) == identity {
                    Value::parse_text(raw)
                } else {
                    Value::parse(raw)
                }
            })
            .collect();
        table.push_row(cells)?;
    }

    Ok(table)
}
