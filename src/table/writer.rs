use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use std::io::Write;
use std::path::Path;

use super::record::PopulationTable;

/// Write a table as CSV: header row, then one record per row.
/// Numbers use shortest round-trip formatting, missing cells are empty.
pub fn write_csv<W: Write>(table: &PopulationTable, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer
        .write_record(table.columns())
        .context("Failed to write CSV header")?;
    for record in table.rows() {
        csv_writer
            .write_record(record.cells().iter().map(|v| v.to_string()))
            .context("Failed to write CSV record")?;
    }
    csv_writer.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// Save a table to disk atomically, so an interrupted run never leaves a
/// truncated ranking behind.
pub fn save_csv(path: &Path, table: &PopulationTable) -> Result<()> {
    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;

    write_csv(table, &mut file)?;

    file.commit()
        .with_context(|| format!("Failed to save ranking to {}", path.display()))?;
    Ok(())
}
