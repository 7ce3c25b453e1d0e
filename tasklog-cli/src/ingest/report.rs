//! CSV export of row validation errors

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use csv::Writer;

use crate::ingest::types::ValidationError;

/// Write errors as `row,field,message` records
pub fn write_errors_csv<W: Write>(errors: &[ValidationError], writer: W) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);

    wtr.write_record(["row", "field", "message"])
        .context("Failed to write CSV header")?;

    for error in errors {
        wtr.write_record([
            error.row_index.to_string().as_str(),
            error.field_title.as_str(),
            error.message.as_str(),
        ])
        .with_context(|| format!("Failed to write error for row {}", error.row_index))?;
    }

    wtr.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

pub fn export_errors_csv(errors: &[ValidationError], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    write_errors_csv(errors, file)?;
    log::info!("Validation report exported to: {}", path.display());
    Ok(())
}
