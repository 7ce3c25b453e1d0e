//! Write an empty upload workbook for the configured fields

use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Workbook};

use crate::ingest::types::SchemaSnapshot;

const COLUMN_WIDTH: f64 = 20.0;

fn build_template(schema: &SchemaSnapshot, sheet_name: &str) -> Result<Workbook> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    let header = Format::new().set_bold();
    for (col, field) in schema.upload_fields().enumerate() {
        let col = u16::try_from(col).context("Too many fields for one sheet")?;
        worksheet.write_string_with_format(0, col, &field.title, &header)?;
        worksheet.set_column_width(col, COLUMN_WIDTH)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    Ok(workbook)
}

/// Write the template to a file
pub fn write_template(schema: &SchemaSnapshot, sheet_name: &str, path: &Path) -> Result<()> {
    let bytes = template_bytes(schema, sheet_name)?;
    std::fs::write(path, bytes)
        .with_context(|| format!("Failed to save Excel file: {}", path.display()))?;
    log::info!("Upload template written to: {}", path.display());
    Ok(())
}

/// Render the template in memory
fn template_bytes(schema: &SchemaSnapshot, sheet_name: &str) -> Result<Vec<u8>> {
    let mut workbook = build_template(schema, sheet_name)?;
    workbook
        .save_to_buffer()
        .context("Failed to render Excel template")
}
