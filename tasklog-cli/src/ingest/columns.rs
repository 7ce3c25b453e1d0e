//! Header-to-column resolution

use std::collections::HashMap;

use crate::ingest::error::IngestError;
use crate::ingest::types::{CellValue, FieldDefinition, normalize_title};

/// Field key -> physical column index of one sheet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    columns: HashMap<String, usize>,
}

impl ColumnMapping {
    /// Match each field title against the header row, ignoring case and surrounding whitespace
    ///
    /// The first matching header wins; fields without a header are left unmapped.
    pub fn resolve(header: &[CellValue], fields: &[FieldDefinition]) -> Self {
        let headers: Vec<String> = header.iter().map(|c| normalize_title(&c.to_text())).collect();

        let mut columns = HashMap::new();
        for field in fields.iter().filter(|f| !f.is_system()) {
            let target = normalize_title(&field.title);
            if let Some(idx) = headers.iter().position(|h| *h == target) {
                columns.insert(field.key.clone(), idx);
            }
        }

        ColumnMapping { columns }
    }

    pub fn column(&self, key: &str) -> Option<usize> {
        self.columns.get(key).copied()
    }

    /// Mapped column indices, in no particular order
    pub fn columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns.values().copied()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Titles of required fields that have no column
    pub fn missing_required(&self, fields: &[FieldDefinition]) -> Vec<String> {
        fields
            .iter()
            .filter(|f| f.required && !f.is_system() && !self.columns.contains_key(&f.key))
            .map(|f| f.title.clone())
            .collect()
    }
}

/// Resolve the mapping and fail fast when a required column is absent
pub fn resolve_columns(
    header: &[CellValue],
    fields: &[FieldDefinition],
) -> Result<ColumnMapping, IngestError> {
    let mapping = ColumnMapping::resolve(header, fields);

    let missing = mapping.missing_required(fields);
    if !missing.is_empty() {
        return Err(IngestError::MissingColumns(missing));
    }

    if mapping.is_empty() {
        log::warn!("No header cell matches a configured field title");
    }
    log::debug!("Resolved {} of {} field columns", mapping.len(), fields.len());
    Ok(mapping)
}
