//! Admin-configured field schema and status vocabulary

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Keys owned by the task edit path; never read from an uploaded sheet
pub const SYSTEM_FIELD_KEYS: &[&str] = &["original_time_spent", "is_edited"];

/// Conventional key of the status column
pub const STATUS_FIELD_KEY: &str = "status";

/// Value type of a configured field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Date,
    #[serde(alias = "bool")]
    Boolean,
    Select,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Boolean => "boolean",
            FieldType::Select => "select",
        }
    }

    /// Parse the stored representation (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" => Some(FieldType::Text),
            "number" => Some(FieldType::Number),
            "date" => Some(FieldType::Date),
            "boolean" | "bool" => Some(FieldType::Boolean),
            "select" => Some(FieldType::Select),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One task attribute as configured by an administrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Key under which the parsed value is stored
    pub key: String,
    /// Column header shown to users; drives header matching
    pub title: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default)]
    pub order: i64,
}

impl FieldDefinition {
    #[cfg(test)]
    pub fn new(key: impl Into<String>, title: impl Into<String>, field_type: FieldType) -> Self {
        FieldDefinition {
            key: key.into(),
            title: title.into(),
            field_type,
            required: false,
            filterable: false,
            order: 0,
        }
    }

    /// Mark the field as required
    #[cfg(test)]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[cfg(test)]
    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    /// True for keys maintained outside of uploads
    pub fn is_system(&self) -> bool {
        SYSTEM_FIELD_KEYS.contains(&self.key.as_str())
    }

    /// Select fields and the conventional status field are checked against the vocabulary
    pub fn uses_status_vocabulary(&self) -> bool {
        self.field_type == FieldType::Select || self.key == STATUS_FIELD_KEY
    }
}

/// One allowed value of the status field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDefinition {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub color: String,
}

#[cfg(test)]
impl StatusDefinition {
    pub fn new(title: impl Into<String>, slug: impl Into<String>, color: impl Into<String>) -> Self {
        StatusDefinition {
            title: title.into(),
            slug: slug.into(),
            color: color.into(),
        }
    }
}

/// Normalize a header cell or field title for matching
pub fn normalize_title(s: &str) -> String {
    s.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("field has an empty key")]
    EmptyKey,
    #[error("field '{0}' has an empty title")]
    EmptyTitle(String),
    #[error("duplicate field key '{0}'")]
    DuplicateKey(String),
    #[error("duplicate field title '{0}'")]
    DuplicateTitle(String),
    #[error("duplicate status title '{0}'")]
    DuplicateStatus(String),
}

/// Schema loaded once per session and shared read-only by every stage of an ingestion
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    fields: Vec<FieldDefinition>,
    statuses: Vec<StatusDefinition>,
}

impl SchemaSnapshot {
    /// Validate and freeze a schema. Fields are ordered by `order`.
    pub fn new(
        mut fields: Vec<FieldDefinition>,
        statuses: Vec<StatusDefinition>,
    ) -> Result<Self, SchemaError> {
        let mut keys = HashSet::new();
        let mut titles = HashSet::new();

        for field in &fields {
            if field.key.trim().is_empty() {
                return Err(SchemaError::EmptyKey);
            }
            if field.title.trim().is_empty() {
                return Err(SchemaError::EmptyTitle(field.key.clone()));
            }
            if !keys.insert(field.key.as_str()) {
                return Err(SchemaError::DuplicateKey(field.key.clone()));
            }
            if !titles.insert(normalize_title(&field.title)) {
                return Err(SchemaError::DuplicateTitle(field.title.clone()));
            }
        }

        let mut status_titles = HashSet::new();
        for status in &statuses {
            if !status_titles.insert(status.title.as_str()) {
                return Err(SchemaError::DuplicateStatus(status.title.clone()));
            }
        }

        fields.sort_by_key(|f| f.order);

        Ok(SchemaSnapshot { fields, statuses })
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Fields that are read from uploaded sheets
    pub fn upload_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| !f.is_system())
    }

    pub fn statuses(&self) -> &[StatusDefinition] {
        &self.statuses
    }
}
