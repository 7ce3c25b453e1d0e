//! Records, batches and store payloads

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::TaskValue;

/// One validated data row, keyed by field key
///
/// Entries keep insertion order, which is field-definition order, and
/// serialize as a JSON object in that order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedTaskRecord(Vec<(String, TaskValue)>);

impl ParsedTaskRecord {
    pub fn new() -> Self {
        ParsedTaskRecord(Vec::new())
    }

    /// Set a field; an existing key keeps its position
    pub(crate) fn insert(&mut self, key: impl Into<String>, value: TaskValue) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((key, value)),
        }
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&TaskValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TaskValue)> {
        self.0.iter().map(|(k, v)| (k, v))
    }
}

impl Serialize for ParsedTaskRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ParsedTaskRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = ParsedTaskRecord;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an object of field values")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut record = ParsedTaskRecord::new();
                while let Some((key, value)) = map.next_entry::<String, TaskValue>()? {
                    record.insert(key, value);
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

/// A single problem found in a data row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// 1-based sheet row, the header being row 1
    pub row_index: usize,
    pub field_title: String,
    pub message: String,
}

impl ValidationError {
    pub fn field_is_empty(row_index: usize, title: &str) -> Self {
        Self::new(row_index, title, format!("{} field is empty", title))
    }

    pub fn not_a_number(row_index: usize, title: &str) -> Self {
        Self::new(row_index, title, format!("{} must be a number", title))
    }

    pub fn invalid_value(row_index: usize, title: &str) -> Self {
        Self::new(row_index, title, format!("{} invalid value", title))
    }

    fn new(row_index: usize, title: &str, message: String) -> Self {
        ValidationError {
            row_index,
            field_title: title.to_string(),
            message,
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Row {}: {}", self.row_index, self.message)
    }
}

/// The user performing an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    /// Elevated users may upload for others and are exempt from the daily quota
    pub elevated: bool,
}

impl Actor {
    pub fn new(id: impl Into<String>, elevated: bool) -> Self {
        Actor {
            id: id.into(),
            elevated,
        }
    }
}

/// Everything derived from one uploaded file, submitted as a single create
#[derive(Debug, Clone)]
pub struct UploadBatch {
    pub file_name: String,
    /// Report date anchored at noon UTC
    pub file_date: DateTime<Utc>,
    pub target_user: String,
    /// Set when an elevated user uploads on someone's behalf
    pub uploaded_by: Option<String>,
    pub records: Vec<ParsedTaskRecord>,
    pub raw_blob: Vec<u8>,
    /// Files allowed per user and day; `None` for elevated uploaders
    pub daily_limit: Option<usize>,
}

/// A prior upload for a user/day, as returned by the existing-files query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingFile {
    pub id: String,
    pub file_name: String,
}

/// Metadata of a stored upload
#[derive(Debug, Clone, PartialEq)]
pub struct StoredUpload {
    pub id: String,
    pub user_id: String,
    pub uploaded_by: Option<String>,
    pub file_name: String,
    pub file_date: DateTime<Utc>,
    pub record_count: usize,
}

impl StoredUpload {
    /// Client-side mirror of the store's delete rule
    pub fn can_be_deleted_by(&self, actor: &Actor) -> bool {
        actor.elevated
            || self.user_id == actor.id
            || self.uploaded_by.as_deref() == Some(actor.id.as_str())
    }
}

/// Written when an elevated user uploads for another user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLogEntry {
    pub file_name: String,
    pub uploaded_by: String,
    pub target_user: String,
}

/// Audit trail written before an upload is deleted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionLogEntry {
    pub file_name: String,
    pub reason: String,
    pub deleted_by: String,
    pub file: Vec<u8>,
}
