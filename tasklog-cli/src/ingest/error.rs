//! Error taxonomy of the ingestion pipeline

use thiserror::Error;

use crate::ingest::policy::PolicyError;
use crate::ingest::types::ValidationError;

#[derive(Debug, Error)]
pub enum IngestError {
    /// File naming, duplicate or quota rule violated
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// Required fields without a matching header; raised before any row is read
    #[error("missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Every row-level problem in the sheet; the batch is rejected as a whole
    #[error("validation failed with {} error(s)", .0.len())]
    Validation(Vec<ValidationError>),

    #[error("unsupported file type: {0} (expected .xlsx or .xls)")]
    UnsupportedFormat(String),

    #[error("file is {size} bytes, the limit is {limit}")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("sheet appears to be empty or missing data rows")]
    EmptySheet,

    #[error("failed to read workbook: {0}")]
    UnreadableWorkbook(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error("a deletion reason is required")]
    MissingReason,

    #[error("upload '{0}' not found")]
    NotFound(String),

    /// Backend failure, surfaced with the store's own message
    #[error("{0:#}")]
    Store(anyhow::Error),
}

impl IngestError {
    /// Row errors, when the batch failed validation
    #[cfg(test)]
    pub fn validation_errors(&self) -> Option<&[ValidationError]> {
        match self {
            IngestError::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    /// Classify a store failure; rule violations reported by the store stay typed
    pub(crate) fn from_store(error: anyhow::Error) -> Self {
        match error.downcast::<PolicyError>() {
            Ok(policy) => IngestError::Policy(policy),
            Err(error) => IngestError::Store(error),
        }
    }

    /// True when the failure happened before anything was written
    pub fn is_pre_write(&self) -> bool {
        !matches!(self, IngestError::Store(_))
    }
}
