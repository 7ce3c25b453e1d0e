//! Spreadsheet ingestion pipeline
//!
//! Reads a daily task report workbook, maps its header to the configured
//! field definitions, validates every row and submits the batch to a
//! [`RecordStore`] as a single create.

pub mod columns;
pub mod date;
pub mod error;
pub mod excel;
pub mod orchestrator;
pub mod policy;
pub mod report;
pub mod store;
pub mod types;
pub mod validate;

pub use date::DateParser;
pub use error::IngestError;
pub use orchestrator::{DEFAULT_SHEET_NAME, UploadOrchestrator, UploadRequest, delete_upload};
pub use policy::{IngestionPolicy, PolicyError};
pub use store::{RecordStore, SchemaProvider};
pub use types::*;
