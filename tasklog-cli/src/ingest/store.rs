//! Seams to the schema providers and the record store

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::ingest::types::{
    DeletionLogEntry, ExistingFile, FieldDefinition, SchemaSnapshot, StatusDefinition,
    StoredUpload, UploadBatch, UploadLogEntry,
};

/// Supplies the admin-configured fields and status vocabulary
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Field definitions ordered by `order`
    async fn field_definitions(&self) -> Result<Vec<FieldDefinition>>;

    async fn status_vocabulary(&self) -> Result<Vec<StatusDefinition>>;

    /// Fetch both and freeze them into a validated snapshot
    async fn load_schema(&self) -> Result<SchemaSnapshot> {
        let fields = self.field_definitions().await?;
        let statuses = self.status_vocabulary().await?;
        Ok(SchemaSnapshot::new(fields, statuses)?)
    }
}

/// Backend holding uploaded batches and their audit trail
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Uploads of `user` whose file date falls on `day`
    async fn files_for_day(&self, user: &str, day: NaiveDate) -> Result<Vec<ExistingFile>>;

    /// Store a whole batch in one atomic create; returns the new upload id
    ///
    /// The store is the authority on duplicate names and `batch.daily_limit`.
    /// It reports a violation as a [`PolicyError`](crate::ingest::PolicyError)
    /// inside the returned error.
    async fn create_batch(&self, batch: &UploadBatch) -> Result<String>;

    async fn log_upload(&self, entry: &UploadLogEntry) -> Result<()>;

    async fn fetch_upload(&self, id: &str) -> Result<Option<StoredUpload>>;

    /// Original file of an upload
    async fn fetch_blob(&self, id: &str) -> Result<Vec<u8>>;

    async fn log_deletion(&self, entry: &DeletionLogEntry) -> Result<()>;

    async fn delete_upload(&self, id: &str) -> Result<()>;

    /// Tell aggregate-statistics consumers to recompute
    async fn signal_stats_refresh(&self) -> Result<()>;
}
