//! SQLite-backed schema provider and record store

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::SqlitePool;

use super::{schema, uploads};
use crate::ingest::store::{RecordStore, SchemaProvider};
use crate::ingest::types::{
    DeletionLogEntry, ExistingFile, FieldDefinition, StatusDefinition, StoredUpload, UploadBatch,
    UploadLogEntry,
};

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteStore { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl SchemaProvider for SqliteStore {
    async fn field_definitions(&self) -> Result<Vec<FieldDefinition>> {
        schema::list_field_definitions(&self.pool).await
    }

    async fn status_vocabulary(&self) -> Result<Vec<StatusDefinition>> {
        schema::list_statuses(&self.pool).await
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn files_for_day(&self, user: &str, day: NaiveDate) -> Result<Vec<ExistingFile>> {
        uploads::files_for_day(&self.pool, user, day).await
    }

    async fn create_batch(&self, batch: &UploadBatch) -> Result<String> {
        uploads::insert_upload(&self.pool, batch).await
    }

    async fn log_upload(&self, entry: &UploadLogEntry) -> Result<()> {
        uploads::insert_upload_log(&self.pool, entry).await
    }

    async fn fetch_upload(&self, id: &str) -> Result<Option<StoredUpload>> {
        uploads::get_upload(&self.pool, id).await
    }

    async fn fetch_blob(&self, id: &str) -> Result<Vec<u8>> {
        uploads::get_upload_blob(&self.pool, id).await
    }

    async fn log_deletion(&self, entry: &DeletionLogEntry) -> Result<()> {
        uploads::insert_deletion_log(&self.pool, entry).await
    }

    async fn delete_upload(&self, id: &str) -> Result<()> {
        uploads::delete_upload(&self.pool, id).await
    }

    async fn signal_stats_refresh(&self) -> Result<()> {
        uploads::touch_ranking_updates(&self.pool).await
    }
}
