//! Upload and deletion flows
//!
//! An upload moves linearly through
//! `Idle -> PolicyChecking -> Reading -> Validating -> Submitting -> Done`
//! and stops at the stage where it failed. Nothing is written to the store
//! before `Submitting`, and the batch is submitted as one create.

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;

use crate::ingest::date::{DateParser, noon_utc};
use crate::ingest::error::IngestError;
use crate::ingest::excel::{WorkbookFormat, read_workbook};
use crate::ingest::policy::IngestionPolicy;
use crate::ingest::store::RecordStore;
use crate::ingest::types::{
    Actor, DeletionLogEntry, SchemaSnapshot, StoredUpload, UploadBatch, UploadLogEntry,
};
use crate::ingest::validate::validate_sheet;

/// Sheet name used by the report template
pub const DEFAULT_SHEET_NAME: &str = "Лист1";

/// Largest accepted workbook, 5 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Idle,
    PolicyChecking,
    Reading,
    Validating,
    Submitting,
    Done,
}

/// Where the uploaded file content comes from
#[derive(Debug, Clone)]
pub enum UploadSource {
    Path(PathBuf),
    #[cfg(test)]
    Bytes(Vec<u8>),
}

impl UploadSource {
    /// Read the whole file, refusing anything over `limit` bytes
    async fn read(self, limit: u64) -> Result<Vec<u8>, IngestError> {
        let bytes = match self {
            UploadSource::Path(path) => {
                let io_error = |source: std::io::Error| IngestError::Read {
                    path: path.display().to_string(),
                    source,
                };
                let size = tokio::fs::metadata(&path).await.map_err(io_error)?.len();
                check_size(size, limit)?;
                tokio::fs::read(&path).await.map_err(io_error)?
            }
            #[cfg(test)]
            UploadSource::Bytes(bytes) => bytes,
        };
        // The file may have grown since it was measured
        check_size(bytes.len() as u64, limit)?;
        Ok(bytes)
    }
}

fn check_size(size: u64, limit: u64) -> Result<(), IngestError> {
    if size > limit {
        return Err(IngestError::FileTooLarge { size, limit });
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    /// Day the report covers, as selected by the user
    pub report_date: NaiveDate,
    /// Owner of the report; defaults to the actor
    pub target_user: Option<String>,
    pub source: UploadSource,
}

impl UploadRequest {
    /// Upload a file from disk, named after its final path component
    pub fn from_path(path: impl Into<PathBuf>, report_date: NaiveDate) -> anyhow::Result<Self> {
        let path = path.into();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Invalid file name: {}", path.display()))?
            .to_string();

        Ok(UploadRequest {
            file_name,
            report_date,
            target_user: None,
            source: UploadSource::Path(path),
        })
    }

    #[cfg(test)]
    pub fn from_bytes(file_name: impl Into<String>, report_date: NaiveDate, bytes: Vec<u8>) -> Self {
        UploadRequest {
            file_name: file_name.into(),
            report_date,
            target_user: None,
            source: UploadSource::Bytes(bytes),
        }
    }

    pub fn for_user(mut self, user: impl Into<String>) -> Self {
        self.target_user = Some(user.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub upload_id: String,
    pub file_name: String,
    pub target_user: String,
    pub record_count: usize,
}

/// Runs one upload at a time against a store and a schema snapshot
pub struct UploadOrchestrator<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    schema: &'a SchemaSnapshot,
    policy: IngestionPolicy,
    parser: DateParser,
    preferred_sheet: String,
    max_file_size: u64,
    stage: UploadStage,
}

impl<'a, S: RecordStore + ?Sized> UploadOrchestrator<'a, S> {
    pub fn new(store: &'a S, schema: &'a SchemaSnapshot) -> Self {
        UploadOrchestrator {
            store,
            schema,
            policy: IngestionPolicy::default(),
            parser: DateParser::default(),
            preferred_sheet: DEFAULT_SHEET_NAME.to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            stage: UploadStage::Idle,
        }
    }

    pub fn with_policy(mut self, policy: IngestionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_date_parser(mut self, parser: DateParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_preferred_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.preferred_sheet = sheet.into();
        self
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Stage reached by the last upload; the failing stage if it errored
    pub fn stage(&self) -> UploadStage {
        self.stage
    }

    fn enter(&mut self, next: UploadStage) {
        log::debug!("Upload stage {:?} -> {:?}", self.stage, next);
        self.stage = next;
    }

    pub async fn upload(
        &mut self,
        actor: &Actor,
        request: UploadRequest,
    ) -> Result<UploadOutcome, IngestError> {
        self.stage = UploadStage::Idle;
        let UploadRequest {
            file_name,
            report_date,
            target_user,
            source,
        } = request;
        let target_user = target_user.unwrap_or_else(|| actor.id.clone());

        self.enter(UploadStage::PolicyChecking);
        if target_user != actor.id && !actor.elevated {
            return Err(IngestError::Forbidden(
                "only elevated users may upload reports for other users".to_string(),
            ));
        }
        let existing = self
            .store
            .files_for_day(&target_user, report_date)
            .await
            .map_err(IngestError::Store)?;
        self.policy
            .check(&file_name, report_date, &target_user, &existing, actor.elevated)?;

        self.enter(UploadStage::Reading);
        let format = WorkbookFormat::from_file_name(&file_name)
            .ok_or_else(|| IngestError::UnsupportedFormat(file_name.clone()))?;
        let raw_blob = source.read(self.max_file_size).await?;
        let preferred = self.preferred_sheet.clone();
        // Decoding is CPU-bound; keep it off the async workers
        let (sheet, raw_blob) = tokio::task::spawn_blocking(move || {
            read_workbook(&raw_blob, format, &preferred).map(|sheet| (sheet, raw_blob))
        })
        .await
        .map_err(|e| IngestError::UnreadableWorkbook(e.to_string()))??;

        self.enter(UploadStage::Validating);
        let file_date = noon_utc(report_date);
        let records = validate_sheet(&sheet, self.schema, &self.parser, file_date)?;

        self.enter(UploadStage::Submitting);
        let on_behalf = actor.elevated && target_user != actor.id;
        let batch = UploadBatch {
            file_name: file_name.clone(),
            file_date,
            target_user: target_user.clone(),
            uploaded_by: actor.elevated.then(|| actor.id.clone()),
            records,
            raw_blob,
            daily_limit: (!actor.elevated).then(|| self.policy.daily_limit()),
        };
        let upload_id = self
            .store
            .create_batch(&batch)
            .await
            .map_err(IngestError::from_store)?;

        if actor.elevated {
            let entry = UploadLogEntry {
                file_name: file_name.clone(),
                uploaded_by: actor.id.clone(),
                target_user: target_user.clone(),
            };
            if let Err(e) = self.store.log_upload(&entry).await {
                log::warn!("Failed to write upload log for {}: {:#}", file_name, e);
            }
        }
        signal_refresh(self.store).await;

        self.enter(UploadStage::Done);
        log::info!(
            "Stored {} records from {} for {}{}",
            batch.records.len(),
            file_name,
            target_user,
            if on_behalf { " (on behalf)" } else { "" }
        );

        Ok(UploadOutcome {
            upload_id,
            file_name,
            target_user,
            record_count: batch.records.len(),
        })
    }
}

/// Delete an upload, writing the audit entry (reason, actor, original file) first
pub async fn delete_upload<S: RecordStore + ?Sized>(
    store: &S,
    actor: &Actor,
    upload_id: &str,
    reason: &str,
) -> Result<StoredUpload, IngestError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(IngestError::MissingReason);
    }

    let upload = store
        .fetch_upload(upload_id)
        .await
        .map_err(IngestError::Store)?
        .ok_or_else(|| IngestError::NotFound(upload_id.to_string()))?;

    if !upload.can_be_deleted_by(actor) {
        return Err(IngestError::Forbidden(format!(
            "user {} may not delete upload {}",
            actor.id, upload.id
        )));
    }

    let file = store.fetch_blob(&upload.id).await.map_err(IngestError::Store)?;
    let entry = DeletionLogEntry {
        file_name: upload.file_name.clone(),
        reason: reason.to_string(),
        deleted_by: actor.id.clone(),
        file,
    };
    store.log_deletion(&entry).await.map_err(IngestError::Store)?;
    store.delete_upload(&upload.id).await.map_err(IngestError::Store)?;
    signal_refresh(store).await;

    log::info!("Deleted upload {} ({}) by {}", upload.id, upload.file_name, actor.id);
    Ok(upload)
}

/// The data is already committed; a failed signal only delays recomputation
async fn signal_refresh<S: RecordStore + ?Sized>(store: &S) {
    if let Err(e) = store.signal_stats_refresh().await {
        log::warn!("Failed to signal statistics refresh: {:#}", e);
    }
}
