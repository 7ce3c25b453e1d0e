//! Task uploads repository: batches, audit logs and the refresh signal

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::ingest::PolicyError;
use crate::ingest::types::{
    DeletionLogEntry, ExistingFile, ParsedTaskRecord, StoredUpload, UploadBatch, UploadLogEntry,
};

/// Storage format of `file_date`; sorts lexicographically
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Largest serialized `data` column accepted for one upload
const MAX_DATA_BYTES: usize = 2_000_000;

const UPLOAD_COLUMNS: &str =
    "id, user_id, uploaded_by, file_name, file_date, json_array_length(data) AS record_count";

fn format_date(date: &DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, DATE_FORMAT)
        .map(|dt| dt.and_utc())
        .with_context(|| format!("Invalid stored date: {}", s))
}

/// Inclusive bounds covering one calendar day
fn day_bounds(day: NaiveDate) -> (String, String) {
    (
        format!("{} 00:00:00", day.format("%Y-%m-%d")),
        format!("{} 23:59:59", day.format("%Y-%m-%d")),
    )
}

fn upload_from_row(row: &SqliteRow) -> Result<StoredUpload> {
    let file_date: String = row.try_get("file_date")?;
    let record_count: i64 = row.try_get("record_count")?;

    Ok(StoredUpload {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        uploaded_by: row.try_get("uploaded_by")?,
        file_name: row.try_get("file_name")?,
        file_date: parse_date(&file_date)?,
        record_count: usize::try_from(record_count).unwrap_or_default(),
    })
}

/// Uploads of a user whose file date falls on `day`
pub async fn files_for_day(pool: &SqlitePool, user: &str, day: NaiveDate) -> Result<Vec<ExistingFile>> {
    let (start, end) = day_bounds(day);
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT id, file_name FROM task_uploads
         WHERE user_id = ? AND file_date BETWEEN ? AND ?
         ORDER BY created_at, id",
    )
    .bind(user)
    .bind(&start)
    .bind(&end)
    .fetch_all(pool)
    .await
    .context("Failed to get existing files")?;

    Ok(rows
        .into_iter()
        .map(|(id, file_name)| ExistingFile { id, file_name })
        .collect())
}

/// Uploads on `day`, for one user or everyone
pub async fn list_uploads(
    pool: &SqlitePool,
    user: Option<&str>,
    day: NaiveDate,
) -> Result<Vec<StoredUpload>> {
    let (start, end) = day_bounds(day);
    let rows = sqlx::query(&format!(
        "SELECT {} FROM task_uploads
         WHERE file_date BETWEEN ? AND ? AND (? IS NULL OR user_id = ?)
         ORDER BY user_id, created_at, id",
        UPLOAD_COLUMNS
    ))
    .bind(&start)
    .bind(&end)
    .bind(user)
    .bind(user)
    .fetch_all(pool)
    .await
    .context("Failed to list uploads")?;

    rows.iter().map(upload_from_row).collect()
}

/// Insert a whole batch as one row; returns the generated id
///
/// The duplicate and quota rules are checked again while holding the
/// database write lock, so two concurrent uploads cannot both pass them.
/// A violation is returned as a [`PolicyError`] inside the error.
pub async fn insert_upload(pool: &SqlitePool, batch: &UploadBatch) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    let data = serde_json::to_string(&batch.records).context("Failed to serialize records")?;
    if data.len() > MAX_DATA_BYTES {
        anyhow::bail!(
            "Record data is {} bytes, the store accepts at most {}",
            data.len(),
            MAX_DATA_BYTES
        );
    }

    let mut conn = pool.acquire().await.context("Failed to acquire connection")?;
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut *conn)
        .await
        .context("Failed to start transaction")?;

    let outcome = match insert_locked(&mut conn, &id, batch, &data).await {
        Ok(()) => sqlx::query("COMMIT")
            .execute(&mut *conn)
            .await
            .map(|_| ())
            .context("Failed to commit upload"),
        Err(e) => Err(e),
    };

    if let Err(e) = outcome {
        if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
            log::warn!("Failed to roll back upload {}: {}", id, rollback);
        }
        return Err(e);
    }

    Ok(id)
}

async fn insert_locked(
    conn: &mut SqliteConnection,
    id: &str,
    batch: &UploadBatch,
    data: &str,
) -> Result<()> {
    let (start, end) = day_bounds(batch.file_date.date_naive());
    let existing: Vec<String> = sqlx::query_scalar(
        "SELECT file_name FROM task_uploads
         WHERE user_id = ? AND file_date BETWEEN ? AND ?",
    )
    .bind(&batch.target_user)
    .bind(&start)
    .bind(&end)
    .fetch_all(&mut *conn)
    .await
    .context("Failed to check existing files")?;

    if existing.iter().any(|name| *name == batch.file_name) {
        return Err(duplicate(batch).into());
    }
    if let Some(limit) = batch.daily_limit.filter(|limit| existing.len() >= *limit) {
        return Err(PolicyError::QuotaExceeded { limit }.into());
    }

    let result = sqlx::query(
        "INSERT INTO task_uploads (id, user_id, uploaded_by, file_name, file_date, data, excel_file)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&batch.target_user)
    .bind(&batch.uploaded_by)
    .bind(&batch.file_name)
    .bind(format_date(&batch.file_date))
    .bind(data)
    .bind(&batch.raw_blob)
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(duplicate(batch).into()),
        Err(e) => Err(anyhow::Error::new(e).context("Failed to insert upload")),
    }
}

fn duplicate(batch: &UploadBatch) -> PolicyError {
    PolicyError::DuplicateFile {
        file_name: batch.file_name.clone(),
    }
}

pub async fn get_upload(pool: &SqlitePool, id: &str) -> Result<Option<StoredUpload>> {
    let row = sqlx::query(&format!("SELECT {} FROM task_uploads WHERE id = ?", UPLOAD_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get upload")?;

    row.as_ref().map(upload_from_row).transpose()
}

pub async fn get_upload_records(pool: &SqlitePool, id: &str) -> Result<Vec<ParsedTaskRecord>> {
    let data: String = sqlx::query_scalar("SELECT data FROM task_uploads WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get upload records")?
        .with_context(|| format!("Upload {} not found", id))?;

    serde_json::from_str(&data).context("Failed to parse stored records")
}

pub async fn get_upload_blob(pool: &SqlitePool, id: &str) -> Result<Vec<u8>> {
    sqlx::query_scalar::<_, Vec<u8>>("SELECT excel_file FROM task_uploads WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get upload file")?
        .with_context(|| format!("Upload {} not found", id))
}

pub async fn delete_upload(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM task_uploads WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete upload")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("Upload {} not found", id);
    }
    Ok(())
}

pub async fn insert_upload_log(pool: &SqlitePool, entry: &UploadLogEntry) -> Result<()> {
    sqlx::query("INSERT INTO upload_logs (file_name, uploaded_by, target_user) VALUES (?, ?, ?)")
        .bind(&entry.file_name)
        .bind(&entry.uploaded_by)
        .bind(&entry.target_user)
        .execute(pool)
        .await
        .context("Failed to write upload log")?;
    Ok(())
}

#[cfg(test)]
pub(crate) async fn list_upload_logs(pool: &SqlitePool) -> Result<Vec<UploadLogEntry>> {
    let rows: Vec<(String, String, String)> =
        sqlx::query_as("SELECT file_name, uploaded_by, target_user FROM upload_logs ORDER BY id")
            .fetch_all(pool)
            .await
            .context("Failed to list upload logs")?;

    Ok(rows
        .into_iter()
        .map(|(file_name, uploaded_by, target_user)| UploadLogEntry {
            file_name,
            uploaded_by,
            target_user,
        })
        .collect())
}

pub async fn insert_deletion_log(pool: &SqlitePool, entry: &DeletionLogEntry) -> Result<()> {
    sqlx::query(
        "INSERT INTO deletion_logs (file_name, reason, deleted_by, excel_file) VALUES (?, ?, ?, ?)",
    )
    .bind(&entry.file_name)
    .bind(&entry.reason)
    .bind(&entry.deleted_by)
    .bind(&entry.file)
    .execute(pool)
    .await
    .context("Failed to write deletion log")?;
    Ok(())
}

#[cfg(test)]
pub(crate) async fn list_deletion_logs(pool: &SqlitePool) -> Result<Vec<DeletionLogEntry>> {
    let rows = sqlx::query(
        "SELECT file_name, reason, deleted_by, excel_file FROM deletion_logs ORDER BY id",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list deletion logs")?;

    rows.iter()
        .map(|row| {
            Ok(DeletionLogEntry {
                file_name: row.try_get("file_name")?,
                reason: row.try_get("reason")?,
                deleted_by: row.try_get("deleted_by")?,
                file: row.try_get("excel_file")?,
            })
        })
        .collect()
}

/// Bump the statistics refresh marker
pub async fn touch_ranking_updates(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "INSERT INTO ranking_updates (id, updated_at) VALUES (1, ?)
         ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at",
    )
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .context("Failed to update ranking marker")?;
    Ok(())
}

#[cfg(test)]
pub(crate) async fn ranking_updated_at(pool: &SqlitePool) -> Result<Option<String>> {
    sqlx::query_scalar::<_, String>("SELECT updated_at FROM ranking_updates WHERE id = 1")
        .fetch_optional(pool)
        .await
        .context("Failed to read ranking marker")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::repository::connect_in_memory;
    use crate::ingest::date::noon_utc;
    use crate::ingest::types::TaskValue;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn batch(user: &str, file_name: &str, date: NaiveDate) -> UploadBatch {
        let mut record = ParsedTaskRecord::new();
        record.insert("task_number", TaskValue::Text("T-1".into()));
        record.insert("time_spent", TaskValue::Number(1.5));

        UploadBatch {
            file_name: file_name.into(),
            file_date: noon_utc(date),
            target_user: user.into(),
            uploaded_by: None,
            records: vec![record.clone(), record],
            raw_blob: vec![1, 2, 3],
            daily_limit: Some(2),
        }
    }

    #[tokio::test]
    async fn test_files_for_day_covers_whole_day_only() {
        let pool = connect_in_memory().await.unwrap();
        insert_upload(&pool, &batch("alice", "02.01.2025_a.xlsx", day(2))).await.unwrap();
        insert_upload(&pool, &batch("alice", "03.01.2025.xlsx", day(3))).await.unwrap();
        insert_upload(&pool, &batch("bob", "02.01.2025.xlsx", day(2))).await.unwrap();

        let files = files_for_day(&pool, "alice", day(2)).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, "02.01.2025_a.xlsx");

        assert_eq!(list_uploads(&pool, None, day(2)).await.unwrap().len(), 2);
        assert_eq!(list_uploads(&pool, Some("bob"), day(2)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_round_trip() {
        let pool = connect_in_memory().await.unwrap();
        let id = insert_upload(&pool, &batch("alice", "02.01.2025.xlsx", day(2))).await.unwrap();

        let upload = get_upload(&pool, &id).await.unwrap().unwrap();
        assert_eq!(upload.user_id, "alice");
        assert_eq!(upload.record_count, 2);
        assert_eq!(upload.file_date, noon_utc(day(2)));
        assert_eq!(get_upload_blob(&pool, &id).await.unwrap(), vec![1, 2, 3]);

        let records = get_upload_records(&pool, &id).await.unwrap();
        assert_eq!(records[0].get("time_spent"), Some(&TaskValue::Number(1.5)));

        delete_upload(&pool, &id).await.unwrap();
        assert!(get_upload(&pool, &id).await.unwrap().is_none());
        assert!(delete_upload(&pool, &id).await.is_err());
    }

    #[tokio::test]
    async fn test_ranking_marker_is_single_row() {
        let pool = connect_in_memory().await.unwrap();
        assert!(ranking_updated_at(&pool).await.unwrap().is_none());
        touch_ranking_updates(&pool).await.unwrap();
        touch_ranking_updates(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ranking_updates")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert!(ranking_updated_at(&pool).await.unwrap().is_some());
    }

    fn policy_error(err: &anyhow::Error) -> Option<&PolicyError> {
        err.downcast_ref::<PolicyError>()
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_name_for_same_day() {
        let pool = connect_in_memory().await.unwrap();
        insert_upload(&pool, &batch("alice", "02.01.2025.xlsx", day(2))).await.unwrap();

        let err = insert_upload(&pool, &batch("alice", "02.01.2025.xlsx", day(2)))
            .await
            .unwrap_err();
        assert_eq!(
            policy_error(&err),
            Some(&PolicyError::DuplicateFile {
                file_name: "02.01.2025.xlsx".into()
            })
        );

        // Same name is fine for another user or another day
        insert_upload(&pool, &batch("bob", "02.01.2025.xlsx", day(2))).await.unwrap();
        insert_upload(&pool, &batch("alice", "02.01.2025.xlsx", day(3))).await.unwrap();
        assert_eq!(files_for_day(&pool, "alice", day(2)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_enforces_daily_limit_unless_exempt() {
        let pool = connect_in_memory().await.unwrap();
        insert_upload(&pool, &batch("alice", "02.01.2025_a.xlsx", day(2))).await.unwrap();
        insert_upload(&pool, &batch("alice", "02.01.2025_b.xlsx", day(2))).await.unwrap();

        let err = insert_upload(&pool, &batch("alice", "02.01.2025_c.xlsx", day(2)))
            .await
            .unwrap_err();
        assert_eq!(policy_error(&err), Some(&PolicyError::QuotaExceeded { limit: 2 }));

        let mut exempt = batch("alice", "02.01.2025_c.xlsx", day(2));
        exempt.daily_limit = None;
        insert_upload(&pool, &exempt).await.unwrap();
        assert_eq!(files_for_day(&pool, "alice", day(2)).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unique_index_covers_whole_day() {
        let pool = connect_in_memory().await.unwrap();
        let insert = |id: &'static str, file_date: &'static str| {
            sqlx::query(
                "INSERT INTO task_uploads (id, user_id, file_name, file_date, data, excel_file)
                 VALUES (?, 'alice', '02.01.2025.xlsx', ?, '[]', x'00')",
            )
            .bind(id)
            .bind(file_date)
        };

        insert("a", "2025-01-02 12:00:00").execute(&pool).await.unwrap();
        let err = insert("b", "2025-01-02 08:30:00").execute(&pool).await.unwrap_err();
        assert!(err.as_database_error().is_some_and(|e| e.is_unique_violation()));
        insert("c", "2025-01-03 12:00:00").execute(&pool).await.unwrap();
    }
}
