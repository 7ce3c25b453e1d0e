//! Pre-read upload checks: file naming, duplicates and the daily quota
//!
//! These checks are a fast path for the user. They race with concurrent
//! uploads, so the record store remains the authority.

use chrono::NaiveDate;
use thiserror::Error;

use crate::ingest::date::format_day;
use crate::ingest::types::ExistingFile;

/// Files a non-elevated user may upload per calendar day
pub const DEFAULT_DAILY_UPLOAD_LIMIT: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("file name must start with \"{expected_prefix}\"")]
    FileNaming { expected_prefix: String },

    #[error("file \"{file_name}\" has already been uploaded for this day")]
    DuplicateFile { file_name: String },

    #[error("daily upload limit of {limit} files reached")]
    QuotaExceeded { limit: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionPolicy {
    daily_limit: usize,
}

impl Default for IngestionPolicy {
    fn default() -> Self {
        IngestionPolicy {
            daily_limit: DEFAULT_DAILY_UPLOAD_LIMIT,
        }
    }
}

impl IngestionPolicy {
    pub fn new(daily_limit: usize) -> Self {
        IngestionPolicy { daily_limit }
    }

    pub fn daily_limit(&self) -> usize {
        self.daily_limit
    }

    /// Run naming, duplicate and quota rules in that order; the first violation wins
    pub fn check(
        &self,
        file_name: &str,
        report_date: NaiveDate,
        target_user: &str,
        existing: &[ExistingFile],
        elevated: bool,
    ) -> Result<(), PolicyError> {
        let expected_prefix = format_day(report_date);
        if !file_name.starts_with(&expected_prefix) {
            return Err(PolicyError::FileNaming { expected_prefix });
        }

        if existing.iter().any(|f| f.file_name == file_name) {
            return Err(PolicyError::DuplicateFile {
                file_name: file_name.to_string(),
            });
        }

        if !elevated && existing.len() >= self.daily_limit {
            log::debug!(
                "User {} already has {} uploads for {}",
                target_user,
                existing.len(),
                report_date
            );
            return Err(PolicyError::QuotaExceeded {
                limit: self.daily_limit,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn existing(names: &[&str]) -> Vec<ExistingFile> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| ExistingFile {
                id: format!("f{}", i),
                file_name: name.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_file_name_must_start_with_report_date() {
        let policy = IngestionPolicy::default();
        let err = policy
            .check("01.01.2025_report.xlsx", day(2025, 1, 2), "u1", &[], false)
            .unwrap_err();
        assert_eq!(
            err,
            PolicyError::FileNaming {
                expected_prefix: "02.01.2025".into()
            }
        );

        assert!(policy
            .check("02.01.2025_report.xlsx", day(2025, 1, 2), "u1", &[], false)
            .is_ok());
    }

    #[test]
    fn test_duplicate_file_name_is_rejected() {
        let policy = IngestionPolicy::default();
        let err = policy
            .check(
                "02.01.2025.xlsx",
                day(2025, 1, 2),
                "u1",
                &existing(&["02.01.2025.xlsx"]),
                true,
            )
            .unwrap_err();
        assert_eq!(
            err,
            PolicyError::DuplicateFile {
                file_name: "02.01.2025.xlsx".into()
            }
        );
    }

    #[test]
    fn test_quota_boundary() {
        let policy = IngestionPolicy::default();
        let one = existing(&["02.01.2025_a.xlsx"]);
        let two = existing(&["02.01.2025_a.xlsx", "02.01.2025_b.xlsx"]);

        assert!(policy
            .check("02.01.2025_b.xlsx", day(2025, 1, 2), "u1", &one, false)
            .is_ok());
        assert_eq!(
            policy.check("02.01.2025_c.xlsx", day(2025, 1, 2), "u1", &two, false),
            Err(PolicyError::QuotaExceeded { limit: 2 })
        );
    }

    #[test]
    fn test_elevated_users_are_exempt_from_quota() {
        let policy = IngestionPolicy::default();
        let many = existing(&["02.01.2025_a", "02.01.2025_b", "02.01.2025_c", "02.01.2025_d"]);
        assert!(policy
            .check("02.01.2025_e.xlsx", day(2025, 1, 2), "u1", &many, true)
            .is_ok());
    }

    #[test]
    fn test_naming_is_checked_before_duplicates_and_quota() {
        let policy = IngestionPolicy::new(0);
        let err = policy
            .check("report.xlsx", day(2025, 1, 2), "u1", &existing(&["report.xlsx"]), false)
            .unwrap_err();
        assert!(matches!(err, PolicyError::FileNaming { .. }));

        let err = policy
            .check(
                "02.01.2025.xlsx",
                day(2025, 1, 2),
                "u1",
                &existing(&["02.01.2025.xlsx"]),
                false,
            )
            .unwrap_err();
        assert!(matches!(err, PolicyError::DuplicateFile { .. }));
    }
}
