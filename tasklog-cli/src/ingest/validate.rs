//! Row validation: required/type/vocabulary rules applied per data row
//!
//! Errors are collected across the whole sheet in one pass so the user can
//! fix everything before re-uploading. A batch is accepted only when no row
//! produced an error.

use chrono::{DateTime, Utc};

use crate::ingest::columns::{ColumnMapping, resolve_columns};
use crate::ingest::date::DateParser;
use crate::ingest::error::IngestError;
use crate::ingest::excel::RawSheet;
use crate::ingest::types::{
    CellValue, FieldDefinition, FieldType, ParsedTaskRecord, SchemaSnapshot, StatusDefinition,
    TaskValue, ValidationError,
};

/// Sheet row number of the first data row (the header is row 1)
const FIRST_DATA_ROW: usize = 2;

/// Result of validating every data row of a sheet
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    pub records: Vec<ParsedTaskRecord>,
    pub errors: Vec<ValidationError>,
    /// Rows skipped because every mapped cell was blank
    pub skipped_rows: usize,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Applies the field rules of one schema to data rows
pub struct RowValidator<'a> {
    fields: &'a [FieldDefinition],
    mapping: &'a ColumnMapping,
    statuses: &'a [StatusDefinition],
    parser: &'a DateParser,
    /// Used for optional date cells that are blank or unparseable
    fallback_date: DateTime<Utc>,
}

impl<'a> RowValidator<'a> {
    pub fn new(
        fields: &'a [FieldDefinition],
        mapping: &'a ColumnMapping,
        statuses: &'a [StatusDefinition],
        parser: &'a DateParser,
        fallback_date: DateTime<Utc>,
    ) -> Self {
        RowValidator {
            fields,
            mapping,
            statuses,
            parser,
            fallback_date,
        }
    }

    /// Validate data rows (the header row excluded)
    pub fn validate_rows(&self, rows: &[Vec<CellValue>]) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();

        for (idx, row) in rows.iter().enumerate() {
            let row_index = idx + FIRST_DATA_ROW;

            if self.is_blank_row(row) {
                outcome.skipped_rows += 1;
                continue;
            }

            match self.validate_row(row, row_index) {
                Ok(record) => outcome.records.push(record),
                Err(errors) => outcome.errors.extend(errors),
            }
        }

        outcome
    }

    fn is_blank_row(&self, row: &[CellValue]) -> bool {
        self.mapping
            .columns()
            .all(|col| row.get(col).is_none_or(CellValue::is_blank))
    }

    /// Check every field of a row; a row with any error yields no record
    fn validate_row(
        &self,
        row: &[CellValue],
        row_index: usize,
    ) -> Result<ParsedTaskRecord, Vec<ValidationError>> {
        let mut record = ParsedTaskRecord::new();
        let mut errors = Vec::new();

        for field in self.fields.iter().filter(|f| !f.is_system()) {
            let cell = self
                .mapping
                .column(&field.key)
                .and_then(|col| row.get(col))
                .unwrap_or(&CellValue::Empty);

            match self.coerce(field, cell, row_index) {
                Ok(value) => record.insert(field.key.clone(), value),
                Err(err) => errors.push(err),
            }
        }

        if errors.is_empty() {
            Ok(record)
        } else {
            Err(errors)
        }
    }

    fn coerce(
        &self,
        field: &FieldDefinition,
        cell: &CellValue,
        row_index: usize,
    ) -> Result<TaskValue, ValidationError> {
        let blank = cell.is_blank();
        if field.required && blank {
            return Err(ValidationError::field_is_empty(row_index, &field.title));
        }

        if field.uses_status_vocabulary() {
            let text = cell.to_text().trim().to_string();
            if text.is_empty() || self.statuses.iter().any(|s| s.title == text) {
                return Ok(TaskValue::Text(text));
            }
            return Err(ValidationError::invalid_value(row_index, &field.title));
        }

        match field.field_type {
            FieldType::Number => {
                if blank {
                    return Ok(TaskValue::Number(0.0));
                }
                cell_to_number(cell)
                    .map(TaskValue::Number)
                    .ok_or_else(|| ValidationError::not_a_number(row_index, &field.title))
            }
            FieldType::Date => match self.parser.parse(cell) {
                Some(date) => Ok(TaskValue::Date(date)),
                None if field.required => {
                    Err(ValidationError::invalid_value(row_index, &field.title))
                }
                None => Ok(TaskValue::Date(self.fallback_date)),
            },
            FieldType::Boolean => {
                if blank {
                    return Ok(TaskValue::Bool(false));
                }
                cell_to_bool(cell)
                    .map(TaskValue::Bool)
                    .ok_or_else(|| ValidationError::invalid_value(row_index, &field.title))
            }
            FieldType::Text | FieldType::Select => {
                Ok(TaskValue::Text(cell.to_text().trim().to_string()))
            }
        }
    }
}

/// Parse a number, accepting `,` as the decimal separator
pub fn parse_number(s: &str) -> Option<f64> {
    s.trim()
        .replacen(',', ".", 1)
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

fn cell_to_number(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Number(n) | CellValue::DateTime(n) => Some(*n),
        CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        CellValue::Text(s) => parse_number(s),
        CellValue::Empty => None,
    }
}

fn cell_to_bool(cell: &CellValue) -> Option<bool> {
    match cell {
        CellValue::Bool(b) => Some(*b),
        CellValue::Number(n) if *n == 1.0 => Some(true),
        CellValue::Number(n) if *n == 0.0 => Some(false),
        CellValue::Text(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Resolve columns and validate every data row of a sheet
///
/// Returns the records only when the whole sheet is valid.
pub fn validate_sheet(
    sheet: &RawSheet,
    schema: &SchemaSnapshot,
    parser: &DateParser,
    fallback_date: DateTime<Utc>,
) -> Result<Vec<ParsedTaskRecord>, IngestError> {
    let rows = sheet.data_rows();
    if rows.is_empty() {
        return Err(IngestError::EmptySheet);
    }

    let mapping = resolve_columns(sheet.header(), schema.fields())?;
    let validator = RowValidator::new(
        schema.fields(),
        &mapping,
        schema.statuses(),
        parser,
        fallback_date,
    );
    let outcome = validator.validate_rows(rows);

    log::debug!(
        "Sheet '{}': {} valid rows, {} errors, {} blank rows skipped",
        sheet.name,
        outcome.records.len(),
        outcome.errors.len(),
        outcome.skipped_rows
    );

    if !outcome.is_valid() {
        return Err(IngestError::Validation(outcome.errors));
    }
    if outcome.records.is_empty() {
        return Err(IngestError::EmptySheet);
    }

    Ok(outcome.records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::date::noon_utc;
    use chrono::NaiveDate;

    fn schema() -> SchemaSnapshot {
        SchemaSnapshot::new(
            vec![
                FieldDefinition::new("task_number", "Task", FieldType::Text)
                    .required()
                    .with_order(0),
                FieldDefinition::new("time_spent", "Spent", FieldType::Number)
                    .required()
                    .with_order(1),
                FieldDefinition::new("status", "Status", FieldType::Select).with_order(2),
                FieldDefinition::new("done_on", "Done on", FieldType::Date).with_order(3),
                FieldDefinition::new("billable", "Billable", FieldType::Boolean).with_order(4),
                FieldDefinition::new("extra", "Extra", FieldType::Number).with_order(5),
            ],
            vec![
                StatusDefinition::new("Завершена", "completed", "green"),
                StatusDefinition::new("В работе", "in_progress", "blue"),
            ],
        )
        .unwrap()
    }

    fn report_day() -> DateTime<Utc> {
        noon_utc(NaiveDate::from_ymd_opt(2025, 12, 25).unwrap())
    }

    fn row(cells: &[CellValue]) -> Vec<CellValue> {
        cells.to_vec()
    }

    fn text(s: &str) -> CellValue {
        CellValue::from(s)
    }

    fn header() -> Vec<CellValue> {
        row(&[text("Task"), text("Spent"), text("Status"), text("Done on"), text("Billable")])
    }

    fn run(rows: &[Vec<CellValue>]) -> ValidationOutcome {
        let schema = schema();
        let mapping = ColumnMapping::resolve(&header(), schema.fields());
        let parser = DateParser::default();
        RowValidator::new(schema.fields(), &mapping, schema.statuses(), &parser, report_day())
            .validate_rows(rows)
    }

    #[test]
    fn test_valid_row_is_coerced() {
        let outcome = run(&[row(&[
            text(" TASK-101 "),
            text("2,5"),
            text("Завершена"),
            text("24.12.2025"),
            text("yes"),
        ])]);

        assert!(outcome.is_valid());
        let record = &outcome.records[0];
        assert_eq!(record.get("task_number").unwrap().as_str(), Some("TASK-101"));
        assert_eq!(record.get("time_spent").unwrap().as_number(), Some(2.5));
        assert_eq!(record.get("status").unwrap().as_str(), Some("Завершена"));
        assert_eq!(
            record.get("done_on").unwrap().as_date().unwrap().to_rfc3339(),
            "2025-12-24T12:00:00+00:00"
        );
        assert_eq!(record.get("billable").unwrap().as_bool(), Some(true));
        // Unmapped optional number defaults to zero
        assert_eq!(record.get("extra").unwrap().as_number(), Some(0.0));

        let keys: Vec<&str> = record.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["task_number", "time_spent", "status", "done_on", "billable", "extra"]
        );
    }

    #[test]
    fn test_blank_row_is_skipped_without_error() {
        let outcome = run(&[
            row(&[text("  "), CellValue::Empty, text(""), CellValue::Empty, CellValue::Empty]),
            row(&[]),
        ]);
        assert!(outcome.records.is_empty());
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.skipped_rows, 2);
    }

    #[test]
    fn test_all_errors_of_a_row_are_reported() {
        let outcome = run(&[row(&[
            text(""),
            text("abc"),
            text("Unknown"),
            CellValue::Empty,
            text("maybe"),
        ])]);

        assert!(outcome.records.is_empty());
        let messages: Vec<_> = outcome.errors.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            messages,
            vec![
                "Row 2: Task field is empty",
                "Row 2: Spent must be a number",
                "Row 2: Status invalid value",
                "Row 2: Billable invalid value",
            ]
        );
    }

    #[test]
    fn test_errors_are_aggregated_across_rows() {
        let outcome = run(&[
            row(&[text("T-1"), text("1")]),
            row(&[text(""), text("1")]),
            row(&[text("T-3"), text("x")]),
            row(&[text("T-4"), CellValue::Number(4.0)]),
        ]);

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.errors.len(), 2);
        assert_eq!(outcome.errors[0].row_index, 3);
        assert_eq!(outcome.errors[0].field_title, "Task");
        assert_eq!(outcome.errors[1].row_index, 4);
        assert_eq!(outcome.errors[1].field_title, "Spent");
        assert!(!outcome.is_valid());
    }

    #[test]
    fn test_status_match_is_case_sensitive_after_trim() {
        let outcome = run(&[
            row(&[text("T-1"), text("1"), text("  В работе ")]),
            row(&[text("T-2"), text("1"), text("завершена")]),
        ]);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].get("status").unwrap().as_str(), Some("В работе"));
        assert_eq!(outcome.errors[0].message, "Status invalid value");
    }

    #[test]
    fn test_optional_date_falls_back_to_report_date() {
        let outcome = run(&[
            row(&[text("T-1"), text("1"), text(""), text("not a date")]),
            row(&[text("T-2"), text("1"), text(""), CellValue::DateTime(45655.0)]),
        ]);
        assert!(outcome.is_valid());
        assert_eq!(outcome.records[0].get("done_on").unwrap().as_date(), Some(report_day()));
        assert_eq!(
            outcome.records[1].get("done_on").unwrap().as_date().unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2024, 12, 29).unwrap()
        );
    }

    #[test]
    fn test_required_date_must_parse() {
        let schema = SchemaSnapshot::new(
            vec![FieldDefinition::new("day", "Day", FieldType::Date).required()],
            vec![],
        )
        .unwrap();
        let mapping = ColumnMapping::resolve(&[text("Day")], schema.fields());
        let parser = DateParser::default();
        let outcome = RowValidator::new(schema.fields(), &mapping, &[], &parser, report_day())
            .validate_rows(&[row(&[text("31.02.2025")])]);
        assert_eq!(outcome.errors[0].to_string(), "Row 2: Day invalid value");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("2,5"), Some(2.5));
        assert_eq!(parse_number(" 3 "), Some(3.0));
        assert_eq!(parse_number("-1.25"), Some(-1.25));
        assert_eq!(parse_number("1,000,5"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("two"), None);
    }

    #[test]
    fn test_validate_sheet_rejects_whole_batch_on_any_error() {
        let sheet = RawSheet {
            name: "Лист1".into(),
            rows: vec![
                header(),
                row(&[text("T-1"), text("1")]),
                row(&[text("T-2"), text("oops")]),
            ],
        };
        let err = validate_sheet(&sheet, &schema(), &DateParser::default(), report_day())
            .unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].row_index, 3);
    }

    #[test]
    fn test_validate_sheet_requires_data_rows() {
        let header_only = RawSheet {
            name: "Лист1".into(),
            rows: vec![header()],
        };
        assert!(matches!(
            validate_sheet(&header_only, &schema(), &DateParser::default(), report_day()),
            Err(IngestError::EmptySheet)
        ));

        let blank_rows = RawSheet {
            name: "Лист1".into(),
            rows: vec![header(), row(&[text(" ")])],
        };
        assert!(matches!(
            validate_sheet(&blank_rows, &schema(), &DateParser::default(), report_day()),
            Err(IngestError::EmptySheet)
        ));
    }

    #[test]
    fn test_validate_sheet_fails_fast_on_missing_columns() {
        let sheet = RawSheet {
            name: "Лист1".into(),
            rows: vec![row(&[text("Status")]), row(&[text("bogus")])],
        };
        let err = validate_sheet(&sheet, &schema(), &DateParser::default(), report_day())
            .unwrap_err();
        match err {
            IngestError::MissingColumns(titles) => assert_eq!(titles, vec!["Task", "Spent"]),
            other => panic!("unexpected error: {other}"),
        }
    }
}
