//! Read the report sheet of an uploaded workbook

use std::fmt::Display;
use std::io::{Cursor, Read, Seek};

use calamine::{Data, Reader, Xls, Xlsx, open_workbook_from_rs};

use crate::ingest::error::IngestError;
use crate::ingest::types::CellValue;

/// Cells of one sheet; row 0 is the header
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawSheet {
    pub fn header(&self) -> &[CellValue] {
        self.rows.first().map(|r| r.as_slice()).unwrap_or(&[])
    }

    pub fn data_rows(&self) -> &[Vec<CellValue>] {
        self.rows.get(1..).unwrap_or(&[])
    }

    fn has_content(&self) -> bool {
        self.rows.iter().flatten().any(|c| !c.is_blank())
    }
}

/// Accepted upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookFormat {
    Xlsx,
    Xls,
}

impl WorkbookFormat {
    /// Format named by the file extension, compared case-insensitively
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let (_, extension) = file_name.rsplit_once('.')?;
        match extension.to_ascii_lowercase().as_str() {
            "xlsx" => Some(WorkbookFormat::Xlsx),
            "xls" => Some(WorkbookFormat::Xls),
            _ => None,
        }
    }
}

/// Decode an xlsx/xls workbook and pick its report sheet
///
/// `preferred_sheet` wins when present and non-empty; otherwise the first
/// sheet with any content is used.
pub fn read_workbook(
    bytes: &[u8],
    format: WorkbookFormat,
    preferred_sheet: &str,
) -> Result<RawSheet, IngestError> {
    let cursor = Cursor::new(bytes);
    match format {
        WorkbookFormat::Xlsx => open_workbook_from_rs::<Xlsx<_>, _>(cursor)
            .map_err(unreadable)
            .and_then(|workbook| pick_sheet(workbook, preferred_sheet)),
        WorkbookFormat::Xls => open_workbook_from_rs::<Xls<_>, _>(cursor)
            .map_err(unreadable)
            .and_then(|workbook| pick_sheet(workbook, preferred_sheet)),
    }
}

fn unreadable(e: impl Display) -> IngestError {
    IngestError::UnreadableWorkbook(e.to_string())
}

fn pick_sheet<RS, R>(mut workbook: R, preferred_sheet: &str) -> Result<RawSheet, IngestError>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: Display,
{
    let names = workbook.sheet_names();
    let ordered = names
        .iter()
        .filter(|n| n.as_str() == preferred_sheet)
        .chain(names.iter().filter(|n| n.as_str() != preferred_sheet));

    for name in ordered {
        let range = workbook
            .worksheet_range(name)
            .map_err(|e| IngestError::UnreadableWorkbook(format!("sheet '{}': {}", name, e)))?;

        let sheet = RawSheet {
            name: name.clone(),
            rows: range
                .rows()
                .map(|row| row.iter().map(cell_from_data).collect())
                .collect(),
        };

        if sheet.has_content() {
            log::debug!("Reading sheet '{}' ({} rows)", sheet.name, sheet.rows.len());
            return Ok(sheet);
        }
    }

    Err(IngestError::EmptySheet)
}

fn cell_from_data(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::DateTime(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}
