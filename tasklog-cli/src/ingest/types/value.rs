//! Cell values read from a sheet and typed values produced by validation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::date::{format_day, serial_to_datetime};

/// An untyped cell as read from a spreadsheet
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Date-formatted cell, kept as its spreadsheet serial
    DateTime(f64),
}

impl CellValue {
    /// Empty, or text made of whitespace only
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Render the cell the way a user would read it in the sheet
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Bool(b) => b.to_string(),
            CellValue::DateTime(serial) => match serial_to_datetime(*serial) {
                Some(dt) => format_day(dt.date_naive()),
                None => format_number(*serial),
            },
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// A validated value stored in a task record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskValue {
    Bool(bool),
    Number(f64),
    Date(DateTime<Utc>),
    Text(String),
}

impl TaskValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TaskValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            TaskValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            TaskValue::Date(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TaskValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskValue::Bool(b) => write!(f, "{}", b),
            TaskValue::Number(n) => write!(f, "{}", n),
            TaskValue::Date(dt) => write!(f, "{}", dt.to_rfc3339()),
            TaskValue::Text(s) => write!(f, "{}", s),
        }
    }
}
