//! Workbook import and upload template export

mod reader;
mod template;

pub use reader::{RawSheet, WorkbookFormat, read_workbook};
pub use template::write_template;
