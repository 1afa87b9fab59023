//! Spreadsheet import and export.
//!
//! Import reads the first worksheet of an xlsx workbook into a grid of
//! [`Cell`]s and maps it onto records: the call and progress tables map
//! columns by header text, the upload table by position. Export writes the
//! selected rows under a fixed header row into a single worksheet.

mod mapping;
mod reader;
pub mod serial;
mod writer;

pub use reader::read_xlsx;
pub use writer::write_xlsx;

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use crate::records::Record;

/// Errors that can occur while reading or writing workbooks
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("Failed to read workbook: {0}")]
    Read(String),

    #[error("Workbook has no worksheet")]
    NoWorksheet,

    #[error("Failed to write workbook: {0}")]
    Write(String),
}

impl From<calamine::XlsxError> for SheetError {
    fn from(err: calamine::XlsxError) -> Self {
        SheetError::Read(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for SheetError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        SheetError::Write(err.to_string())
    }
}

/// A cell read from a worksheet
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Text form of the cell. Whole numbers print without a fraction.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format_number(*n),
            Cell::Bool(b) => b.to_string(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// A value written to a worksheet
#[derive(Debug, Clone, PartialEq)]
pub enum SheetValue {
    Text(String),
    Number(f64),
}

impl From<&str> for SheetValue {
    fn from(s: &str) -> Self {
        SheetValue::Text(s.to_string())
    }
}

impl From<&String> for SheetValue {
    fn from(s: &String) -> Self {
        SheetValue::Text(s.clone())
    }
}

/// Clock values stamped onto imported rows
#[derive(Debug, Clone, Copy)]
pub struct ImportContext {
    pub today: NaiveDate,
    pub now: NaiveTime,
}

impl ImportContext {
    pub fn now() -> Self {
        let now = chrono::Local::now();
        Self {
            today: now.date_naive(),
            now: now.time(),
        }
    }
}

/// An exported workbook
#[derive(Debug, Clone)]
pub struct Export {
    /// Suggested file name
    pub file_name: &'static str,
    pub bytes: Vec<u8>,
}

/// A record type that can be moved in and out of spreadsheets
pub trait SheetRecord: Record {
    /// Name of the exported worksheet
    const SHEET_NAME: &'static str;

    /// File name offered for exports
    const FILE_NAME: &'static str;

    /// Header row of exports, in column order
    const EXPORT_HEADERS: &'static [&'static str];

    /// Cells of one exported row, matching [`Self::EXPORT_HEADERS`]
    fn export_row(&self) -> Vec<SheetValue>;

    /// Records for the rows of a worksheet grid, in sheet order
    fn import_rows(grid: &[Vec<Cell>], ctx: &ImportContext) -> Vec<Self>;
}

/// Export `rows` as an xlsx workbook.
pub fn export<'a, R, I>(rows: I) -> Result<Export, SheetError>
where
    R: SheetRecord,
    I: IntoIterator<Item = &'a R>,
{
    let values: Vec<Vec<SheetValue>> = rows.into_iter().map(|r| r.export_row()).collect();
    Ok(Export {
        file_name: R::FILE_NAME,
        bytes: write_xlsx(R::SHEET_NAME, R::EXPORT_HEADERS, &values)?,
    })
}

/// Parse an xlsx workbook into records.
pub fn import<R: SheetRecord>(bytes: &[u8], ctx: &ImportContext) -> Result<Vec<R>, SheetError> {
    let grid = read_xlsx(bytes)?;
    Ok(R::import_rows(&grid, ctx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_text() {
        assert_eq!(Cell::Number(1001.0).to_text(), "1001");
        assert_eq!(Cell::Number(2.5).to_text(), "2.5");
        assert_eq!(Cell::Bool(true).to_text(), "true");
        assert_eq!(Cell::Empty.to_text(), "");
    }

    #[test]
    fn test_blank_cells() {
        assert!(Cell::Empty.is_blank());
        assert!(Cell::Text("  ".to_string()).is_blank());
        assert!(!Cell::Number(0.0).is_blank());
    }
}
