//! Workbook reading with calamine.

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use std::io::Cursor;

use super::{Cell, SheetError};

/// Read the first worksheet of an xlsx workbook.
///
/// Column positions are absolute: if the used range starts at column C, the
/// first two cells of every row are [`Cell::Empty`]. Rows start at the first
/// used row.
pub fn read_xlsx(bytes: &[u8]) -> Result<Vec<Vec<Cell>>, SheetError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SheetError::NoWorksheet)??;

    let leading = range.start().map(|(_, col)| col as usize).unwrap_or(0);

    Ok(range
        .rows()
        .map(|row| {
            std::iter::repeat(Cell::Empty)
                .take(leading)
                .chain(row.iter().map(to_cell))
                .collect()
        })
        .collect())
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) => Cell::Empty,
    }
}
