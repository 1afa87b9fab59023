//! Workbook writing with rust_xlsxwriter.

use rust_xlsxwriter::{Color, Format, FormatBorder, FormatPattern, Workbook};

use super::{SheetError, SheetValue};

/// Write a single-sheet workbook: a bold header row followed by `rows`.
pub fn write_xlsx(
    sheet_name: &str,
    headers: &[&str],
    rows: &[Vec<SheetValue>],
) -> Result<Vec<u8>, SheetError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0xD9E1F2))
        .set_pattern(FormatPattern::Solid)
        .set_border(FormatBorder::Thin);

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();

    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    for (index, values) in rows.iter().enumerate() {
        let row = (index + 1) as u32;
        for (col, value) in values.iter().enumerate() {
            let width = match value {
                SheetValue::Text(s) => {
                    worksheet.write_string(row, col as u16, s)?;
                    s.chars().count()
                }
                SheetValue::Number(n) => {
                    worksheet.write_number(row, col as u16, *n)?;
                    n.to_string().len()
                }
            };
            if let Some(w) = widths.get_mut(col) {
                *w = (*w).max(width);
            }
        }
    }

    for (col, width) in widths.iter().enumerate() {
        worksheet.set_column_width(col as u16, (*width).min(60) as f64 + 2.0)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    Ok(workbook.save_to_buffer()?)
}
