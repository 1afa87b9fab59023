//! Header and column layouts of the three tables in workbooks.

use serde_json::{Map, Value};
use tracing::warn;

use super::serial::{date_cell, serial_to_time, time_cell};
use super::{Cell, ImportContext, SheetRecord, SheetValue};
use crate::records::{CallRecord, ProgressRecord, Record, UploadRecord};

/// Header text to record field for the call table. Later entries are
/// aliases matching the export headers.
const CALL_FIELDS: &[(&str, &str)] = &[
    ("დარეკვის თარიღი", "callDate"),
    ("მომხმარებლის ID", "userId"),
    ("რეგისტრაციის თარიღი", "regDate"),
    ("ოპერატორი", "operator"),
    ("კონტაქტი", "contact"),
    ("კომენტარი", "comment"),
    ("სხვა შენიშვნა (არსებობის შემთხვევაში)", "otherNote"),
    ("სხვა შენიშვნა", "otherNote"),
];

const PROGRESS_FIELDS: &[(&str, &str)] = &[
    ("Date", "date"),
    ("Hour", "hour"),
    ("Source", "source"),
    ("თამთა", "operator"),
    ("ოპერატორი", "operator"),
    ("UserID", "userId"),
    ("Contact", "contact"),
    ("Result", "result"),
    ("Next Call", "nextCall"),
    ("Note", "note"),
    ("განმეორებითი", "repeat"),
    ("Operator 2", "operator2"),
    ("Contact 2", "contact2"),
    ("Result 2", "result2"),
    ("კომენტარი", "comment"),
    ("Verified", "verified"),
    ("Category", "category"),
    ("Count", "count"),
];

/// Column positions of the upload sheet. Column 0 holds the upload date
/// and column 7 the validity; both are recomputed on import.
const UPLOAD_OPERATOR: usize = 1;
const UPLOAD_TYPE: usize = 2;
const UPLOAD_USER_ID: usize = 3;
const UPLOAD_DAY: usize = 4;
const UPLOAD_MONTH: usize = 5;
const UPLOAD_YEAR: usize = 6;
const UPLOAD_TIME: usize = 8;

const UPLOAD_COLUMNS: [usize; 7] = [
    UPLOAD_OPERATOR,
    UPLOAD_TYPE,
    UPLOAD_USER_ID,
    UPLOAD_DAY,
    UPLOAD_MONTH,
    UPLOAD_YEAR,
    UPLOAD_TIME,
];

impl SheetRecord for CallRecord {
    const SHEET_NAME: &'static str = "Data";
    const FILE_NAME: &'static str = "selected_data.xlsx";
    const EXPORT_HEADERS: &'static [&'static str] = &[
        "დარეკვის თარიღი",
        "მომხმარებლის ID",
        "რეგისტრაციის თარიღი",
        "ოპერატორი",
        "კონტაქტი",
        "კომენტარი",
        "სხვა შენიშვნა",
    ];

    fn export_row(&self) -> Vec<SheetValue> {
        vec![
            (&self.call_date).into(),
            (&self.user_id).into(),
            (&self.reg_date).into(),
            (&self.operator).into(),
            (&self.contact).into(),
            (&self.comment).into(),
            (&self.other_note).into(),
        ]
    }

    fn import_rows(grid: &[Vec<Cell>], _ctx: &ImportContext) -> Vec<Self> {
        map_by_header(grid, CALL_FIELDS, |field, cell| match field {
            "callDate" | "regDate" => date_cell(cell),
            _ => cell.to_text(),
        })
    }
}

impl SheetRecord for ProgressRecord {
    const SHEET_NAME: &'static str = "Progress";
    const FILE_NAME: &'static str = "selected_progress.xlsx";
    const EXPORT_HEADERS: &'static [&'static str] = &[
        "Date",
        "Hour",
        "Source",
        "ოპერატორი",
        "UserID",
        "Contact",
        "Result",
        "Next Call",
        "Note",
        "განმეორებითი",
        "Operator 2",
        "Contact 2",
        "Result 2",
        "კომენტარი",
        "Verified",
        "Category",
        "Count",
    ];

    fn export_row(&self) -> Vec<SheetValue> {
        vec![
            (&self.date).into(),
            (&self.hour).into(),
            (&self.source).into(),
            (&self.operator).into(),
            (&self.user_id).into(),
            (&self.contact).into(),
            (&self.result).into(),
            (&self.next_call).into(),
            (&self.note).into(),
            (&self.repeat).into(),
            (&self.operator2).into(),
            (&self.contact2).into(),
            (&self.result2).into(),
            (&self.comment).into(),
            (&self.verified).into(),
            (&self.category).into(),
            SheetValue::Number(self.count as f64),
        ]
    }

    fn import_rows(grid: &[Vec<Cell>], _ctx: &ImportContext) -> Vec<Self> {
        map_by_header(grid, PROGRESS_FIELDS, |field, cell| match field {
            "date" => date_cell(cell),
            "hour" => time_cell(cell),
            _ => cell.to_text(),
        })
    }
}

impl SheetRecord for UploadRecord {
    const SHEET_NAME: &'static str = "Upload";
    const FILE_NAME: &'static str = "selected_upload.xlsx";
    const EXPORT_HEADERS: &'static [&'static str] = &[
        "Date",
        "Operator",
        "Type",
        "UserID",
        "Day",
        "Month",
        "Year",
        "Validity",
        "Upload Time",
    ];

    fn export_row(&self) -> Vec<SheetValue> {
        vec![
            (&self.current_date).into(),
            (&self.operator).into(),
            (&self.kind).into(),
            (&self.user_id).into(),
            (&self.day).into(),
            (&self.month).into(),
            (&self.year).into(),
            SheetValue::Text(self.completion_validity()),
            (&self.upload_time).into(),
        ]
    }

    fn import_rows(grid: &[Vec<Cell>], ctx: &ImportContext) -> Vec<Self> {
        let today = ctx.today.format("%Y-%m-%d").to_string();
        let now = ctx.now.format("%H:%M").to_string();

        grid.iter()
            .enumerate()
            .filter(|(index, row)| !(*index == 0 && is_upload_header(row)))
            .map(|(_, row)| row)
            .filter(|row| !UPLOAD_COLUMNS.iter().all(|&col| cell_at(row, col).is_blank()))
            .map(|row| {
                let text = |col: usize| cell_at(row, col).to_text().trim().to_string();
                let upload_time = match cell_at(row, UPLOAD_TIME) {
                    Cell::Number(n) if *n < 1.0 => serial_to_time(*n),
                    cell if cell.is_blank() => now.clone(),
                    cell => cell.to_text().trim().to_string(),
                };

                UploadRecord {
                    current_date: today.clone(),
                    operator: text(UPLOAD_OPERATOR),
                    kind: text(UPLOAD_TYPE),
                    user_id: text(UPLOAD_USER_ID),
                    day: text(UPLOAD_DAY),
                    month: text(UPLOAD_MONTH),
                    year: text(UPLOAD_YEAR),
                    upload_time,
                    deleted: false,
                }
            })
            .collect()
    }
}

fn cell_at(row: &[Cell], col: usize) -> &Cell {
    row.get(col).unwrap_or(&Cell::Empty)
}

fn is_upload_header(row: &[Cell]) -> bool {
    UPLOAD_COLUMNS
        .iter()
        .all(|&col| cell_at(row, col).to_text().trim() == UploadRecord::EXPORT_HEADERS[col])
}

/// Maps rows onto records by the header text in the first row. Columns with
/// an unknown header are ignored; fields without a column are left empty.
fn map_by_header<R, F>(grid: &[Vec<Cell>], fields: &[(&str, &'static str)], convert: F) -> Vec<R>
where
    R: Record,
    F: Fn(&str, &Cell) -> String,
{
    let Some((header, rows)) = grid.split_first() else {
        return Vec::new();
    };

    let columns: Vec<(usize, &'static str)> = header
        .iter()
        .enumerate()
        .filter_map(|(col, cell)| {
            let text = cell.to_text();
            let text = text.trim();
            fields
                .iter()
                .find(|(name, _)| *name == text)
                .map(|(_, field)| (col, *field))
        })
        .collect();

    rows.iter()
        .filter(|row| !row.iter().all(Cell::is_blank))
        .filter_map(|row| {
            let mut object = Map::new();
            for (_, field) in fields {
                object.insert(field.to_string(), Value::String(String::new()));
            }
            for (col, field) in &columns {
                let value = convert(field, cell_at(row, *col));
                object.insert(field.to_string(), Value::String(value));
            }

            match serde_json::from_value::<R>(Value::Object(object)) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping {} row that does not fit the table: {}", R::KIND, e);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::{export, import};
    use chrono::{NaiveDate, NaiveTime};

    fn ctx() -> ImportContext {
        ImportContext {
            today: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            now: NaiveTime::from_hms_opt(14, 5, 0).unwrap(),
        }
    }

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn test_calls_by_header() {
        let grid = vec![
            vec![
                text("მომხმარებლის ID"),
                text("დარეკვის თარიღი"),
                text("უცნობი"),
                text("სხვა შენიშვნა (არსებობის შემთხვევაში)"),
            ],
            vec![Cell::Number(1001.0), Cell::Number(45301.0), text("x"), text("note")],
            vec![Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty],
            vec![text("1002"), text("2026-11-01"), Cell::Empty],
        ];

        let calls = CallRecord::import_rows(&grid, &ctx());

        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].user_id, "1001");
        assert_eq!(calls[0].call_date, "2024-01-10");
        assert_eq!(calls[0].other_note, "note");
        assert_eq!(calls[0].operator, "");
        assert_eq!(calls[1].call_date, "2026-11-01");
        assert_eq!(calls[1].other_note, "");
    }

    #[test]
    fn test_progress_legacy_headers() {
        let grid = vec![
            vec![text("Date"), text("Hour"), text("თამთა"), text("Count")],
            vec![Cell::Number(45301.0), Cell::Number(0.375), text("Nino"), Cell::Number(4.0)],
        ];

        let rows = ProgressRecord::import_rows(&grid, &ctx());

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, "2024-01-10");
        assert_eq!(rows[0].hour, "09:00");
        assert_eq!(rows[0].operator, "Nino");
        assert_eq!(rows[0].count, 4);
    }

    #[test]
    fn test_empty_grid() {
        assert!(CallRecord::import_rows(&[], &ctx()).is_empty());
        assert!(UploadRecord::import_rows(&[], &ctx()).is_empty());
    }

    #[test]
    fn test_uploads_by_position() {
        let grid = vec![
            vec![
                Cell::Empty,
                text("Nino"),
                text("passport"),
                Cell::Number(77.0),
                Cell::Number(1.0),
                Cell::Number(2.0),
                Cell::Number(2027.0),
                text("ignored"),
                Cell::Number(0.5),
            ],
            vec![Cell::Empty, text("Giorgi"), text("id card")],
            vec![Cell::Empty; 9],
        ];

        let uploads = UploadRecord::import_rows(&grid, &ctx());

        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0].current_date, "2026-10-19");
        assert_eq!(uploads[0].user_id, "77");
        assert_eq!(uploads[0].year, "2027");
        assert_eq!(uploads[0].upload_time, "12:00");
        assert_eq!(uploads[0].completion_validity(), "1/2/2027");
        assert_eq!(uploads[1].operator, "Giorgi");
        assert_eq!(uploads[1].upload_time, "14:05");
    }

    #[test]
    fn test_progress_round_trip() {
        let record = ProgressRecord {
            date: "2024-01-10".to_string(),
            hour: "23:30".to_string(),
            operator: "Nino".to_string(),
            user_id: "4512".to_string(),
            result: "არპასუხი".to_string(),
            repeat: "2024-01-11 00:30".to_string(),
            verified: "არა".to_string(),
            count: 2,
            ..Default::default()
        };

        let exported = export([&record]).unwrap();
        assert_eq!(exported.file_name, "selected_progress.xlsx");

        let imported: Vec<ProgressRecord> = import(&exported.bytes, &ctx()).unwrap();
        assert_eq!(imported, vec![record]);
    }

    #[test]
    fn test_calls_round_trip() {
        let record = CallRecord {
            call_date: "2026-11-02".to_string(),
            user_id: "1001".to_string(),
            reg_date: "2026-01-05".to_string(),
            operator: "Nino".to_string(),
            contact: "555".to_string(),
            comment: "c".to_string(),
            other_note: "n".to_string(),
            deleted: false,
        };

        let exported = export([&record]).unwrap();
        let imported: Vec<CallRecord> = import(&exported.bytes, &ctx()).unwrap();
        assert_eq!(imported, vec![record]);
    }

    #[test]
    fn test_upload_round_trip_skips_header() {
        let record = UploadRecord {
            current_date: "2026-10-01".to_string(),
            operator: "Nino".to_string(),
            kind: "passport".to_string(),
            user_id: "77".to_string(),
            day: "1".to_string(),
            month: "2".to_string(),
            year: "2027".to_string(),
            upload_time: "10:15".to_string(),
            deleted: false,
        };

        let exported = export([&record]).unwrap();
        let imported: Vec<UploadRecord> = import(&exported.bytes, &ctx()).unwrap();

        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].current_date, "2026-10-19");
        assert_eq!(imported[0].upload_time, "10:15");
        assert_eq!(imported[0].user_id, "77");
    }
}
