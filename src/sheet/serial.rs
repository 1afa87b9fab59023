//! Spreadsheet serial date and time conversion.
//!
//! Spreadsheets store dates as days since 1899-12-30 and times as the
//! fraction of a day. Serial 25569 is 1970-01-01.

use chrono::{Duration, NaiveDate};

use super::Cell;
use crate::scheduler::fraction_to_time;

/// Serial number of 1970-01-01
pub const UNIX_EPOCH_SERIAL: f64 = 25569.0;

/// `YYYY-MM-DD` for a serial date; the time part is dropped. Out-of-range
/// serials give an empty string.
pub fn serial_to_date(serial: f64) -> String {
    if !serial.is_finite() {
        return String::new();
    }
    let days = (serial - UNIX_EPOCH_SERIAL).floor();
    if days.abs() > 3_000_000.0 {
        return String::new();
    }
    NaiveDate::default()
        .checked_add_signed(Duration::days(days as i64))
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// `HH:MM` for a serial time
pub fn serial_to_time(serial: f64) -> String {
    fraction_to_time(serial)
}

/// Date column value: numbers are serials, text is trimmed.
pub fn date_cell(cell: &Cell) -> String {
    match cell {
        Cell::Number(n) => serial_to_date(*n),
        other => other.to_text().trim().to_string(),
    }
}

/// Time column value: numbers below one are serial times, anything else is
/// kept as text.
pub fn time_cell(cell: &Cell) -> String {
    match cell {
        Cell::Number(n) if *n < 1.0 => serial_to_time(*n),
        other => other.to_text().trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_dates() {
        assert_eq!(serial_to_date(25569.0), "1970-01-01");
        assert_eq!(serial_to_date(45301.0), "2024-01-10");
        // time part is ignored
        assert_eq!(serial_to_date(45301.99), "2024-01-10");
        assert_eq!(serial_to_date(f64::INFINITY), "");
        assert_eq!(serial_to_date(1e12), "");
    }

    #[test]
    fn test_serial_times() {
        assert_eq!(serial_to_time(0.375), "09:00");
        assert_eq!(serial_to_time(0.979166666666667), "23:30");
    }

    #[test]
    fn test_cells() {
        assert_eq!(date_cell(&Cell::Number(45301.0)), "2024-01-10");
        assert_eq!(date_cell(&Cell::Text(" 2024-01-10 ".to_string())), "2024-01-10");
        assert_eq!(time_cell(&Cell::Number(0.5)), "12:00");
        assert_eq!(time_cell(&Cell::Number(3.0)), "3");
        assert_eq!(time_cell(&Cell::Text("10:15".to_string())), "10:15");
        assert_eq!(time_cell(&Cell::Empty), "");
    }
}
