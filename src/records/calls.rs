//! Scheduled calls and their date check.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{lenient, Record, TableKind};
use crate::error::{AppError, AppResult};

/// Shown when a call is scheduled for a day that has already passed
pub const PAST_CALL_DATE: &str = "დარეკვის თარიღი უნდა იყოს დღევანდელი ან მომავალი თარიღი.";

/// A scheduled call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallRecord {
    #[serde(deserialize_with = "lenient::string")]
    pub call_date: String,
    #[serde(deserialize_with = "lenient::string")]
    pub user_id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub reg_date: String,
    #[serde(deserialize_with = "lenient::string")]
    pub operator: String,
    #[serde(deserialize_with = "lenient::string")]
    pub contact: String,
    #[serde(deserialize_with = "lenient::string")]
    pub comment: String,
    #[serde(deserialize_with = "lenient::string")]
    pub other_note: String,
    #[serde(deserialize_with = "lenient::flag")]
    pub deleted: bool,
}

impl CallRecord {
    /// Rejects a call date before `today`. Dates that do not parse are let
    /// through unchanged.
    pub fn validate(&self, today: NaiveDate) -> AppResult<()> {
        match NaiveDate::parse_from_str(self.call_date.trim(), "%Y-%m-%d") {
            Ok(date) if date < today => Err(AppError::Validation(PAST_CALL_DATE.to_string())),
            _ => Ok(()),
        }
    }
}

impl Record for CallRecord {
    const KIND: TableKind = TableKind::Calls;

    const COLUMNS: &'static [&'static str] = &[
        "callDate",
        "userId",
        "regDate",
        "operator",
        "contact",
        "comment",
        "otherNote",
    ];

    const DATE_COLUMNS: &'static [&'static str] = &["callDate", "regDate"];

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    fn cell(&self, column: &str) -> Option<String> {
        let value = match column {
            "callDate" => &self.call_date,
            "userId" => &self.user_id,
            "regDate" => &self.reg_date,
            "operator" => &self.operator,
            "contact" => &self.contact,
            "comment" => &self.comment,
            "otherNote" => &self.other_note,
            _ => return None,
        };
        Some(value.clone())
    }

    fn prepare(&mut self, today: NaiveDate) -> AppResult<()> {
        self.validate(today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(date: &str) -> CallRecord {
        CallRecord {
            call_date: date.to_string(),
            user_id: "1001".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_past_call_date_rejected() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        let err = call("2024-03-09").validate(today).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert!(call("2024-03-10").validate(today).is_ok());
        assert!(call("2024-04-01").validate(today).is_ok());
    }

    #[test]
    fn test_unparseable_call_date_passes() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert!(call("").validate(today).is_ok());
        assert!(call("next week").validate(today).is_ok());
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(call("2024-03-10")).unwrap();
        assert_eq!(json["callDate"], "2024-03-10");
        assert_eq!(json["userId"], "1001");
        assert_eq!(json["otherNote"], "");
        assert_eq!(json["deleted"], false);
    }
}
