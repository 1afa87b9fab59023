//! Document upload log entries.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{lenient, Record, TableKind};
use crate::error::AppResult;

/// An entry of the document upload log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadRecord {
    /// Date the entry was recorded, stamped on save
    #[serde(deserialize_with = "lenient::string")]
    pub current_date: String,
    #[serde(deserialize_with = "lenient::string")]
    pub operator: String,
    #[serde(rename = "type", deserialize_with = "lenient::string")]
    pub kind: String,
    #[serde(deserialize_with = "lenient::string")]
    pub user_id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub day: String,
    #[serde(deserialize_with = "lenient::string")]
    pub month: String,
    #[serde(deserialize_with = "lenient::string")]
    pub year: String,
    #[serde(deserialize_with = "lenient::string")]
    pub upload_time: String,
    #[serde(deserialize_with = "lenient::flag")]
    pub deleted: bool,
}

impl UploadRecord {
    /// Validity date as "day month year"
    pub fn action_validity(&self) -> String {
        format!("{} {} {}", self.day, self.month, self.year)
    }

    /// Validity date as "day/month/year"
    pub fn completion_validity(&self) -> String {
        format!("{}/{}/{}", self.day, self.month, self.year)
    }
}

impl Record for UploadRecord {
    const KIND: TableKind = TableKind::Uploads;

    const COLUMNS: &'static [&'static str] = &[
        "currentDate",
        "operator",
        "type",
        "userId",
        "uploadTime",
        "actionValidity",
        "completionValidity",
    ];

    const DATE_COLUMNS: &'static [&'static str] =
        &["currentDate", "actionValidity", "completionValidity"];

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    fn cell(&self, column: &str) -> Option<String> {
        Some(match column {
            "currentDate" => self.current_date.clone(),
            "operator" => self.operator.clone(),
            "type" => self.kind.clone(),
            "userId" => self.user_id.clone(),
            "day" => self.day.clone(),
            "month" => self.month.clone(),
            "year" => self.year.clone(),
            "uploadTime" => self.upload_time.clone(),
            "actionValidity" => self.action_validity(),
            "completionValidity" => self.completion_validity(),
            _ => return None,
        })
    }

    fn prepare(&mut self, today: NaiveDate) -> AppResult<()> {
        self.current_date = today.format("%Y-%m-%d").to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_columns() {
        let record = UploadRecord {
            day: "5".to_string(),
            month: "11".to_string(),
            year: "2025".to_string(),
            ..Default::default()
        };

        assert_eq!(record.cell("actionValidity").unwrap(), "5 11 2025");
        assert_eq!(record.cell("completionValidity").unwrap(), "5/11/2025");
        assert!(record.cell("nope").is_none());
    }

    #[test]
    fn test_prepare_stamps_current_date() {
        let mut record = UploadRecord::default();
        record
            .prepare(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
            .unwrap();
        assert_eq!(record.current_date, "2024-02-29");
    }

    #[test]
    fn test_type_field_name() {
        let record: UploadRecord =
            serde_json::from_str(r#"{"type": "passport", "day": 7, "year": 2026}"#).unwrap();
        assert_eq!(record.kind, "passport");
        assert_eq!(record.day, "7");
        assert_eq!(record.year, "2026");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "passport");
    }
}
