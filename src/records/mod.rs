//! Record types for the three tracked tables.
//!
//! Every table is persisted as a flat JSON array of records. Field names are
//! camelCase on the wire; missing fields take their defaults and unknown
//! fields are dropped, so whatever a client posts is coerced into the table
//! schema before it reaches storage.

mod calls;
mod progress;
mod uploads;

pub use calls::CallRecord;
pub use progress::{verified_for, ProgressRecord, NOT_VERIFIED};
pub use uploads::UploadRecord;

use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

use crate::error::AppResult;

/// Identity of a tracked table.
///
/// The serialized form is the name used by change notifications
/// (`{"type": "progress"}`) and by the REST paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableKind {
    /// Call log
    #[serde(rename = "data")]
    Calls,
    /// Progress / follow-up log
    #[serde(rename = "progress")]
    Progress,
    /// Upload log
    #[serde(rename = "upload")]
    Uploads,
}

impl TableKind {
    pub const ALL: [TableKind; 3] = [TableKind::Calls, TableKind::Progress, TableKind::Uploads];

    /// Wire name of the table
    pub fn name(self) -> &'static str {
        match self {
            TableKind::Calls => "data",
            TableKind::Progress => "progress",
            TableKind::Uploads => "upload",
        }
    }

    /// GET path returning the non-deleted rows
    pub fn list_path(self) -> &'static str {
        match self {
            TableKind::Calls => "/data",
            TableKind::Progress => "/progress-data",
            TableKind::Uploads => "/upload-data",
        }
    }

    /// POST path replacing the whole table
    pub fn save_path(self) -> &'static str {
        match self {
            TableKind::Calls => "/save",
            TableKind::Progress => "/save-progress",
            TableKind::Uploads => "/save-upload",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        TableKind::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub(crate) fn index(self) -> usize {
        match self {
            TableKind::Calls => 0,
            TableKind::Progress => 1,
            TableKind::Uploads => 2,
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A row of one of the tracked tables.
pub trait Record:
    Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    /// Table this record type lives in
    const KIND: TableKind;

    /// Columns in display order. These are the columns that can be searched,
    /// filtered and sorted.
    const COLUMNS: &'static [&'static str];

    /// Columns compared as calendar dates when sorting
    const DATE_COLUMNS: &'static [&'static str] = &[];

    fn is_deleted(&self) -> bool;

    fn mark_deleted(&mut self);

    /// Display value of a column, `None` for unknown columns
    fn cell(&self, column: &str) -> Option<String>;

    /// Checks and stamps a record right before it is saved.
    fn prepare(&mut self, _today: NaiveDate) -> AppResult<()> {
        Ok(())
    }

    /// Recomputes derived fields over the whole table.
    fn refresh_derived(_records: &mut [Self]) {}
}

/// Today's date in local time
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Deserializers that accept whatever a spreadsheet-fed client sends for a
/// text or numeric field.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => String::new(),
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => other.to_string(),
        })
    }

    pub fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .map(|n| n.min(u32::MAX as u64) as u32)
                .unwrap_or(0),
            Value::String(s) => s.trim().parse().unwrap_or(0),
            _ => 0,
        })
    }

    pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(b) => b,
            Value::String(s) => s.trim() == "true",
            Value::Number(n) => n.as_i64().map(|n| n != 0).unwrap_or(false),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_kind_names() {
        assert_eq!(TableKind::Calls.name(), "data");
        assert_eq!(TableKind::Progress.save_path(), "/save-progress");
        assert_eq!(TableKind::Uploads.list_path(), "/upload-data");
        assert_eq!(TableKind::from_name("upload"), Some(TableKind::Uploads));
        assert_eq!(TableKind::from_name("uploads"), None);
    }

    #[test]
    fn test_table_kind_serializes_as_wire_name() {
        let json = serde_json::to_string(&TableKind::Calls).unwrap();
        assert_eq!(json, "\"data\"");

        let kind: TableKind = serde_json::from_str("\"progress\"").unwrap();
        assert_eq!(kind, TableKind::Progress);
    }

    #[test]
    fn test_lenient_fields() {
        let record: ProgressRecord = serde_json::from_str(
            r#"{"userId": 4512, "count": "3", "deleted": null, "extra": "dropped"}"#,
        )
        .unwrap();

        assert_eq!(record.user_id, "4512");
        assert_eq!(record.count, 3);
        assert!(!record.deleted);
        assert_eq!(record.hour, "");
    }
}
