//! Progress follow-ups, their derived fields and the verified lookup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{lenient, CallRecord, Record, TableKind};
use crate::scheduler::RepeatScheduler;

/// `verified` value for a user with no entry in the call log
pub const NOT_VERIFIED: &str = "არა";

/// A contact attempt or follow-up
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressRecord {
    /// Calendar date, `YYYY-MM-DD`
    #[serde(deserialize_with = "lenient::string")]
    pub date: String,
    /// Time of day, `HH:MM`, may be empty
    #[serde(deserialize_with = "lenient::string")]
    pub hour: String,
    #[serde(deserialize_with = "lenient::string")]
    pub source: String,
    #[serde(deserialize_with = "lenient::string")]
    pub operator: String,
    #[serde(deserialize_with = "lenient::string")]
    pub user_id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub contact: String,
    #[serde(deserialize_with = "lenient::string")]
    pub result: String,
    #[serde(deserialize_with = "lenient::string")]
    pub next_call: String,
    #[serde(deserialize_with = "lenient::string")]
    pub note: String,
    /// Next contact time, derived from date, hour, result and contact
    #[serde(deserialize_with = "lenient::string")]
    pub repeat: String,
    #[serde(deserialize_with = "lenient::string")]
    pub operator2: String,
    #[serde(deserialize_with = "lenient::string")]
    pub contact2: String,
    #[serde(deserialize_with = "lenient::string")]
    pub result2: String,
    #[serde(deserialize_with = "lenient::string")]
    pub comment: String,
    #[serde(deserialize_with = "lenient::string")]
    pub verified: String,
    #[serde(deserialize_with = "lenient::string")]
    pub category: String,
    /// Live records for the same user, derived
    #[serde(deserialize_with = "lenient::count")]
    pub count: u32,
    #[serde(deserialize_with = "lenient::flag")]
    pub deleted: bool,
}

impl Record for ProgressRecord {
    const KIND: TableKind = TableKind::Progress;

    const COLUMNS: &'static [&'static str] = &[
        "date", "hour", "source", "operator", "userId", "contact", "result", "nextCall", "note",
        "repeat", "operator2", "contact2", "result2", "comment", "verified", "category", "count",
    ];

    const DATE_COLUMNS: &'static [&'static str] = &["date"];

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    fn cell(&self, column: &str) -> Option<String> {
        let value = match column {
            "date" => &self.date,
            "hour" => &self.hour,
            "source" => &self.source,
            "operator" => &self.operator,
            "userId" => &self.user_id,
            "contact" => &self.contact,
            "result" => &self.result,
            "nextCall" => &self.next_call,
            "note" => &self.note,
            "repeat" => &self.repeat,
            "operator2" => &self.operator2,
            "contact2" => &self.contact2,
            "result2" => &self.result2,
            "comment" => &self.comment,
            "verified" => &self.verified,
            "category" => &self.category,
            "count" => return Some(self.count.to_string()),
            _ => return None,
        };
        Some(value.clone())
    }

    fn refresh_derived(records: &mut [Self]) {
        RepeatScheduler::default().apply(records);
        refresh_counts(records);
    }
}

/// Sets `count` on every record to the number of live records of its user.
fn refresh_counts(records: &mut [ProgressRecord]) {
    let mut per_user: HashMap<String, u32> = HashMap::new();
    for record in records.iter().filter(|r| !r.deleted) {
        *per_user.entry(record.user_id.clone()).or_insert(0) += 1;
    }
    for record in records.iter_mut() {
        record.count = per_user.get(&record.user_id).copied().unwrap_or(0);
    }
}

/// Default `verified` value for a user: the contact recorded for them in the
/// call log, or [`NOT_VERIFIED`].
pub fn verified_for(user_id: &str, calls: &[CallRecord]) -> String {
    calls
        .iter()
        .find(|call| !call.deleted && call.user_id == user_id)
        .map(|call| call.contact.clone())
        .unwrap_or_else(|| NOT_VERIFIED.to_string())
}
