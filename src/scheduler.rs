//! Next-contact scheduling for progress records.
//!
//! Every live progress record gets a `repeat` value derived from its result
//! code, its contact code and its own date and hour:
//! - no result yet: empty
//! - a terminal result, or an unreachable contact: the "no further contact"
//!   sentinel
//! - a retry-soon result: one hour later, rolling into the next day past
//!   midnight
//! - anything else: the next day at the same time
//!
//! Records are visited in ascending timestamp order, but each value depends
//! only on its own record.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::records::ProgressRecord;

/// Output format of scheduled contact times
pub const REPEAT_FORMAT: &str = "%Y-%m-%d %H:%M";

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Result codes and sentinels the scheduler matches against
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Results after which the customer is not contacted again
    pub terminal_results: Vec<String>,
    /// Results that schedule another attempt an hour later
    pub retry_soon_results: Vec<String>,
    /// Contact code meaning the customer could not be reached
    pub unreachable_contact: String,
    /// `repeat` value for "no further contact"
    pub no_further_contact: String,
    /// Time of day used when a record has no hour
    pub default_hour: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            terminal_results: vec![
                "სხვისი ნომერი".to_string(),
                "არ სურს".to_string(),
                "ვერ".to_string(),
                "შედგა კომუნიკაცია".to_string(),
                "Res".to_string(),
            ],
            retry_soon_results: vec![
                "გათიშულია".to_string(),
                "არპასუხი".to_string(),
                "სხვა დროს დარეკვა".to_string(),
            ],
            unreachable_contact: "ვერ".to_string(),
            no_further_contact: "აღარ".to_string(),
            default_hour: "09:00".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_default_hour(mut self, hour: impl Into<String>) -> Self {
        self.default_hour = hour.into();
        self
    }

    /// Trims every configured code so that lookups against trimmed input
    /// can match.
    fn normalized(mut self) -> Self {
        for code in self
            .terminal_results
            .iter_mut()
            .chain(self.retry_soon_results.iter_mut())
        {
            *code = code.trim().to_string();
        }
        self.unreachable_contact = self.unreachable_contact.trim().to_string();
        self
    }
}

/// Computes `repeat` for progress records
#[derive(Debug, Clone)]
pub struct RepeatScheduler {
    config: SchedulerConfig,
}

impl Default for RepeatScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl RepeatScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config: config.normalized(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Recomputes `repeat` for every non-deleted record. Deleted records keep
    /// whatever value they had.
    pub fn apply(&self, records: &mut [ProgressRecord]) {
        let mut order: Vec<usize> = (0..records.len())
            .filter(|&i| !records[i].deleted)
            .collect();
        // stable: equal timestamps keep their relative order
        order.sort_by_key(|&i| self.timestamp(&records[i]));

        for i in order {
            records[i].repeat = self.next_contact(&records[i]);
        }
    }

    /// `repeat` value for a single record
    pub fn next_contact(&self, record: &ProgressRecord) -> String {
        let result = record.result.trim();
        let contact = record.contact.trim();

        if result.is_empty() {
            return String::new();
        }

        if self.config.terminal_results.iter().any(|r| r == result)
            || contact == self.config.unreachable_contact
        {
            return self.config.no_further_contact.clone();
        }

        let at = self.timestamp(record);
        let next = if self.config.retry_soon_results.iter().any(|r| r == result) {
            at.checked_add_signed(Duration::hours(1))
        } else {
            at.checked_add_signed(Duration::days(1))
        };

        next.unwrap_or(at).format(REPEAT_FORMAT).to_string()
    }

    /// The record's date combined with its hour, or the default hour when it
    /// has none.
    pub fn timestamp(&self, record: &ProgressRecord) -> NaiveDateTime {
        let hour = match record.hour.trim() {
            "" => self.config.default_hour.as_str(),
            hour => hour,
        };
        let start = parse_date(&record.date).and_time(NaiveTime::MIN);
        start
            .checked_add_signed(Duration::minutes(parse_minutes(hour) as i64))
            .unwrap_or(start)
    }
}

/// Parses a `YYYY-MM-DD` date, also accepting a longer ISO timestamp.
/// Anything else falls back to the epoch date.
pub fn parse_date(value: &str) -> NaiveDate {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            value
                .get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        })
        // 1970-01-01
        .unwrap_or_default()
}

/// Minutes since midnight of an `H:M` string. Components that do not parse
/// count as zero.
pub fn parse_minutes(value: &str) -> u32 {
    let mut parts = value.trim().splitn(2, ':');
    let hours = parts
        .next()
        .and_then(|h| h.trim().parse::<u32>().ok())
        .unwrap_or(0)
        .min(MINUTES_PER_DAY);
    let minutes = parts
        .next()
        .and_then(|m| m.trim().parse::<u32>().ok())
        .unwrap_or(0)
        .min(MINUTES_PER_DAY);
    hours * 60 + minutes
}

/// Fraction of a day for an `HH:MM` string, 0 for an empty string
pub fn time_to_fraction(value: &str) -> f64 {
    if value.trim().is_empty() {
        return 0.0;
    }
    parse_minutes(value) as f64 / MINUTES_PER_DAY as f64
}

/// `HH:MM` for a fraction of a day. Whole days are discarded and the value
/// is rounded to the nearest second before minutes are taken.
pub fn fraction_to_time(fraction: f64) -> String {
    if !fraction.is_finite() {
        return "00:00".to_string();
    }
    let seconds = (fraction.rem_euclid(1.0) * 86_400.0).round() as u32 % 86_400;
    format!("{:02}:{:02}", seconds / 3600, (seconds / 60) % 60)
}
