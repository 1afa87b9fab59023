//! Search, filter, sort and pagination state for one table.
//!
//! A view never touches the records themselves; it produces indices into the
//! table's in-memory list so that edits and deletes address the original
//! position.

use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::records::Record;

/// Rows shown per page
pub const ITEMS_PER_PAGE: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One page of a view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Indices into the table's record list
    pub rows: Vec<usize>,
    /// Zero-based page number
    pub number: usize,
    pub total_pages: usize,
    /// Rows matching the view across all pages
    pub total_rows: usize,
}

/// Per-table view state
#[derive(Debug, Clone)]
pub struct TableView {
    search: String,
    filters: BTreeMap<String, String>,
    sort: Option<(String, SortDirection)>,
    page: usize,
    per_page: usize,
}

impl Default for TableView {
    fn default() -> Self {
        Self {
            search: String::new(),
            filters: BTreeMap::new(),
            sort: None,
            page: 0,
            per_page: ITEMS_PER_PAGE,
        }
    }
}

impl TableView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, per_page: usize) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    /// Sets the free-text search and goes back to the first page.
    pub fn set_search(&mut self, query: impl Into<String>) {
        self.search = query.into();
        self.page = 0;
    }

    /// Restricts a column to one exact value. An empty value removes the
    /// filter.
    pub fn set_filter(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        if value.is_empty() {
            self.filters.remove(&column);
        } else {
            self.filters.insert(column, value);
        }
        self.page = 0;
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.page = 0;
    }

    pub fn filters(&self) -> &BTreeMap<String, String> {
        &self.filters
    }

    /// Sorts by `column`, flipping the direction when it is already the sort
    /// column.
    pub fn toggle_sort(&mut self, column: &str) {
        self.sort = match self.sort.take() {
            Some((current, SortDirection::Asc)) if current == column => {
                Some((current, SortDirection::Desc))
            }
            Some((current, SortDirection::Desc)) if current == column => {
                Some((current, SortDirection::Asc))
            }
            _ => Some((column.to_string(), SortDirection::Asc)),
        };
    }

    pub fn sort(&self) -> Option<(&str, SortDirection)> {
        self.sort.as_ref().map(|(c, d)| (c.as_str(), *d))
    }

    pub fn page_number(&self) -> usize {
        self.page
    }

    pub fn next_page<R: Record>(&mut self, records: &[R]) {
        let total_pages = self.page_count(self.matching(records).len());
        if self.page + 1 < total_pages {
            self.page += 1;
        }
    }

    pub fn prev_page(&mut self) {
        self.page = self.page.saturating_sub(1);
    }

    /// Indices of live records passing filters and search, in sort order
    pub fn matching<R: Record>(&self, records: &[R]) -> Vec<usize> {
        let query = self.search.to_lowercase();
        let mut rows: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_deleted())
            .filter(|(_, r)| self.passes_filters(*r))
            .filter(|(_, r)| {
                query.is_empty()
                    || R::COLUMNS.iter().any(|c| {
                        r.cell(c)
                            .map(|v| v.to_lowercase().contains(&query))
                            .unwrap_or(false)
                    })
            })
            .map(|(i, _)| i)
            .collect();

        if let Some((column, direction)) = &self.sort {
            let is_date = R::DATE_COLUMNS.contains(&column.as_str());
            rows.sort_by(|&a, &b| {
                let ka = SortKey::of(records[a].cell(column), is_date);
                let kb = SortKey::of(records[b].cell(column), is_date);
                let ord = ka.compare(&kb);
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        rows
    }

    /// The current page. A page number past the end is clamped to the last
    /// page.
    pub fn page<R: Record>(&self, records: &[R]) -> Page {
        let rows = self.matching(records);
        let total_rows = rows.len();
        let total_pages = self.page_count(total_rows);
        let number = self.page.min(total_pages.saturating_sub(1));
        let start = number * self.per_page;
        Page {
            rows: rows.into_iter().skip(start).take(self.per_page).collect(),
            number,
            total_pages,
            total_rows,
        }
    }

    /// Distinct values per column among the rows passing the current filters.
    /// Filters whose value no longer occurs are dropped.
    pub fn filter_options<R: Record>(&mut self, records: &[R]) -> BTreeMap<String, Vec<String>> {
        let live: Vec<&R> = records
            .iter()
            .filter(|r| !r.is_deleted() && self.passes_filters(*r))
            .collect();

        let mut options = BTreeMap::new();
        for column in R::COLUMNS {
            let values: BTreeSet<String> = live.iter().filter_map(|r| r.cell(column)).collect();
            if let Some(selected) = self.filters.get(*column) {
                if !values.contains(selected) {
                    self.filters.remove(*column);
                }
            }
            options.insert(column.to_string(), values.into_iter().collect());
        }
        options
    }

    fn passes_filters<R: Record>(&self, record: &R) -> bool {
        self.filters
            .iter()
            .all(|(column, value)| record.cell(column).as_deref() == Some(value.as_str()))
    }

    fn page_count(&self, rows: usize) -> usize {
        rows.div_ceil(self.per_page)
    }
}

/// Comparable form of a cell
#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Number(f64),
    Text(String),
}

impl SortKey {
    fn of(value: Option<String>, is_date: bool) -> Self {
        let value = value.unwrap_or_default();
        if is_date {
            return SortKey::Number(date_value(&value));
        }
        match value.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => SortKey::Number(n),
            _ => SortKey::Text(value.to_lowercase()),
        }
    }

    /// Numbers sort before text
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Number(_), SortKey::Text(_)) => Ordering::Less,
            (SortKey::Text(_), SortKey::Number(_)) => Ordering::Greater,
        }
    }
}

/// Days since the epoch for a date cell, 0 when it does not parse
fn date_value(value: &str) -> f64 {
    let value = value.trim();
    ["%Y-%m-%d", "%d %m %Y", "%d/%m/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .map(|date| (date - NaiveDate::default()).num_days() as f64)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{CallRecord, UploadRecord};

    fn call(date: &str, user: &str, operator: &str) -> CallRecord {
        CallRecord {
            call_date: date.to_string(),
            user_id: user.to_string(),
            operator: operator.to_string(),
            ..Default::default()
        }
    }

    fn sample() -> Vec<CallRecord> {
        vec![
            call("2024-03-02", "10", "Nino"),
            call("2024-01-15", "9", "giorgi"),
            CallRecord {
                deleted: true,
                ..call("2024-01-01", "1", "Nino")
            },
            call("2024-02-20", "100", "Ana"),
        ]
    }

    #[test]
    fn test_deleted_rows_hidden() {
        let view = TableView::new();
        assert_eq!(view.matching(&sample()), vec![0, 1, 3]);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let mut view = TableView::new();
        view.set_search("GIOR");
        assert_eq!(view.matching(&sample()), vec![1]);

        view.set_search("nino");
        assert_eq!(view.matching(&sample()), vec![0]);
    }

    #[test]
    fn test_sort_dates_and_numbers() {
        let records = sample();
        let mut view = TableView::new();

        view.toggle_sort("callDate");
        assert_eq!(view.matching(&records), vec![1, 3, 0]);

        view.toggle_sort("callDate");
        assert_eq!(view.sort(), Some(("callDate", SortDirection::Desc)));
        assert_eq!(view.matching(&records), vec![0, 3, 1]);

        // numeric strings compare as numbers
        view.toggle_sort("userId");
        assert_eq!(view.matching(&records), vec![1, 0, 3]);

        // text compares lowercased
        view.toggle_sort("operator");
        assert_eq!(view.matching(&records), vec![3, 1, 0]);
    }

    #[test]
    fn test_upload_validity_sorts_as_date() {
        let upload = |d: &str, m: &str, y: &str| UploadRecord {
            day: d.to_string(),
            month: m.to_string(),
            year: y.to_string(),
            ..Default::default()
        };
        let records = vec![upload("5", "11", "2025"), upload("20", "01", "2024"), upload("x", "", "")];

        let mut view = TableView::new();
        view.toggle_sort("completionValidity");
        assert_eq!(view.matching(&records), vec![2, 1, 0]);
    }

    #[test]
    fn test_filters_and_stale_options() {
        let records = sample();
        let mut view = TableView::new();

        view.set_filter("operator", "Nino");
        assert_eq!(view.matching(&records), vec![0]);

        let options = view.filter_options(&records);
        assert_eq!(options["userId"], vec!["10".to_string()]);

        view.set_filter("operator", "Somebody");
        view.filter_options(&records);
        assert!(view.filters().is_empty());

        let options = view.filter_options(&records);
        assert_eq!(options["operator"].len(), 3);
    }

    #[test]
    fn test_pagination() {
        let records: Vec<CallRecord> = (0..60)
            .map(|i| call("2024-01-01", &i.to_string(), "op"))
            .collect();
        let mut view = TableView::new();

        let page = view.page(&records);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_rows, 60);
        assert_eq!(page.rows.len(), ITEMS_PER_PAGE);

        view.next_page(&records);
        view.next_page(&records);
        view.next_page(&records);
        let page = view.page(&records);
        assert_eq!(page.number, 2);
        assert_eq!(page.rows, (50..60).collect::<Vec<_>>());

        view.set_search("5");
        assert_eq!(view.page_number(), 0);

        view.prev_page();
        assert_eq!(view.page_number(), 0);
    }

    #[test]
    fn test_empty_table_has_no_pages() {
        let view = TableView::new();
        let page = view.page::<CallRecord>(&[]);
        assert_eq!(page.total_pages, 0);
        assert!(page.rows.is_empty());
    }
}
