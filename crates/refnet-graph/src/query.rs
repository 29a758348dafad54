//! Member query pipeline: filter, sort, paginate.
//!
//! Three pure stages over the canonical member list produced by
//! `collect_all`. None of them mutate their input; each returns a derived
//! view, so running the pipeline twice with the same inputs gives the same
//! output.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use refnet_store::Status;

use crate::schema::MemberRow;

/// Malformed filter or sort input from the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("unknown sort key: {0}")]
    UnknownSortKey(String),

    #[error("unknown status filter: {0}")]
    UnknownStatus(String),

    #[error("level filter is not a number: {0}")]
    BadLevel(String),

    #[error("page size must be at least 1")]
    BadPageSize,

    #[error("pages are numbered from 1")]
    BadPage,
}

/// Which rows to keep. All set criteria are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Exact level match.
    pub level: Option<u32>,
    /// Exact status match.
    pub status: Option<Status>,
    /// Substring over name or email, stored verbatim and case-folded at
    /// match time.
    pub search: Option<String>,
}

impl FilterCriteria {
    /// Parse raw form-style inputs; empty strings mean "unset".
    pub fn parse(
        level: Option<&str>,
        status: Option<&str>,
        search: Option<&str>,
    ) -> Result<Self, QueryError> {
        let level = match level.filter(|s| !s.is_empty()) {
            Some(s) => Some(
                s.parse::<u32>()
                    .map_err(|_| QueryError::BadLevel(s.to_string()))?,
            ),
            None => None,
        };
        let status = match status.filter(|s| !s.is_empty()) {
            Some(s) => {
                Some(Status::parse(s).ok_or_else(|| QueryError::UnknownStatus(s.to_string()))?)
            }
            None => None,
        };
        let search = search.filter(|s| !s.is_empty()).map(str::to_string);
        Ok(Self {
            level,
            status,
            search,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.level.is_none() && self.status.is_none() && self.search.is_none()
    }

    fn matches(&self, row: &MemberRow) -> bool {
        if let Some(level) = self.level {
            if row.level != level {
                return false;
            }
        }
        if let Some(status) = self.status {
            if row.status != status {
                return false;
            }
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            if !row.name.to_lowercase().contains(&term)
                && !row.email.to_lowercase().contains(&term)
            {
                return false;
            }
        }
        true
    }
}

/// Ordering applied to the filtered list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    /// Lexicographic ascending.
    Name,
    /// Descending: biggest balances first.
    Points,
    /// Ascending: closest to the root first.
    Level,
    /// Descending: most recent members first. The default.
    #[default]
    JoinDate,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::Points => "points",
            SortKey::Level => "level",
            SortKey::JoinDate => "joinDate",
        }
    }

    pub fn parse(s: &str) -> Result<Self, QueryError> {
        match s {
            "name" => Ok(SortKey::Name),
            "points" => Ok(SortKey::Points),
            "level" => Ok(SortKey::Level),
            "joinDate" => Ok(SortKey::JoinDate),
            other => Err(QueryError::UnknownSortKey(other.to_string())),
        }
    }
}

/// One page of a filtered, sorted member list.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub rows: Vec<MemberRow>,
    pub current_page: usize,
    pub total_pages: usize,
    /// Filtered row count across all pages.
    pub total_rows: usize,
}

/// Keep the rows matching `criteria`, preserving relative order.
pub fn filter_rows(rows: &[MemberRow], criteria: &FilterCriteria) -> Vec<MemberRow> {
    rows.iter()
        .filter(|row| criteria.matches(row))
        .cloned()
        .collect()
}

/// Stable sort by the requested key; ties keep their pre-sort order.
pub fn sort_rows(mut rows: Vec<MemberRow>, key: SortKey) -> Vec<MemberRow> {
    match key {
        SortKey::Name => rows.sort_by(|a, b| a.name.cmp(&b.name)),
        SortKey::Points => rows.sort_by(|a, b| b.points.cmp(&a.points)),
        SortKey::Level => rows.sort_by(|a, b| a.level.cmp(&b.level)),
        SortKey::JoinDate => rows.sort_by(|a, b| b.join_date.cmp(&a.join_date)),
    }
    rows
}

/// Slice out the 1-based `current_page`. A page past the end yields an
/// empty slice, not an error; `total_pages` is at least 1 even for an
/// empty list so navigation always has somewhere to stand.
pub fn paginate(
    rows: &[MemberRow],
    page_size: usize,
    current_page: usize,
) -> Result<Page, QueryError> {
    if page_size == 0 {
        return Err(QueryError::BadPageSize);
    }
    if current_page == 0 {
        return Err(QueryError::BadPage);
    }
    let total_rows = rows.len();
    let total_pages = (total_rows.div_ceil(page_size)).max(1);
    let start = (current_page - 1).saturating_mul(page_size);
    let rows = rows
        .iter()
        .skip(start)
        .take(page_size)
        .cloned()
        .collect();
    Ok(Page {
        rows,
        current_page,
        total_pages,
        total_rows,
    })
}

/// Stateful management view over a canonical member list.
///
/// Owns the unfiltered rows and the current filter/sort/pagination state.
/// Changing the filter criteria resets to page 1; page navigation clamps
/// to the valid range.
#[derive(Debug, Clone)]
pub struct MemberView {
    rows: Vec<MemberRow>,
    criteria: FilterCriteria,
    sort: SortKey,
    page_size: usize,
    current_page: usize,
}

impl MemberView {
    pub fn new(rows: Vec<MemberRow>) -> Self {
        Self {
            rows,
            criteria: FilterCriteria::default(),
            sort: SortKey::default(),
            page_size: 10,
            current_page: 1,
        }
    }

    /// Replace the canonical list after a reload; keeps filter and sort,
    /// resets to page 1.
    pub fn reload(&mut self, rows: Vec<MemberRow>) {
        self.rows = rows;
        self.current_page = 1;
    }

    /// Replace the filter criteria and reset to page 1.
    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        self.criteria = criteria;
        self.current_page = 1;
    }

    /// Changing the sort order keeps the current page.
    pub fn set_sort(&mut self, sort: SortKey) {
        self.sort = sort;
    }

    pub fn set_page_size(&mut self, page_size: usize) -> Result<(), QueryError> {
        if page_size == 0 {
            return Err(QueryError::BadPageSize);
        }
        self.page_size = page_size;
        self.current_page = 1;
        Ok(())
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// Run the pipeline for the current state.
    pub fn page(&self) -> Page {
        let filtered = filter_rows(&self.rows, &self.criteria);
        let sorted = sort_rows(filtered, self.sort);
        // page_size and current_page are maintained valid by construction
        paginate(&sorted, self.page_size, self.current_page)
            .unwrap_or(Page {
                rows: Vec::new(),
                current_page: self.current_page,
                total_pages: 1,
                total_rows: 0,
            })
    }

    fn total_pages(&self) -> usize {
        let filtered = filter_rows(&self.rows, &self.criteria);
        (filtered.len().div_ceil(self.page_size)).max(1)
    }

    /// Advance one page, clamped to the last page.
    pub fn next_page(&mut self) {
        if self.current_page < self.total_pages() {
            self.current_page += 1;
        }
    }

    /// Go back one page, clamped to page 1.
    pub fn prev_page(&mut self) {
        if self.current_page > 1 {
            self.current_page -= 1;
        }
    }
}
