use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::predicate::Predicate;

/// Raw query-string parameters accepted by every list endpoint.
/// All fields optional; malformed values degrade instead of erroring.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub date: Option<String>,
    /// Relative-time shortcut (`lastweek`, `thismonth`, ...). Despite the
    /// name this selects a date range, not an ordering.
    pub sort: Option<String>,
    /// Derived-status filter, honored by the plan-history endpoint only.
    pub status: Option<String>,
}

/// Numbers arrive as query-string text; anything unparseable becomes
/// `None` so the processor can fall back to defaults instead of the
/// framework rejecting the request.
fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.trim().parse().ok()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub skip: i64,
}

/// Inclusive bounds on the configured date axis. Either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Echo of the raw filter strings a request supplied, returned verbatim in
/// the response envelope so clients can report what was searched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AppliedFilters {
    pub search: Option<String>,
    #[serde(rename = "dateFilter")]
    pub date_filter: Option<String>,
    pub sort: Option<String>,
}

/// Output of the query processor: pagination plus a complete predicate
/// (search, date, and relative-time constraints already folded in).
/// Request-local; discarded after the response is sent.
#[derive(Debug, Clone)]
pub struct ProcessedQuery {
    pub pagination: Pagination,
    pub predicate: Predicate,
    pub applied: AppliedFilters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Numeric,
}

/// A document field eligible for `search` targeting, with the kind that
/// decides between substring matching and numeric equality.
#[derive(Debug, Clone, Copy)]
pub struct SearchField {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl SearchField {
    pub const fn text(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Text }
    }

    pub const fn numeric(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Numeric }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Result ordering for the page fetch. Defaults to the date axis, newest
/// first, at each call site.
#[derive(Debug, Clone, Copy)]
pub struct SortSpec {
    pub column: &'static str,
    pub direction: SortDirection,
}

impl SortSpec {
    pub const fn desc(column: &'static str) -> Self {
        Self { column, direction: SortDirection::Desc }
    }

    pub const fn asc(column: &'static str) -> Self {
        Self { column, direction: SortDirection::Asc }
    }
}
