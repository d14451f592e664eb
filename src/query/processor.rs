use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};

use crate::config;

use super::predicate::{Clause, CmpOp, Predicate, Scalar};
use super::types::{
    AppliedFilters, DateRange, FieldKind, ListParams, Pagination, ProcessedQuery, SearchField,
};

/// Parse raw list-endpoint query parameters into pagination plus a
/// complete predicate.
///
/// `fields` names the document fields eligible for `search` targeting and
/// `date_field` is the canonical date axis for the `date` and `sort`
/// filters. Malformed filter input never fails the request: it degrades to
/// "no filter applied" with a warning, because list endpoints must stay
/// available with client-supplied garbage in optional parameters.
pub fn process(params: &ListParams, fields: &[SearchField], date_field: &str) -> ProcessedQuery {
    process_at(Utc::now(), params, fields, date_field)
}

/// Deterministic core of [`process`] with an injected clock.
pub fn process_at(
    now: DateTime<Utc>,
    params: &ListParams,
    fields: &[SearchField],
    date_field: &str,
) -> ProcessedQuery {
    let cfg = &config::config().pagination;

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(cfg.default_limit).clamp(1, cfg.max_limit);
    let skip = (page - 1) * limit;
    let pagination = Pagination { page, limit, skip };

    let mut predicate = Predicate::new();

    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        apply_search(search, fields, &mut predicate);
    }

    // Absolute single-day filter first; a relative shortcut then narrows
    // (open start) or replaces (closed range) what the absolute filter set.
    let mut range = params.date.as_deref().and_then(parse_date_filter);

    if let Some(sort) = params.sort.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        match relative_range(now, sort) {
            Some(rel) if rel.end.is_some() => range = Some(rel),
            Some(rel) => {
                let current = range.take().unwrap_or_default();
                range = Some(DateRange { start: rel.start, end: current.end });
            }
            None => {}
        }
    }

    if let Some(range) = range {
        predicate = predicate.date_range(date_field, range);
    }

    ProcessedQuery {
        pagination,
        predicate,
        applied: AppliedFilters {
            search: params.search.clone(),
            date_filter: params.date.clone(),
            sort: params.sort.clone(),
        },
    }
}

/// `search` supports `key=value` (or `key:value`) targeting one field, and
/// free text matched across every text field.
fn apply_search(raw: &str, fields: &[SearchField], predicate: &mut Predicate) {
    if let Some((key, value)) = split_key_value(raw) {
        // Unknown keys are ignored on purpose; the filter echo still
        // reports the raw string.
        let Some(field) = fields.iter().find(|f| f.name == key) else {
            return;
        };

        match field.kind {
            FieldKind::Numeric => match value.parse::<f64>() {
                Ok(n) => predicate.push(Clause::Cmp {
                    field: field.name.to_string(),
                    op: CmpOp::Eq,
                    value: Scalar::Num(n),
                }),
                Err(_) => predicate.push(Clause::Contains {
                    field: field.name.to_string(),
                    needle: value.to_string(),
                }),
            },
            FieldKind::Text => predicate.push(Clause::Contains {
                field: field.name.to_string(),
                needle: value.to_string(),
            }),
        }
        return;
    }

    let ors: Vec<Clause> = fields
        .iter()
        .filter(|f| f.kind == FieldKind::Text)
        .map(|f| Clause::Contains { field: f.name.to_string(), needle: raw.to_string() })
        .collect();
    if !ors.is_empty() {
        predicate.push(Clause::AnyOf(ors));
    }
}

/// Split on the first `=` (or `:`); both halves trimmed. An empty key or
/// value falls back to free-text mode, matching the original clients.
/// Public so endpoints can special-case keys outside the searchable set
/// (the history endpoint's `plan_id`).
pub fn split_key_value(raw: &str) -> Option<(&str, &str)> {
    let idx = raw.find('=').or_else(|| raw.find(':'))?;
    let key = raw[..idx].trim();
    let value = raw[idx + 1..].trim();
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

/// `DD-MM-YYYY` (hyphenated, short first segment) or ISO
/// (`YYYY-MM-DD` / RFC3339), resolved to a whole-day UTC range.
fn parse_date_filter(raw: &str) -> Option<DateRange> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let Some(day) = parse_day(raw) else {
        tracing::warn!("Ignoring unparseable date filter: {}", raw);
        return None;
    };

    Some(DateRange { start: start_of_day(day), end: end_of_day(day) })
}

fn parse_day(raw: &str) -> Option<NaiveDate> {
    if raw.contains('-') && raw.split('-').next().is_some_and(|s| s.len() <= 2) {
        let mut parts = raw.splitn(3, '-');
        let day: u32 = parts.next()?.trim().parse().ok()?;
        let month: u32 = parts.next()?.trim().parse().ok()?;
        let year: i32 = parts.next()?.trim().parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).date_naive())
    })
}

/// Expand a relative-time shortcut into a concrete range at `now`.
/// Open-ended shortcuts ("last N units") set only the lower bound;
/// `lastmonth` is the one closed range. Unrecognized values are logged and
/// produce no constraint.
fn relative_range(now: DateTime<Utc>, raw: &str) -> Option<DateRange> {
    let key: String = raw.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect();

    let open = |start: DateTime<Utc>| DateRange { start: Some(start), end: None };

    match key.as_str() {
        "lastweek" | "last1week" => Some(open(now - Duration::days(7))),
        "thismonth" => Some(open(first_of_month(now)?)),
        "lastmonth" | "last1month" => {
            let this_month = first_of_month(now)?;
            let start = first_of_previous_month(now)?;
            let end = end_of_day(this_month.date_naive().pred_opt()?)?;
            Some(DateRange { start: Some(start), end: Some(end) })
        }
        "last3months" => Some(open(now.checked_sub_months(Months::new(3))?)),
        "last6months" => Some(open(now.checked_sub_months(Months::new(6))?)),
        "lastyear" | "last1year" | "lastoneyear" => {
            Some(open(now.checked_sub_months(Months::new(12))?))
        }
        "last2years" | "last2year" => Some(open(now.checked_sub_months(Months::new(24))?)),
        "last5years" | "last5year" => Some(open(now.checked_sub_months(Months::new(60))?)),
        _ => {
            tracing::warn!("Unknown relative-time filter: {}", raw);
            None
        }
    }
}

fn first_of_month(at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Some(NaiveDate::from_ymd_opt(at.year(), at.month(), 1)?.and_hms_opt(0, 0, 0)?.and_utc())
}

fn first_of_previous_month(at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (year, month) = if at.month() == 1 { (at.year() - 1, 12) } else { (at.year(), at.month() - 1) };
    Some(NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?.and_utc())
}

fn start_of_day(day: NaiveDate) -> Option<DateTime<Utc>> {
    Some(day.and_hms_opt(0, 0, 0)?.and_utc())
}

fn end_of_day(day: NaiveDate) -> Option<DateTime<Utc>> {
    Some(day.and_hms_milli_opt(23, 59, 59, 999)?.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FIELDS: &[SearchField] = &[
        SearchField::text("username"),
        SearchField::text("status"),
        SearchField::numeric("plan_price"),
    ];

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    fn params(page: Option<i64>, limit: Option<i64>) -> ListParams {
        ListParams { page, limit, ..Default::default() }
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn pagination_defaults() {
        let q = process_at(fixed_now(), &params(None, None), FIELDS, "created_at");
        assert_eq!(q.pagination, Pagination { page: 1, limit: 10, skip: 0 });
    }

    #[test]
    fn pagination_clamps_to_bounds() {
        let q = process_at(fixed_now(), &params(Some(-5), Some(500)), FIELDS, "created_at");
        assert_eq!(q.pagination, Pagination { page: 1, limit: 100, skip: 0 });

        let q = process_at(fixed_now(), &params(Some(0), Some(0)), FIELDS, "created_at");
        assert_eq!(q.pagination, Pagination { page: 1, limit: 1, skip: 0 });
    }

    #[test]
    fn pagination_computes_skip() {
        let q = process_at(fixed_now(), &params(Some(3), Some(25)), FIELDS, "created_at");
        assert_eq!(q.pagination, Pagination { page: 3, limit: 25, skip: 50 });
    }

    #[test]
    fn key_value_search_on_text_field() {
        let p = ListParams { search: Some("username=ali".into()), ..Default::default() };
        let q = process_at(fixed_now(), &p, FIELDS, "created_at");
        assert_eq!(
            q.predicate.clauses(),
            &[Clause::Contains { field: "username".into(), needle: "ali".into() }]
        );
    }

    #[test]
    fn colon_separator_also_accepted() {
        let p = ListParams { search: Some("status: active".into()), ..Default::default() };
        let q = process_at(fixed_now(), &p, FIELDS, "created_at");
        assert_eq!(
            q.predicate.clauses(),
            &[Clause::Contains { field: "status".into(), needle: "active".into() }]
        );
    }

    #[test]
    fn numeric_field_prefers_numeric_equality() {
        let p = ListParams { search: Some("plan_price=49.5".into()), ..Default::default() };
        let q = process_at(fixed_now(), &p, FIELDS, "created_at");
        assert_eq!(
            q.predicate.clauses(),
            &[Clause::Cmp {
                field: "plan_price".into(),
                op: CmpOp::Eq,
                value: Scalar::Num(49.5)
            }]
        );
    }

    #[test]
    fn numeric_field_falls_back_to_substring() {
        let p = ListParams { search: Some("plan_price=cheap".into()), ..Default::default() };
        let q = process_at(fixed_now(), &p, FIELDS, "created_at");
        assert_eq!(
            q.predicate.clauses(),
            &[Clause::Contains { field: "plan_price".into(), needle: "cheap".into() }]
        );
    }

    #[test]
    fn unknown_search_key_is_ignored() {
        let p = ListParams { search: Some("password=hunter2".into()), ..Default::default() };
        let q = process_at(fixed_now(), &p, FIELDS, "created_at");
        assert!(q.predicate.is_empty());
        assert_eq!(q.applied.search.as_deref(), Some("password=hunter2"));
    }

    #[test]
    fn free_text_fans_out_over_text_fields() {
        let p = ListParams { search: Some("alice".into()), ..Default::default() };
        let q = process_at(fixed_now(), &p, FIELDS, "created_at");
        assert_eq!(
            q.predicate.clauses(),
            &[Clause::AnyOf(vec![
                Clause::Contains { field: "username".into(), needle: "alice".into() },
                Clause::Contains { field: "status".into(), needle: "alice".into() },
            ])]
        );
    }

    #[test]
    fn dangling_separator_falls_back_to_free_text() {
        let p = ListParams { search: Some("=alice".into()), ..Default::default() };
        let q = process_at(fixed_now(), &p, FIELDS, "created_at");
        assert!(matches!(q.predicate.clauses(), [Clause::AnyOf(_)]));
    }

    #[test]
    fn absolute_date_dd_mm_yyyy() {
        let p = ListParams { date: Some("05-02-2024".into()), ..Default::default() };
        let q = process_at(fixed_now(), &p, FIELDS, "created_at");
        assert_eq!(
            q.predicate.clauses(),
            &[
                Clause::Cmp {
                    field: "created_at".into(),
                    op: CmpOp::Gte,
                    value: Scalar::Timestamp(utc(2024, 2, 5, 0, 0, 0)),
                },
                Clause::Cmp {
                    field: "created_at".into(),
                    op: CmpOp::Lte,
                    value: Scalar::Timestamp(
                        utc(2024, 2, 5, 23, 59, 59) + Duration::milliseconds(999)
                    ),
                },
            ]
        );
    }

    #[test]
    fn absolute_date_iso() {
        let p = ListParams { date: Some("2024-02-05".into()), ..Default::default() };
        let q = process_at(fixed_now(), &p, FIELDS, "created_at");
        assert_eq!(q.predicate.clauses().len(), 2);
    }

    #[test]
    fn unparseable_date_applies_no_constraint() {
        for garbage in ["notadate", "99-99-2024", "2024-13-40", ""] {
            let p = ListParams { date: Some(garbage.into()), ..Default::default() };
            let q = process_at(fixed_now(), &p, FIELDS, "created_at");
            assert!(q.predicate.is_empty(), "expected no predicate for {:?}", garbage);
        }
    }

    #[test]
    fn last_month_is_a_closed_range() {
        // Clock fixed mid-March 2024: last month is all of leap February.
        let p = ListParams { sort: Some("lastmonth".into()), ..Default::default() };
        let q = process_at(fixed_now(), &p, FIELDS, "purchased_at");
        assert_eq!(
            q.predicate.clauses(),
            &[
                Clause::Cmp {
                    field: "purchased_at".into(),
                    op: CmpOp::Gte,
                    value: Scalar::Timestamp(utc(2024, 2, 1, 0, 0, 0)),
                },
                Clause::Cmp {
                    field: "purchased_at".into(),
                    op: CmpOp::Lte,
                    value: Scalar::Timestamp(
                        utc(2024, 2, 29, 23, 59, 59) + Duration::milliseconds(999)
                    ),
                },
            ]
        );
    }

    #[test]
    fn last_month_tolerates_spacing_and_case() {
        let p = ListParams { sort: Some("Last Month".into()), ..Default::default() };
        let q = process_at(fixed_now(), &p, FIELDS, "purchased_at");
        assert_eq!(q.predicate.clauses().len(), 2);
    }

    #[test]
    fn last_week_sets_only_a_lower_bound() {
        let p = ListParams { sort: Some("lastweek".into()), ..Default::default() };
        let q = process_at(fixed_now(), &p, FIELDS, "purchased_at");
        assert_eq!(
            q.predicate.clauses(),
            &[Clause::Cmp {
                field: "purchased_at".into(),
                op: CmpOp::Gte,
                value: Scalar::Timestamp(fixed_now() - Duration::days(7)),
            }]
        );
    }

    #[test]
    fn this_month_starts_at_first_of_month() {
        let p = ListParams { sort: Some("thismonth".into()), ..Default::default() };
        let q = process_at(fixed_now(), &p, FIELDS, "purchased_at");
        assert_eq!(
            q.predicate.clauses(),
            &[Clause::Cmp {
                field: "purchased_at".into(),
                op: CmpOp::Gte,
                value: Scalar::Timestamp(utc(2024, 3, 1, 0, 0, 0)),
            }]
        );
    }

    #[test]
    fn open_relative_narrows_absolute_lower_bound() {
        // Absolute filter first, then an open-start shortcut: the upper
        // bound from the absolute day survives, the lower bound moves.
        let p = ListParams {
            date: Some("2024-03-10".into()),
            sort: Some("lastweek".into()),
            ..Default::default()
        };
        let q = process_at(fixed_now(), &p, FIELDS, "created_at");
        assert_eq!(
            q.predicate.clauses(),
            &[
                Clause::Cmp {
                    field: "created_at".into(),
                    op: CmpOp::Gte,
                    value: Scalar::Timestamp(fixed_now() - Duration::days(7)),
                },
                Clause::Cmp {
                    field: "created_at".into(),
                    op: CmpOp::Lte,
                    value: Scalar::Timestamp(
                        utc(2024, 3, 10, 23, 59, 59) + Duration::milliseconds(999)
                    ),
                },
            ]
        );
    }

    #[test]
    fn closed_relative_replaces_absolute_range() {
        let p = ListParams {
            date: Some("2024-03-10".into()),
            sort: Some("lastmonth".into()),
            ..Default::default()
        };
        let q = process_at(fixed_now(), &p, FIELDS, "created_at");
        match q.predicate.clauses() {
            [Clause::Cmp { value: Scalar::Timestamp(start), .. }, Clause::Cmp { value: Scalar::Timestamp(end), .. }] =>
            {
                assert_eq!(*start, utc(2024, 2, 1, 0, 0, 0));
                assert_eq!(*end, utc(2024, 2, 29, 23, 59, 59) + Duration::milliseconds(999));
            }
            other => panic!("unexpected clauses: {:?}", other),
        }
    }

    #[test]
    fn unknown_sort_applies_no_constraint() {
        let p = ListParams { sort: Some("sideways".into()), ..Default::default() };
        let q = process_at(fixed_now(), &p, FIELDS, "created_at");
        assert!(q.predicate.is_empty());
        assert_eq!(q.applied.sort.as_deref(), Some("sideways"));
    }

    #[test]
    fn year_shortcuts_use_month_arithmetic() {
        let p = ListParams { sort: Some("last2years".into()), ..Default::default() };
        let q = process_at(fixed_now(), &p, FIELDS, "created_at");
        assert_eq!(
            q.predicate.clauses(),
            &[Clause::Cmp {
                field: "created_at".into(),
                op: CmpOp::Gte,
                value: Scalar::Timestamp(utc(2022, 3, 15, 12, 0, 0)),
            }]
        );
    }

    #[test]
    fn filters_are_echoed_verbatim() {
        let p = ListParams {
            search: Some("username=ali".into()),
            date: Some("garbage".into()),
            sort: Some("lastweek".into()),
            ..Default::default()
        };
        let q = process_at(fixed_now(), &p, FIELDS, "created_at");
        assert_eq!(q.applied.search.as_deref(), Some("username=ali"));
        assert_eq!(q.applied.date_filter.as_deref(), Some("garbage"));
        assert_eq!(q.applied.sort.as_deref(), Some("lastweek"));
    }
}
