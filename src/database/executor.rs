use serde::Serialize;
use sqlx::{postgres::PgRow, FromRow, PgPool, Row};

use crate::query::{AppliedFilters, ProcessedQuery, SortSpec};

use super::pool::DatabaseError;
use super::sql::{bind_scalar, bind_scalar_as, render_where, validate_identifier};

/// Pagination metadata for list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl PageMeta {
    pub fn compute(total: i64, page: i64, limit: i64) -> Self {
        let total_pages = (total + limit - 1) / limit;
        Self {
            total,
            page,
            limit,
            total_pages,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}

/// One page of documents plus pagination metadata and the filter echo.
#[derive(Debug, Clone, Serialize)]
pub struct Paged<T> {
    pub data: Vec<T>,
    pub pagination: PageMeta,
    pub filters: AppliedFilters,
}

/// Run the count + page fetch pair for a processed query.
///
/// The two reads are independent (no transaction); a write landing between
/// them can make `total` disagree with the fetched page. Accepted for
/// read-mostly admin lists.
pub async fn fetch_page<T>(
    pool: &PgPool,
    table: &str,
    query: &ProcessedQuery,
    columns: Option<&[&str]>,
    sort: SortSpec,
) -> Result<Paged<T>, DatabaseError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    validate_identifier(table)?;
    validate_identifier(sort.column)?;

    let select_list = match columns {
        Some(cols) if !cols.is_empty() => {
            for col in cols {
                validate_identifier(col)?;
            }
            cols.iter().map(|c| format!("\"{}\"", c)).collect::<Vec<_>>().join(", ")
        }
        _ => "*".to_string(),
    };

    let rendered = render_where(&query.predicate)?;
    let pagination = query.pagination;

    let count_sql =
        format!("SELECT COUNT(*) AS count FROM \"{}\" WHERE {}", table, rendered.clause);
    let mut count_query = sqlx::query(&count_sql);
    for param in rendered.params.iter() {
        count_query = bind_scalar(count_query, param);
    }
    let total: i64 = count_query.fetch_one(pool).await?.try_get("count")?;

    let fetch_sql = format!(
        "SELECT {} FROM \"{}\" WHERE {} ORDER BY \"{}\" {} LIMIT {} OFFSET {}",
        select_list,
        table,
        rendered.clause,
        sort.column,
        sort.direction.to_sql(),
        pagination.limit,
        pagination.skip,
    );
    let mut fetch_query = sqlx::query_as::<_, T>(&fetch_sql);
    for param in rendered.params.iter() {
        fetch_query = bind_scalar_as(fetch_query, param);
    }
    let data = fetch_query.fetch_all(pool).await?;

    Ok(Paged {
        data,
        pagination: PageMeta::compute(total, pagination.page, pagination.limit),
        filters: query.applied.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_five_documents_limit_ten() {
        let first = PageMeta::compute(25, 1, 10);
        assert_eq!(first.total_pages, 3);
        assert!(first.has_next_page);
        assert!(!first.has_prev_page);

        let last = PageMeta::compute(25, 3, 10);
        assert!(!last.has_next_page);
        assert!(last.has_prev_page);

        // A page past the end still reports the true page count.
        let past = PageMeta::compute(25, 4, 10);
        assert_eq!(past.total_pages, 3);
        assert!(!past.has_next_page);
        assert!(past.has_prev_page);
    }

    #[test]
    fn exact_multiple_has_no_partial_page() {
        let meta = PageMeta::compute(30, 3, 10);
        assert_eq!(meta.total_pages, 3);
        assert!(!meta.has_next_page);
    }

    #[test]
    fn empty_result_set() {
        let meta = PageMeta::compute(0, 1, 10);
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next_page);
        assert!(!meta.has_prev_page);
    }
}
