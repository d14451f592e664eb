use axum::extract::Query;
use axum::response::Json;
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::executor::fetch_page;
use crate::database::models::{PlanHistory, StoreSummary};
use crate::database::pool::db_pool;
use crate::error::ApiError;
use crate::query::{self, Clause, CmpOp, ListParams, Scalar, SearchField, SortSpec};
use crate::services::enrichment;

const SEARCHABLE: &[SearchField] = &[SearchField::text("owner_username")];

/// GET /api/admin/plans/history - paginated purchase history with plan,
/// identity, and store enrichment.
pub async fn history_list(Query(params): Query<ListParams>) -> Result<Json<Value>, ApiError> {
    let pool = db_pool().await?;
    let now = Utc::now();

    let mut processed = query::process(&params, SEARCHABLE, "purchased_at");

    // `plan_id` targets the reference column directly; it is outside the
    // substring-searchable set because partial UUIDs are meaningless.
    if let Some((key, value)) = params.search.as_deref().and_then(query::split_key_value) {
        if key == "plan_id" {
            if let Ok(plan_id) = Uuid::parse_str(value) {
                processed.predicate.push(Clause::Cmp {
                    field: "plan_id".to_string(),
                    op: CmpOp::Eq,
                    value: Scalar::Uuid(plan_id),
                });
            }
        }
    }

    // The active/expired status is derived from expiry, so the filter is
    // pushed into the store-level predicate BEFORE pagination: the page
    // counts describe the filtered set, not the unfiltered one.
    match params.status.as_deref().map(str::trim).map(str::to_ascii_lowercase).as_deref() {
        Some("active") => processed.predicate.push(Clause::Cmp {
            field: "expires_at".to_string(),
            op: CmpOp::Gte,
            value: Scalar::Timestamp(now),
        }),
        Some("expired") => processed.predicate.push(Clause::Cmp {
            field: "expires_at".to_string(),
            op: CmpOp::Lt,
            value: Scalar::Timestamp(now),
        }),
        Some(other) if !other.is_empty() => {
            tracing::warn!("Ignoring unknown status filter: {}", other);
        }
        _ => {}
    }

    let page = fetch_page::<PlanHistory>(
        pool,
        "plan_history",
        &processed,
        None,
        SortSpec::desc("purchased_at"),
    )
    .await?;

    // Enrichment: batch-resolve referenced plans, then the denormalized
    // usernames against the identity store, then owners to stores. A
    // username that no longer resolves leaves null details; the history
    // row itself always renders.
    let mut plan_ids: Vec<Uuid> = page.data.iter().map(|h| h.plan_id).collect();
    plan_ids.sort_unstable();
    plan_ids.dedup();

    let mut usernames: Vec<String> = page.data.iter().map(|h| h.owner_username.clone()).collect();
    usernames.sort_unstable();
    usernames.dedup();

    let (plans, users) = tokio::try_join!(
        enrichment::plans_by_ids(pool, &plan_ids),
        enrichment::users_by_usernames(pool, &usernames),
    )?;

    let mut owner_ids: Vec<Uuid> = users.values().map(|u| u.id).collect();
    owner_ids.sort_unstable();
    owner_ids.dedup();
    let stores = enrichment::stores_by_owner_ids(pool, &owner_ids).await?;

    let rows: Vec<Value> = page
        .data
        .iter()
        .map(|history| {
            let user = users.get(&history.owner_username);
            let store = user.and_then(|u| stores.get(&u.id));
            json!({
                "id": history.id,
                "owner_username": history.owner_username,
                "plan_id": history.plan_id,
                "purchased_at": history.purchased_at,
                "expires_at": history.expires_at,
                "status": history.state_at(now),
                "plan_details": plans.get(&history.plan_id),
                "user_details": user,
                "store_details": store.map(|s| StoreSummary::from(s)),
            })
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": rows,
        "pagination": page.pagination,
        "filters": page.filters,
    })))
}
