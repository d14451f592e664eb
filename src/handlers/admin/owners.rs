use axum::extract::{Path, Query};
use axum::response::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::executor::fetch_page;
use crate::database::models::{StoreSummary, User, UserRole};
use crate::database::pool::db_pool;
use crate::error::ApiError;
use crate::query::{self, Clause, CmpOp, ListParams, Scalar, SearchField, SortSpec};
use crate::services::enrichment;

const SEARCHABLE: &[SearchField] = &[
    SearchField::text("username"),
    SearchField::text("phone_number"),
    SearchField::text("status"),
];

/// GET /api/admin/owner-list - paginated, searchable owner listing.
pub async fn owner_list(Query(params): Query<ListParams>) -> Result<Json<Value>, ApiError> {
    let pool = db_pool().await?;

    let mut processed = query::process(&params, SEARCHABLE, "created_at");
    processed.predicate.push(Clause::Cmp {
        field: "role".to_string(),
        op: CmpOp::Eq,
        value: Scalar::Text("owner".to_string()),
    });

    let page =
        fetch_page::<User>(pool, "users", &processed, None, SortSpec::desc("created_at")).await?;

    Ok(Json(json!({
        "success": true,
        "data": page.data,
        "pagination": page.pagination,
        "filters": page.filters,
    })))
}

/// GET /api/admin/owner-list/view/:username - owner detail with
/// best-effort store enrichment.
pub async fn owner_view(Path(username): Path<String>) -> Result<Json<Value>, ApiError> {
    if username.trim().is_empty() {
        return Err(ApiError::bad_request("Username is required"));
    }

    let pool = db_pool().await?;

    let user = enrichment::find_user_by_username(pool, username.trim())
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let store = enrichment::find_store_by_owner(pool, user.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "user": user,
            "store": store.as_ref().map(StoreSummary::from),
        },
    })))
}

/// PATCH /api/admin/owner-status/:owner_id - flip an owner between active
/// and inactive.
pub async fn owner_status_toggle(Path(owner_id): Path<String>) -> Result<Json<Value>, ApiError> {
    let owner_id = Uuid::parse_str(owner_id.trim())
        .map_err(|_| ApiError::bad_request("Valid owner id is required"))?;

    let pool = db_pool().await?;

    let owner = sqlx::query_as::<_, User>(
        "SELECT * FROM \"users\" WHERE \"id\" = $1 AND \"role\" = $2",
    )
    .bind(owner_id)
    .bind(UserRole::Owner)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Owner not found"))?;

    let new_status = owner.status.toggled();
    let updated = sqlx::query_as::<_, User>(
        "UPDATE \"users\" SET \"status\" = $1, \"updated_at\" = now() WHERE \"id\" = $2 RETURNING *",
    )
    .bind(new_status)
    .bind(owner_id)
    .fetch_one(pool)
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Owner status changed to {}", new_status.as_str()),
        "data": {
            "id": updated.id,
            "status": updated.status,
        },
    })))
}
