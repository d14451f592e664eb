use axum::extract::Query;
use axum::response::Json;
use bigdecimal::{BigDecimal, FromPrimitive};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::executor::fetch_page;
use crate::database::models::{Plan, PlanStatus};
use crate::database::pool::db_pool;
use crate::error::ApiError;
use crate::query::{self, ListParams, SearchField, SortSpec};

const SEARCHABLE: &[SearchField] = &[
    SearchField::text("plan_name"),
    SearchField::text("status"),
    SearchField::numeric("plan_price"),
    SearchField::numeric("plan_validity_days"),
];

/// GET /api/admin/plans/list
pub async fn plan_list(Query(params): Query<ListParams>) -> Result<Json<Value>, ApiError> {
    let pool = db_pool().await?;

    let processed = query::process(&params, SEARCHABLE, "created_at");
    let page =
        fetch_page::<Plan>(pool, "plans", &processed, None, SortSpec::desc("created_at")).await?;

    Ok(Json(json!({
        "success": true,
        "data": page.data,
        "pagination": page.pagination,
        "filters": page.filters,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreatePlanRequest {
    pub plan_name: Option<String>,
    pub plan_validity_days: Option<i32>,
    pub plan_price: Option<f64>,
}

/// POST /api/admin/plans/create
pub async fn plan_create(Json(body): Json<CreatePlanRequest>) -> Result<Json<Value>, ApiError> {
    let (Some(plan_name), Some(validity_days), Some(price)) =
        (body.plan_name, body.plan_validity_days, body.plan_price)
    else {
        return Err(ApiError::bad_request(
            "plan_name, plan_validity_days, and plan_price are required",
        ));
    };

    let plan_name = plan_name.trim().to_string();
    if plan_name.is_empty() {
        return Err(ApiError::bad_request("plan_name cannot be empty"));
    }
    if validity_days < 1 {
        return Err(ApiError::bad_request("plan_validity_days must be a positive number"));
    }
    let price = to_price(price)?;

    let pool = db_pool().await?;

    let existing =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM \"plans\" WHERE \"plan_name\" = $1")
            .bind(&plan_name)
            .fetch_one(pool)
            .await?;
    if existing > 0 {
        return Err(ApiError::conflict("Plan with this name already exists"));
    }

    let plan = sqlx::query_as::<_, Plan>(
        "INSERT INTO \"plans\" (\"plan_name\", \"plan_validity_days\", \"plan_price\") \
         VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&plan_name)
    .bind(validity_days)
    .bind(&price)
    .fetch_one(pool)
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Plan created successfully",
        "data": plan,
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpdatePlanRequest {
    pub plan_id: Option<String>,
    pub plan_name: Option<String>,
    pub plan_validity_days: Option<i32>,
    pub plan_price: Option<f64>,
    pub status: Option<String>,
}

/// PUT /api/admin/plans/edit - partial update; absent fields keep their
/// current values.
pub async fn plan_update(Json(body): Json<UpdatePlanRequest>) -> Result<Json<Value>, ApiError> {
    let plan_id = body
        .plan_id
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("plan_id is required"))
        .and_then(|raw| {
            Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request("Invalid plan_id format"))
        })?;

    let plan_name = match body.plan_name {
        Some(name) => {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ApiError::bad_request("plan_name cannot be empty"));
            }
            Some(name)
        }
        None => None,
    };

    if let Some(days) = body.plan_validity_days {
        if days < 1 {
            return Err(ApiError::bad_request("plan_validity_days must be a positive number"));
        }
    }

    let price = body.plan_price.map(to_price).transpose()?;

    let status = match body.status.as_deref() {
        Some(raw) => Some(PlanStatus::parse(raw).ok_or_else(|| {
            ApiError::bad_request("status must be either 'active' or 'inactive'")
        })?),
        None => None,
    };

    let pool = db_pool().await?;

    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM \"plans\" WHERE \"id\" = $1")
        .bind(plan_id)
        .fetch_one(pool)
        .await?;
    if exists == 0 {
        return Err(ApiError::not_found("Plan not found"));
    }

    if let Some(name) = &plan_name {
        let taken = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM \"plans\" WHERE \"plan_name\" = $1 AND \"id\" <> $2",
        )
        .bind(name)
        .bind(plan_id)
        .fetch_one(pool)
        .await?;
        if taken > 0 {
            return Err(ApiError::conflict("Plan with this name already exists"));
        }
    }

    let plan = sqlx::query_as::<_, Plan>(
        "UPDATE \"plans\" SET \
            \"plan_name\" = COALESCE($1, \"plan_name\"), \
            \"plan_validity_days\" = COALESCE($2, \"plan_validity_days\"), \
            \"plan_price\" = COALESCE($3, \"plan_price\"), \
            \"status\" = COALESCE($4, \"status\"), \
            \"updated_at\" = now() \
         WHERE \"id\" = $5 RETURNING *",
    )
    .bind(plan_name)
    .bind(body.plan_validity_days)
    .bind(price)
    .bind(status)
    .bind(plan_id)
    .fetch_one(pool)
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Plan updated successfully",
        "data": plan,
    })))
}

#[derive(Debug, Deserialize)]
pub struct PlanStatusRequest {
    pub plan_id: Option<String>,
    pub status: Option<String>,
}

/// PATCH /api/admin/plans/status
pub async fn plan_status_update(
    Json(body): Json<PlanStatusRequest>,
) -> Result<Json<Value>, ApiError> {
    let plan_id = parse_plan_id(body.plan_id.as_deref())?;
    let status = body
        .status
        .as_deref()
        .and_then(PlanStatus::parse)
        .ok_or_else(|| ApiError::bad_request("Valid status is required (active or inactive)"))?;

    let pool = db_pool().await?;

    let plan = sqlx::query_as::<_, Plan>(
        "UPDATE \"plans\" SET \"status\" = $1, \"updated_at\" = now() WHERE \"id\" = $2 RETURNING *",
    )
    .bind(status)
    .bind(plan_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Plan not found"))?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Plan status updated to {} successfully", body.status.as_deref().unwrap_or_default()),
        "data": {
            "plan_id": plan.id,
            "plan_name": plan.plan_name,
            "status": plan.status,
            "updated_at": plan.updated_at,
        },
    })))
}

#[derive(Debug, Deserialize)]
pub struct PlanStatusQuery {
    pub plan_id: Option<String>,
}

/// GET /api/admin/plans/status?plan_id=...
pub async fn plan_status_get(
    Query(params): Query<PlanStatusQuery>,
) -> Result<Json<Value>, ApiError> {
    let plan_id = parse_plan_id(params.plan_id.as_deref())?;

    let pool = db_pool().await?;

    let plan = sqlx::query_as::<_, Plan>("SELECT * FROM \"plans\" WHERE \"id\" = $1")
        .bind(plan_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Plan not found"))?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "plan_id": plan.id,
            "plan_name": plan.plan_name,
            "status": plan.status,
            "created_at": plan.created_at,
            "updated_at": plan.updated_at,
        },
    })))
}

fn parse_plan_id(raw: Option<&str>) -> Result<Uuid, ApiError> {
    let raw = raw.ok_or_else(|| ApiError::bad_request("Plan ID is required"))?;
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request("Invalid plan_id format"))
}

fn to_price(raw: f64) -> Result<BigDecimal, ApiError> {
    if !raw.is_finite() || raw < 0.0 {
        return Err(ApiError::bad_request("plan_price must be a non-negative number"));
    }
    BigDecimal::from_f64(raw)
        .ok_or_else(|| ApiError::bad_request("plan_price must be a non-negative number"))
}
