use axum::response::Json;
use bigdecimal::BigDecimal;
use chrono::{Duration, NaiveTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::pool::db_pool;
use crate::error::ApiError;

/// GET /api/admin/dashboard/stats - aggregate platform counters, overall
/// and for the current day.
pub async fn stats() -> Result<Json<Value>, ApiError> {
    let pool = db_pool().await?;

    let now = Utc::now();
    let start_of_today = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let end_of_today = start_of_today + Duration::days(1);

    let (total_owners, total_stores, active_subscriptions, free_plan_owners, total_revenue) =
        tokio::try_join!(
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM \"users\" WHERE \"role\" = 'owner' AND \"status\" = 'active'",
            )
            .fetch_one(pool),
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM \"stores\"").fetch_one(pool),
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM \"plan_history\" WHERE \"expires_at\" >= $1",
            )
            .bind(now)
            .fetch_one(pool),
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM \"users\" u \
                 WHERE u.\"role\" = 'owner' AND u.\"status\" = 'active' \
                 AND NOT EXISTS (\
                     SELECT 1 FROM \"plan_history\" h \
                     WHERE h.\"owner_username\" = u.\"username\" AND h.\"expires_at\" >= $1\
                 )",
            )
            .bind(now)
            .fetch_one(pool),
            sqlx::query_scalar::<_, BigDecimal>(
                "SELECT COALESCE(SUM(p.\"plan_price\"), 0) \
                 FROM \"plan_history\" h JOIN \"plans\" p ON p.\"id\" = h.\"plan_id\" \
                 WHERE h.\"expires_at\" >= $1",
            )
            .bind(now)
            .fetch_one(pool),
        )?;

    let (
        today_registrations,
        today_stores,
        today_purchases,
        today_active_purchases,
        today_free_owners,
        today_revenue,
    ) = tokio::try_join!(
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM \"users\" \
                 WHERE \"role\" = 'owner' AND \"status\" = 'active' \
                 AND \"created_at\" >= $1 AND \"created_at\" < $2",
            )
            .bind(start_of_today)
            .bind(end_of_today)
            .fetch_one(pool),
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM \"stores\" WHERE \"created_at\" >= $1 AND \"created_at\" < $2",
            )
            .bind(start_of_today)
            .bind(end_of_today)
            .fetch_one(pool),
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM \"plan_history\" \
                 WHERE \"purchased_at\" >= $1 AND \"purchased_at\" < $2",
            )
            .bind(start_of_today)
            .bind(end_of_today)
            .fetch_one(pool),
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM \"plan_history\" \
                 WHERE \"purchased_at\" >= $1 AND \"purchased_at\" < $2 AND \"expires_at\" >= $3",
            )
            .bind(start_of_today)
            .bind(end_of_today)
            .bind(now)
            .fetch_one(pool),
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM \"users\" u \
                 WHERE u.\"role\" = 'owner' AND u.\"status\" = 'active' \
                 AND u.\"created_at\" >= $1 AND u.\"created_at\" < $2 \
                 AND NOT EXISTS (\
                     SELECT 1 FROM \"plan_history\" h \
                     WHERE h.\"owner_username\" = u.\"username\" AND h.\"expires_at\" >= $3\
                 )",
            )
            .bind(start_of_today)
            .bind(end_of_today)
            .bind(now)
            .fetch_one(pool),
            sqlx::query_scalar::<_, BigDecimal>(
                "SELECT COALESCE(SUM(p.\"plan_price\"), 0) \
                 FROM \"plan_history\" h JOIN \"plans\" p ON p.\"id\" = h.\"plan_id\" \
                 WHERE h.\"purchased_at\" >= $1 AND h.\"purchased_at\" < $2",
            )
            .bind(start_of_today)
            .bind(end_of_today)
            .fetch_one(pool),
        )?;

    // Subscriptions on the zero-priced plan don't count as paid.
    let free_plan_id = sqlx::query_scalar::<_, Uuid>(
        "SELECT \"id\" FROM \"plans\" WHERE \"plan_price\" = 0 ORDER BY \"created_at\" LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    let (free_subscriptions, today_free_subscriptions) = match free_plan_id {
        Some(free_id) => tokio::try_join!(
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM \"plan_history\" \
                 WHERE \"plan_id\" = $1 AND \"expires_at\" >= $2",
            )
            .bind(free_id)
            .bind(now)
            .fetch_one(pool),
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM \"plan_history\" \
                 WHERE \"plan_id\" = $1 AND \"purchased_at\" >= $2 AND \"purchased_at\" < $3 \
                 AND \"expires_at\" >= $4",
            )
            .bind(free_id)
            .bind(start_of_today)
            .bind(end_of_today)
            .bind(now)
            .fetch_one(pool),
        )?,
        None => (0, 0),
    };

    Ok(Json(json!({
        "success": true,
        "data": {
            "overall": {
                "totalOwners": total_owners,
                "totalStores": total_stores,
                "subscribedOwners": active_subscriptions - free_subscriptions,
                "freePlanOwners": free_plan_owners,
                "totalRevenue": total_revenue,
            },
            "today": {
                "registrations": today_registrations,
                "stores": today_stores,
                "purchases": today_purchases,
                "subscribedOwners": today_active_purchases - today_free_subscriptions,
                "freePlanRegistrations": today_free_owners,
                "revenue": today_revenue,
            },
        },
    })))
}
