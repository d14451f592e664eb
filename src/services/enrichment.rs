//! Cross-entity lookups layered on top of the paginated executor.
//!
//! Enrichment is best-effort by design: a missing identity or store yields
//! a null attachment, never a failed page.

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::{Plan, Store, User};
use crate::database::pool::DatabaseError;

pub async fn find_user_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<User>, DatabaseError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM \"users\" WHERE \"username\" = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_store_by_owner(
    pool: &PgPool,
    owner_id: Uuid,
) -> Result<Option<Store>, DatabaseError> {
    let store = sqlx::query_as::<_, Store>("SELECT * FROM \"stores\" WHERE \"owner_id\" = $1")
        .bind(owner_id)
        .fetch_optional(pool)
        .await?;
    Ok(store)
}

/// Batch plan lookup keyed by id.
pub async fn plans_by_ids(
    pool: &PgPool,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, Plan>, DatabaseError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let plans = sqlx::query_as::<_, Plan>("SELECT * FROM \"plans\" WHERE \"id\" = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await?;
    Ok(plans.into_iter().map(|p| (p.id, p)).collect())
}

/// Batch identity lookup keyed by current username. Usernames on history
/// rows are denormalized captures; renamed or deleted identities simply
/// produce no entry here.
pub async fn users_by_usernames(
    pool: &PgPool,
    usernames: &[String],
) -> Result<HashMap<String, User>, DatabaseError> {
    if usernames.is_empty() {
        return Ok(HashMap::new());
    }
    let users = sqlx::query_as::<_, User>("SELECT * FROM \"users\" WHERE \"username\" = ANY($1)")
        .bind(usernames)
        .fetch_all(pool)
        .await?;
    Ok(users.into_iter().map(|u| (u.username.clone(), u)).collect())
}

/// Batch store lookup keyed by owner id.
pub async fn stores_by_owner_ids(
    pool: &PgPool,
    owner_ids: &[Uuid],
) -> Result<HashMap<Uuid, Store>, DatabaseError> {
    if owner_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let stores = sqlx::query_as::<_, Store>("SELECT * FROM \"stores\" WHERE \"owner_id\" = ANY($1)")
        .bind(owner_ids)
        .fetch_all(pool)
        .await?;
    Ok(stores
        .into_iter()
        .filter_map(|s| s.owner_id.map(|owner| (owner, s)))
        .collect())
}
