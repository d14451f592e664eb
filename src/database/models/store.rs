use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Tenant storefront. At most one per owner, joined by `owner_id`;
/// read-mostly after registration. The descriptive content blocks
/// (`contact`, `about`) are free-form documents owned by the storefront
/// editor, stored as JSONB.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: Uuid,
    pub display_name: String,
    pub owner_id: Option<Uuid>,
    pub description: String,
    pub email: String,
    pub logo: String,
    pub contact: Value,
    pub about: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Trimmed store shape attached to owner detail and plan-history rows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSummary {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
}

impl From<&Store> for StoreSummary {
    fn from(store: &Store) -> Self {
        Self {
            id: store.id,
            display_name: store.display_name.clone(),
            email: store.email.clone(),
        }
    }
}
