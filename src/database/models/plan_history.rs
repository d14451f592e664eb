use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Derived subscription state. Never stored: a record is expired exactly
/// when the clock has passed its expiry, so persisting a status column
/// could only drift from the truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanState {
    Active,
    Expired,
}

/// One plan purchase. The owner's username is captured as a plain string
/// rather than a foreign key so history survives identity renames and
/// deletions; enrichment re-resolves it best-effort at read time.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PlanHistory {
    pub id: Uuid,
    pub owner_username: String,
    pub plan_id: Uuid,
    pub purchased_at: DateTime<Utc>,
    /// Set at purchase from the plan's validity window; immutable after.
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlanHistory {
    pub fn state_at(&self, now: DateTime<Utc>) -> PlanState {
        if now > self.expires_at {
            PlanState::Expired
        } else {
            PlanState::Active
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(expires_at: DateTime<Utc>) -> PlanHistory {
        PlanHistory {
            id: Uuid::new_v4(),
            owner_username: "alice".to_string(),
            plan_id: Uuid::new_v4(),
            purchased_at: expires_at - chrono::Duration::days(30),
            expires_at,
            created_at: expires_at - chrono::Duration::days(30),
            updated_at: expires_at - chrono::Duration::days(30),
        }
    }

    #[test]
    fn state_is_derived_from_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let past = record(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(past.state_at(now), PlanState::Expired);

        let future = record(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(future.state_at(now), PlanState::Active);
    }

    #[test]
    fn state_flips_only_after_the_boundary() {
        let expiry = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let rec = record(expiry);
        assert_eq!(rec.state_at(expiry), PlanState::Active);
        assert_eq!(rec.state_at(expiry + chrono::Duration::milliseconds(1)), PlanState::Expired);
    }
}
