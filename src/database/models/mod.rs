pub mod plan;
pub mod plan_history;
pub mod store;
pub mod user;

pub use plan::{Plan, PlanStatus};
pub use plan_history::{PlanHistory, PlanState};
pub use store::{Store, StoreSummary};
pub use user::{AccountStatus, User, UserRole};
