pub mod dashboard;
pub mod owners;
pub mod plan_history;
pub mod plans;
