pub mod admin;
pub mod panel;
pub mod public;
