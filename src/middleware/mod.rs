pub mod gatekeeper;

pub use gatekeeper::{gatekeeper, AuthUser};
