pub mod executor;
pub mod models;
pub mod pool;
pub mod sql;

pub use executor::{fetch_page, PageMeta, Paged};
pub use pool::{db_pool, DatabaseError};
