pub mod predicate;
pub mod processor;
pub mod types;

pub use predicate::{Clause, CmpOp, Predicate, Scalar};
pub use processor::{process, process_at, split_key_value};
pub use types::*;
