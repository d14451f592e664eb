use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::DateRange;

/// Typed bind value. The SQL layer matches on this instead of
/// introspecting untyped JSON at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Int(i64),
    Num(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Num(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<DateTime<Utc>> for Scalar {
    fn from(v: DateTime<Utc>) -> Self {
        Scalar::Timestamp(v)
    }
}

impl From<Uuid> for Scalar {
    fn from(v: Uuid) -> Self {
        Scalar::Uuid(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    pub fn to_sql(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
        }
    }
}

/// One filter condition. A predicate is the AND of its clauses.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Field comparison against a typed value.
    Cmp { field: String, op: CmpOp, value: Scalar },
    /// Case-insensitive substring match.
    Contains { field: String, needle: String },
    /// Disjunction of sub-clauses (cross-field free-text search).
    AnyOf(Vec<Clause>),
}

/// Database-agnostic filter condition, built per request and rendered to a
/// parameterized WHERE clause by the storage layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.push(Clause::Cmp { field: field.into(), op: CmpOp::Eq, value: value.into() });
        self
    }

    pub fn cmp(mut self, field: impl Into<String>, op: CmpOp, value: impl Into<Scalar>) -> Self {
        self.push(Clause::Cmp { field: field.into(), op, value: value.into() });
        self
    }

    pub fn contains(mut self, field: impl Into<String>, needle: impl Into<String>) -> Self {
        self.push(Clause::Contains { field: field.into(), needle: needle.into() });
        self
    }

    pub fn any_of(mut self, clauses: Vec<Clause>) -> Self {
        if !clauses.is_empty() {
            self.push(Clause::AnyOf(clauses));
        }
        self
    }

    /// Constrain `field` to an inclusive date range; open bounds are skipped.
    pub fn date_range(mut self, field: &str, range: DateRange) -> Self {
        if let Some(start) = range.start {
            self.push(Clause::Cmp {
                field: field.to_string(),
                op: CmpOp::Gte,
                value: Scalar::Timestamp(start),
            });
        }
        if let Some(end) = range.end {
            self.push(Clause::Cmp {
                field: field.to_string(),
                op: CmpOp::Lte,
                value: Scalar::Timestamp(end),
            });
        }
        self
    }
}
