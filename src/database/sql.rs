use sqlx::postgres::PgArguments;
use sqlx::FromRow;

use crate::query::{Clause, Predicate, Scalar};

use super::pool::DatabaseError;

/// A rendered WHERE clause with its positional bind values.
#[derive(Debug, Clone)]
pub struct SqlWhere {
    pub clause: String,
    pub params: Vec<Scalar>,
}

/// Render a predicate to a parameterized SQL condition. Field names are
/// validated as identifiers; values only ever travel as bind parameters.
pub fn render_where(predicate: &Predicate) -> Result<SqlWhere, DatabaseError> {
    let mut params = Vec::new();
    let mut parts = Vec::with_capacity(predicate.clauses().len());
    for clause in predicate.clauses() {
        parts.push(render_clause(clause, &mut params)?);
    }

    let clause = if parts.is_empty() { "1=1".to_string() } else { parts.join(" AND ") };
    Ok(SqlWhere { clause, params })
}

fn render_clause(clause: &Clause, params: &mut Vec<Scalar>) -> Result<String, DatabaseError> {
    match clause {
        Clause::Cmp { field, op, value } => {
            validate_identifier(field)?;
            params.push(value.clone());
            Ok(format!("\"{}\" {} ${}", field, op.to_sql(), params.len()))
        }
        Clause::Contains { field, needle } => {
            validate_identifier(field)?;
            params.push(Scalar::Text(format!("%{}%", escape_like(needle))));
            // ::text lets substring fallback work against non-text columns
            Ok(format!("\"{}\"::text ILIKE ${}", field, params.len()))
        }
        Clause::AnyOf(subs) => {
            if subs.is_empty() {
                return Err(DatabaseError::QueryError(
                    "Disjunction requires at least one clause".to_string(),
                ));
            }
            let mut parts = Vec::with_capacity(subs.len());
            for sub in subs {
                parts.push(render_clause(sub, params)?);
            }
            Ok(format!("({})", parts.join(" OR ")))
        }
    }
}

/// Validate SQL identifiers (table, column, sort names) to prevent
/// injection through anything that is not a bind parameter.
pub fn validate_identifier(name: &str) -> Result<(), DatabaseError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if !valid {
        return Err(DatabaseError::QueryError(format!("Invalid identifier: {}", name)));
    }
    Ok(())
}

/// Escape LIKE metacharacters so user input matches literally.
fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn bind_scalar<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Scalar,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Scalar::Text(s) => q.bind(s),
        Scalar::Int(i) => q.bind(*i),
        Scalar::Num(f) => q.bind(*f),
        Scalar::Bool(b) => q.bind(*b),
        Scalar::Timestamp(t) => q.bind(*t),
        Scalar::Uuid(u) => q.bind(*u),
    }
}

pub fn bind_scalar_as<'q, O>(
    q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>,
    v: &'q Scalar,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    match v {
        Scalar::Text(s) => q.bind(s),
        Scalar::Int(i) => q.bind(*i),
        Scalar::Num(f) => q.bind(*f),
        Scalar::Bool(b) => q.bind(*b),
        Scalar::Timestamp(t) => q.bind(*t),
        Scalar::Uuid(u) => q.bind(*u),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::CmpOp;

    #[test]
    fn empty_predicate_renders_tautology() {
        let rendered = render_where(&Predicate::new()).unwrap();
        assert_eq!(rendered.clause, "1=1");
        assert!(rendered.params.is_empty());
    }

    #[test]
    fn clauses_join_with_and() {
        let p = Predicate::new().eq("role", "owner").contains("username", "ali");
        let rendered = render_where(&p).unwrap();
        assert_eq!(rendered.clause, "\"role\" = $1 AND \"username\"::text ILIKE $2");
        assert_eq!(
            rendered.params,
            vec![Scalar::Text("owner".into()), Scalar::Text("%ali%".into())]
        );
    }

    #[test]
    fn any_of_renders_parenthesized_or() {
        let p = Predicate::new().any_of(vec![
            Clause::Contains { field: "username".into(), needle: "x".into() },
            Clause::Contains { field: "status".into(), needle: "x".into() },
        ]);
        let rendered = render_where(&p).unwrap();
        assert_eq!(
            rendered.clause,
            "(\"username\"::text ILIKE $1 OR \"status\"::text ILIKE $2)"
        );
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        let p = Predicate::new().contains("username", "50%_off\\now");
        let rendered = render_where(&p).unwrap();
        assert_eq!(rendered.params, vec![Scalar::Text("%50\\%\\_off\\\\now%".into())]);
    }

    #[test]
    fn comparison_operators_render() {
        let p = Predicate::new().cmp("plan_price", CmpOp::Gte, 10.0);
        let rendered = render_where(&p).unwrap();
        assert_eq!(rendered.clause, "\"plan_price\" >= $1");
    }

    #[test]
    fn hostile_identifiers_are_rejected() {
        for bad in ["", "1abc", "user name", "users\"; DROP TABLE users;--"] {
            let p = Predicate::new().eq(bad, "x");
            assert!(render_where(&p).is_err(), "expected rejection for {:?}", bad);
        }
    }
}
