//! Statement introspection: the mutated table, the `WHERE` clause, and
//! named-parameter binding.
//!
//! Extraction is deliberately shallow. It reads the leading verb and the
//! identifier that follows it; it does not parse SQL. Statements too
//! exotic for that shape fail extraction, and callers degrade rather
//! than guess.

use once_cell::sync::Lazy;
use regex::Regex;
use steward_common::models::{NamedParameter, ParamValue};
use steward_error::{ErrorCode, Result, StewardError};
use steward_targets::Dialect;
use steward_workflow::classify::skip_trivia;

static UPDATE_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^UPDATE\s+("?[A-Za-z_][A-Za-z0-9_.]*"?)"#).expect("regex must compile")
});
static DELETE_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^DELETE\s+FROM\s+("?[A-Za-z_][A-Za-z0-9_.]*"?)"#)
        .expect("regex must compile")
});
static INSERT_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^INSERT\s+INTO\s+("?[A-Za-z_][A-Za-z0-9_.]*"?)"#)
        .expect("regex must compile")
});
static WHERE_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\bWHERE\b(.*)$").expect("regex must compile")
});

/// Table mutated by an `UPDATE`, `DELETE` or `INSERT` statement.
///
/// Fails with `ExtractionFailed` when the statement does not open with
/// one of those shapes. Multi-table statements are out of scope here on
/// purpose; rollback snapshots cover exactly one table.
pub fn mutated_table(statement: &str) -> Result<String> {
    let body = skip_trivia(statement);
    for re in [&*UPDATE_TABLE, &*DELETE_TABLE, &*INSERT_TABLE] {
        if let Some(caps) = re.captures(body) {
            return Ok(caps[1].trim_matches('"').to_string());
        }
    }
    Err(StewardError::new(
        ErrorCode::ExtractionFailed,
        "Could not determine the mutated table from the statement",
    )
    .with_hint("Only single-table UPDATE, DELETE and INSERT statements are supported"))
}

/// The `WHERE` clause of a statement, without the keyword, trimmed of a
/// trailing semicolon. `None` when the statement has no `WHERE`.
pub fn where_clause(statement: &str) -> Option<String> {
    WHERE_CLAUSE.captures(skip_trivia(statement)).map(|caps| {
        caps[1]
            .trim()
            .trim_end_matches(';')
            .trim_end()
            .to_string()
    })
}

/// A statement rewritten to positional placeholders, with its bind
/// values in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub binds: Vec<ParamValue>,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Rewrite `:name` placeholders to the dialect's positional form.
///
/// Placeholders inside single-quoted literals are left alone, as is the
/// `::` cast operator. Every placeholder must have a matching supplied
/// parameter and every supplied parameter must be referenced at least
/// once; a mismatch in either direction fails with `InvalidParameter`
/// instead of silently binding the wrong thing.
pub fn bind_named(
    statement: &str,
    params: &[NamedParameter],
    dialect: Dialect,
) -> Result<BoundStatement> {
    bind_inner(statement, params, dialect, true)
}

/// Like [`bind_named`] but tolerates supplied parameters the statement
/// never references. Used for derived statements, such as the dry-run
/// count rewrite, which keep only part of the original statement.
pub(crate) fn bind_named_partial(
    statement: &str,
    params: &[NamedParameter],
    dialect: Dialect,
) -> Result<BoundStatement> {
    bind_inner(statement, params, dialect, false)
}

fn bind_inner(
    statement: &str,
    params: &[NamedParameter],
    dialect: Dialect,
    require_all_used: bool,
) -> Result<BoundStatement> {
    let mut sql = String::with_capacity(statement.len());
    let mut binds: Vec<ParamValue> = Vec::new();
    let mut used = vec![false; params.len()];

    let mut chars = statement.char_indices().peekable();
    let mut in_string = false;
    while let Some((idx, c)) = chars.next() {
        if in_string {
            sql.push(c);
            if c == '\'' {
                // A doubled quote is an escaped quote, not a terminator.
                if matches!(chars.peek(), Some((_, '\''))) {
                    let (_, q) = chars.next().expect("peeked");
                    sql.push(q);
                } else {
                    in_string = false;
                }
            }
            continue;
        }
        match c {
            '\'' => {
                in_string = true;
                sql.push(c);
            }
            ':' => {
                if matches!(chars.peek(), Some((_, ':'))) {
                    // Cast operator.
                    let (_, colon) = chars.next().expect("peeked");
                    sql.push(c);
                    sql.push(colon);
                    continue;
                }
                let start = idx + 1;
                let mut end = start;
                while let Some((i, nc)) = chars.peek().copied() {
                    if is_ident_char(nc) {
                        end = i + nc.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                if end == start {
                    sql.push(c);
                    continue;
                }
                let name = &statement[start..end];
                let pos = params.iter().position(|p| p.name == name).ok_or_else(|| {
                    StewardError::new(
                        ErrorCode::InvalidParameter,
                        format!("Statement references parameter ':{}' with no supplied value", name),
                    )
                })?;
                used[pos] = true;
                binds.push(params[pos].value.clone());
                sql.push_str(&dialect.placeholder(binds.len()));
            }
            _ => sql.push(c),
        }
    }

    if !require_all_used {
        return Ok(BoundStatement { sql, binds });
    }
    if let Some(pos) = used.iter().position(|u| !u) {
        return Err(StewardError::new(
            ErrorCode::InvalidParameter,
            format!(
                "Supplied parameter '{}' is never referenced by the statement",
                params[pos].name
            ),
        )
        .with_hint("Check the placeholder spelling; placeholders are written ':name'"));
    }

    Ok(BoundStatement { sql, binds })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, value: ParamValue) -> NamedParameter {
        NamedParameter {
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn test_mutated_table_shapes() {
        assert_eq!(
            mutated_table("UPDATE employees SET dept = 'X'").unwrap(),
            "employees"
        );
        assert_eq!(
            mutated_table("delete from audit.events where id = 1").unwrap(),
            "audit.events"
        );
        assert_eq!(
            mutated_table("INSERT INTO t (a) VALUES (1)").unwrap(),
            "t"
        );
        assert_eq!(
            mutated_table("-- ticket 99\nUPDATE t SET a = 1").unwrap(),
            "t"
        );
    }

    #[test]
    fn test_mutated_table_rejects_other_shapes() {
        let err = mutated_table("SELECT * FROM t").unwrap_err();
        assert_eq!(err.code, ErrorCode::ExtractionFailed);
        assert!(mutated_table("TRUNCATE TABLE t").is_err());
    }

    #[test]
    fn test_where_clause() {
        assert_eq!(
            where_clause("DELETE FROM t WHERE id = 1;").as_deref(),
            Some("id = 1")
        );
        assert_eq!(
            where_clause("UPDATE t SET a = 1 WHERE a > 2 AND b < 3").as_deref(),
            Some("a > 2 AND b < 3")
        );
        assert_eq!(where_clause("DELETE FROM t"), None);
    }

    #[test]
    fn test_bind_named_postgres_numbering() {
        let bound = bind_named(
            "UPDATE t SET dept = :dept WHERE id = :id OR manager = :id",
            &[
                param("dept", ParamValue::Text("X".to_string())),
                param("id", ParamValue::Int(1)),
            ],
            Dialect::Postgres,
        )
        .unwrap();
        assert_eq!(bound.sql, "UPDATE t SET dept = $1 WHERE id = $2 OR manager = $3");
        assert_eq!(
            bound.binds,
            vec![
                ParamValue::Text("X".to_string()),
                ParamValue::Int(1),
                ParamValue::Int(1)
            ]
        );
    }

    #[test]
    fn test_bind_named_question_marks() {
        let bound = bind_named(
            "DELETE FROM t WHERE id = :id",
            &[param("id", ParamValue::Int(7))],
            Dialect::Sqlite,
        )
        .unwrap();
        assert_eq!(bound.sql, "DELETE FROM t WHERE id = ?");
        assert_eq!(bound.binds, vec![ParamValue::Int(7)]);
    }

    #[test]
    fn test_bind_named_leaves_strings_and_casts_alone() {
        let bound = bind_named(
            "SELECT ':not_a_param', x::text FROM t WHERE id = :id",
            &[param("id", ParamValue::Int(1))],
            Dialect::Postgres,
        )
        .unwrap();
        assert_eq!(
            bound.sql,
            "SELECT ':not_a_param', x::text FROM t WHERE id = $1"
        );
    }

    #[test]
    fn test_bind_named_mismatches_fail() {
        let err = bind_named("SELECT :missing", &[], Dialect::Sqlite).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);

        let err = bind_named(
            "SELECT 1",
            &[param("unused", ParamValue::Null)],
            Dialect::Sqlite,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);
    }

    #[test]
    fn test_bind_named_escaped_quote() {
        let bound = bind_named(
            "SELECT 'it''s :fine', :v",
            &[param("v", ParamValue::Bool(true))],
            Dialect::Sqlite,
        )
        .unwrap();
        assert_eq!(bound.sql, "SELECT 'it''s :fine', ?");
    }
}
