//! Statement classification by leading verb.
//!
//! Classification decides whether a submission can skip the approval
//! chain, so it errs on the side of caution: only a statement whose
//! first meaningful token is `SELECT` counts as read-only. Leading
//! whitespace and SQL comments are skipped before the verb is read.

use once_cell::sync::Lazy;
use regex::Regex;
use steward_common::models::StatementKind;

static LEADING_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z]+").expect("leading-word regex must compile")
});

/// Skip whitespace, `--` line comments and `/* */` block comments.
/// An unterminated block comment leaves nothing to classify.
pub fn skip_trivia(mut rest: &str) -> &str {
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("--") {
            rest = match after.find('\n') {
                Some(idx) => &after[idx + 1..],
                None => "",
            };
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = match after.find("*/") {
                Some(idx) => &after[idx + 2..],
                None => "",
            };
        } else {
            return rest;
        }
    }
}

/// Classify a statement by its first meaningful keyword, case-insensitively.
/// Anything unrecognized, including CTEs and DDL, is treated as mutating.
pub fn classify(statement: &str) -> StatementKind {
    let body = skip_trivia(statement);
    let keyword = match LEADING_WORD.find(body) {
        Some(m) => m.as_str().to_ascii_uppercase(),
        None => return StatementKind::Other,
    };
    match keyword.as_str() {
        "SELECT" => StatementKind::Select,
        "INSERT" => StatementKind::Insert,
        "UPDATE" => StatementKind::Update,
        "DELETE" => StatementKind::Delete,
        _ => StatementKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_basic_verbs() {
        assert_eq!(classify("SELECT * FROM employees"), StatementKind::Select);
        assert_eq!(
            classify("INSERT INTO t (a) VALUES (1)"),
            StatementKind::Insert
        );
        assert_eq!(classify("UPDATE t SET a = 1"), StatementKind::Update);
        assert_eq!(classify("DELETE FROM t"), StatementKind::Delete);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("select 1"), StatementKind::Select);
        assert_eq!(classify("Update t set a = 1"), StatementKind::Update);
    }

    #[test]
    fn test_skips_leading_whitespace_and_comments() {
        assert_eq!(
            classify("  -- cleanup ticket 4711\n  DELETE FROM audit_log"),
            StatementKind::Delete
        );
        assert_eq!(
            classify("/* reviewed */ SELECT id FROM t"),
            StatementKind::Select
        );
        assert_eq!(
            classify("/* outer -- inner */\n-- trailing\nUPDATE t SET a = 1"),
            StatementKind::Update
        );
    }

    #[test]
    fn test_unrecognized_is_mutating() {
        assert_eq!(classify("TRUNCATE TABLE t"), StatementKind::Other);
        assert_eq!(classify("WITH x AS (SELECT 1) SELECT * FROM x"), StatementKind::Other);
        assert!(!classify("CALL do_things()").is_read_only());
    }

    #[test]
    fn test_degenerate_input() {
        assert_eq!(classify(""), StatementKind::Other);
        assert_eq!(classify("   \n\t"), StatementKind::Other);
        assert_eq!(classify("/* never closed SELECT"), StatementKind::Other);
        assert_eq!(classify("-- only a comment"), StatementKind::Other);
    }
}
