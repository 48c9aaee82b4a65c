use serde::{Deserialize, Serialize};

/// Supported target dialects.
///
/// Every dialect-specific SQL fragment the core needs lives here, so the
/// rest of the engine stays dialect-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    /// Trivial liveness probe.
    pub fn probe_sql(&self) -> &'static str {
        "SELECT 1"
    }

    /// The dialect's native execution-plan facility.
    pub fn explain_sql(&self, statement: &str) -> String {
        match self {
            Dialect::Postgres => format!("EXPLAIN {}", statement),
            Dialect::MySql => format!("EXPLAIN {}", statement),
            Dialect::Sqlite => format!("EXPLAIN QUERY PLAN {}", statement),
        }
    }

    /// Schemas owned by the engine itself, excluded from discovery.
    pub fn system_schemas(&self) -> &'static [&'static str] {
        match self {
            Dialect::Postgres => &["pg_catalog", "information_schema", "pg_toast"],
            Dialect::MySql => &["mysql", "information_schema", "performance_schema", "sys"],
            Dialect::Sqlite => &[],
        }
    }

    /// Catalog query returning `(table_schema, table_name)` rows for every
    /// user table and view. Values are embedded as escaped literals
    /// because positional placeholder syntax differs per driver.
    pub fn table_listing_sql(&self, schema_filter: Option<&str>) -> String {
        match self {
            Dialect::Postgres | Dialect::MySql => {
                let excluded = self
                    .system_schemas()
                    .iter()
                    .map(|s| format!("'{}'", s))
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut sql = format!(
                    "SELECT table_schema, table_name FROM information_schema.tables \
                     WHERE table_type IN ('BASE TABLE', 'VIEW') \
                     AND table_schema NOT IN ({})",
                    excluded
                );
                if let Some(filter) = schema_filter {
                    sql.push_str(&format!(" AND table_schema = '{}'", escape_literal(filter)));
                }
                sql.push_str(" ORDER BY table_schema, table_name");
                sql
            }
            Dialect::Sqlite => "SELECT 'main' AS table_schema, name AS table_name \
                 FROM sqlite_master WHERE type IN ('table', 'view') \
                 AND name NOT LIKE 'sqlite_%' ORDER BY name"
                .to_string(),
        }
    }

    /// Column metadata query for one table.
    pub fn column_listing_sql(&self, schema: &str, table: &str) -> String {
        match self {
            Dialect::Postgres => format!(
                "SELECT column_name, data_type, \
                 CAST(character_maximum_length AS INTEGER) AS max_length, is_nullable \
                 FROM information_schema.columns \
                 WHERE table_schema = '{}' AND table_name = '{}' \
                 ORDER BY ordinal_position",
                escape_literal(schema),
                escape_literal(table)
            ),
            Dialect::MySql => format!(
                "SELECT column_name, data_type, \
                 CAST(character_maximum_length AS SIGNED) AS max_length, is_nullable \
                 FROM information_schema.columns \
                 WHERE table_schema = '{}' AND table_name = '{}' \
                 ORDER BY ordinal_position",
                escape_literal(schema),
                escape_literal(table)
            ),
            Dialect::Sqlite => format!("PRAGMA table_info('{}')", escape_literal(table)),
        }
    }

    /// Full-copy snapshot of a table. Works unchanged on all three dialects.
    pub fn snapshot_sql(&self, table: &str, backup_table: &str) -> String {
        format!("CREATE TABLE {} AS SELECT * FROM {}", backup_table, table)
    }

    /// Empty the live table before restoring from a snapshot.
    pub fn clear_table_sql(&self, table: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::MySql => format!("TRUNCATE TABLE {}", table),
            Dialect::Sqlite => format!("DELETE FROM {}", table),
        }
    }

    /// Re-insert every snapshot row into the live table.
    pub fn restore_sql(&self, table: &str, backup_table: &str) -> String {
        format!("INSERT INTO {} SELECT * FROM {}", table, backup_table)
    }

    /// Positional placeholder for the 1-based parameter index.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", index),
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::MySql => write!(f, "mysql"),
            Dialect::Sqlite => write!(f, "sqlite"),
        }
    }
}

fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explain_per_dialect() {
        assert_eq!(
            Dialect::Sqlite.explain_sql("SELECT 1"),
            "EXPLAIN QUERY PLAN SELECT 1"
        );
        assert_eq!(Dialect::Postgres.explain_sql("SELECT 1"), "EXPLAIN SELECT 1");
    }

    #[test]
    fn test_table_listing_excludes_system_schemas() {
        let sql = Dialect::Postgres.table_listing_sql(None);
        assert!(sql.contains("'pg_catalog'"));
        assert!(sql.contains("information_schema.tables"));

        let filtered = Dialect::MySql.table_listing_sql(Some("sales"));
        assert!(filtered.contains("table_schema = 'sales'"));
    }

    #[test]
    fn test_literal_escaping() {
        let sql = Dialect::Postgres.column_listing_sql("public", "o'brien");
        assert!(sql.contains("'o''brien'"));
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Postgres.placeholder(2), "$2");
        assert_eq!(Dialect::Sqlite.placeholder(2), "?");
    }

    #[test]
    fn test_clear_table_dialect_split() {
        assert_eq!(
            Dialect::Postgres.clear_table_sql("orders"),
            "TRUNCATE TABLE orders"
        );
        assert_eq!(Dialect::Sqlite.clear_table_sql("orders"), "DELETE FROM orders");
    }
}
