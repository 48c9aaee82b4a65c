//! Dry-run cost estimation.
//!
//! A dry run never mutates the target. Everything runs inside a
//! transaction that is always rolled back, and the statements issued are
//! themselves read-only: a `SELECT COUNT(*)` rewrite of the mutation's
//! `WHERE` clause and the dialect's `EXPLAIN` form. When the mutated
//! table cannot be extracted, the estimate degrades to explicitly
//! unknown with a warning instead of failing the dry run.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::Row;
use steward_common::models::{DryRunResult, ParamValue, QueryRecord, StatementKind};
use steward_error::{ErrorCode, Result, StewardError};
use steward_targets::{Dialect, PoolManager, TargetRegistry};
use tracing::{info, warn};

use crate::extract;

// Postgres plan lines carry "cost=0.00..35.50"; the total is the upper bound.
static PLAN_COST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"cost=\d+(?:\.\d+)?\.\.(\d+(?:\.\d+)?)").expect("regex must compile")
});

pub struct DryRunEstimator {
    registry: Arc<TargetRegistry>,
    pools: Arc<PoolManager>,
}

impl DryRunEstimator {
    pub fn new(registry: Arc<TargetRegistry>, pools: Arc<PoolManager>) -> Self {
        Self { registry, pools }
    }

    /// Estimate the impact of a record's statement against its target.
    pub async fn estimate(&self, record: &QueryRecord) -> Result<DryRunResult> {
        let target = self.registry.get(&record.target_id)?;
        let pool = self.pools.get_or_create(&target.id).await?;

        let bound = extract::bind_named(&record.statement, &record.parameters, target.dialect)?;

        let mut tx = pool.begin().await.map_err(|e| {
            StewardError::connectivity(format!(
                "Could not open a dry-run transaction on target '{}': {}",
                target.id, e
            ))
        })?;

        let mut result = DryRunResult::default();

        if !record.kind.is_read_only() {
            self.estimate_rows(record, target.dialect, &mut tx, &mut result)
                .await;
        }

        // Postgres rejects bound parameters on EXPLAIN (a utility
        // statement), so parameterized plans there land in the warning
        // path rather than failing the dry run.
        let explain_sql = target.dialect.explain_sql(&bound.sql);
        let mut explain = sqlx::query(&explain_sql);
        for bind in &bound.binds {
            explain = bind_any(explain, bind);
        }
        match explain.fetch_all(&mut *tx).await {
            Ok(rows) => {
                result.plan_text = plan_text(target.dialect, &rows);
                result.estimated_cost = plan_cost(&result.plan_text);
            }
            Err(e) => {
                warn!(query_id = %record.id, error = %e, "Plan fetch failed");
                result.warnings.push(format!("Plan unavailable: {}", e));
            }
        }

        // A dry run leaves no trace.
        if let Err(e) = tx.rollback().await {
            return Err(StewardError::new(
                ErrorCode::ExecutionFailed,
                format!(
                    "Dry-run transaction rollback failed on '{}': {}",
                    target.id, e
                ),
            ));
        }

        info!(
            query_id = %record.id,
            target = %target.id,
            estimated_rows = ?result.estimated_rows,
            warnings = result.warnings.len(),
            "Dry run complete"
        );
        Ok(result)
    }

    /// Count the rows the mutation would touch. The rewrite is built
    /// from the raw statement so named placeholders in the `WHERE`
    /// clause re-bind against the original parameters.
    async fn estimate_rows(
        &self,
        record: &QueryRecord,
        dialect: Dialect,
        tx: &mut sqlx::Transaction<'_, sqlx::Any>,
        result: &mut DryRunResult,
    ) {
        // Counting the target table would report its full size for a
        // single-row VALUES insert, so inserts get a nominal estimate.
        if record.kind == StatementKind::Insert {
            result.estimated_rows = Some(1);
            result
                .warnings
                .push("Row estimate for INSERT statements is nominal".to_string());
            return;
        }

        let table = match extract::mutated_table(&record.statement) {
            Ok(table) => table,
            Err(e) => {
                // Degrade to an explicitly unknown estimate.
                result
                    .warnings
                    .push(format!("Could not estimate affected rows: {}", e.message));
                return;
            }
        };
        let count_sql = match extract::where_clause(&record.statement) {
            Some(clause) => format!("SELECT COUNT(*) FROM {} WHERE {}", table, clause),
            None => format!("SELECT COUNT(*) FROM {}", table),
        };
        let count_bound =
            match extract::bind_named_partial(&count_sql, &record.parameters, dialect) {
                Ok(bound) => bound,
                Err(e) => {
                    result
                        .warnings
                        .push(format!("Could not estimate affected rows: {}", e.message));
                    return;
                }
            };

        let mut query = sqlx::query(&count_bound.sql);
        for bind in &count_bound.binds {
            query = bind_any(query, bind);
        }
        let count = query
            .fetch_one(&mut **tx)
            .await
            .and_then(|row| row.try_get::<i64, _>(0));
        match count {
            Ok(n) => result.estimated_rows = Some(n.max(0) as u64),
            Err(e) => {
                warn!(query_id = %record.id, error = %e, "Row-count estimate failed");
                result
                    .warnings
                    .push(format!("Row-count estimate failed: {}", e));
            }
        }
    }
}

fn plan_text(dialect: Dialect, rows: &[sqlx::any::AnyRow]) -> String {
    let mut lines = Vec::with_capacity(rows.len());
    for row in rows {
        let line = match dialect {
            // Single text column named "QUERY PLAN".
            Dialect::Postgres => row.try_get::<String, _>(0).unwrap_or_default(),
            // EXPLAIN QUERY PLAN yields (id, parent, notused, detail).
            Dialect::Sqlite => row
                .try_get::<String, _>(3)
                .or_else(|_| row.try_get::<String, _>(0))
                .unwrap_or_default(),
            // Tabular output; join whatever decodes as text.
            Dialect::MySql => {
                let mut parts = Vec::new();
                for i in 0..row.columns().len() {
                    if let Ok(v) = row.try_get::<String, _>(i) {
                        parts.push(v);
                    }
                }
                parts.join(" | ")
            }
        };
        lines.push(line);
    }
    lines.join("\n")
}

fn plan_cost(plan: &str) -> Option<f64> {
    PLAN_COST
        .captures(plan)
        .and_then(|caps| caps[1].parse::<f64>().ok())
}

type AnyQuery<'q> = sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>;

pub(crate) fn bind_any<'q>(query: AnyQuery<'q>, value: &'q ParamValue) -> AnyQuery<'q> {
    match value {
        ParamValue::Text(s) => query.bind(s.as_str()),
        ParamValue::Int(i) => query.bind(*i),
        ParamValue::Float(f) => query.bind(*f),
        ParamValue::Bool(b) => query.bind(*b),
        ParamValue::Null => query.bind(Option::<String>::None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_cost_parse() {
        let plan = "Seq Scan on employees  (cost=0.00..35.50 rows=2550 width=4)";
        assert_eq!(plan_cost(plan), Some(35.5));
        assert_eq!(plan_cost("SCAN TABLE employees"), None);
    }
}
