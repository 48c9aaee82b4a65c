//! Guarded execution of approved statements.
//!
//! Execution is the only place a submitted statement touches live data.
//! Preconditions are checked here, not assumed: the record must be
//! approved and the caller must hold the execute permission. Mutating
//! statements get a backup snapshot of the target table first so the
//! change can be rolled back; when the table cannot be extracted the
//! execution proceeds without one and the record is marked not
//! rollback-capable.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use sqlx::{AnyPool, Column, Row};
use steward_common::auth::{Action, AuthenticatedUser, Authorizer};
use steward_common::config::ExecutionSettings;
use steward_common::models::{
    ExecutionResult, QueryRecord, QueryStatus, RollbackMeta, StatementKind,
};
use steward_error::{ErrorCode, ErrorContext, Result, StewardError};
use steward_store::RecordStore;
use steward_targets::{Dialect, PoolManager, TargetRegistry};
use steward_workflow::state;
use tracing::{info, warn};
use uuid::Uuid;

use crate::estimator::bind_any;
use crate::extract;

pub struct ExecutionEngine {
    store: Arc<dyn RecordStore>,
    registry: Arc<TargetRegistry>,
    pools: Arc<PoolManager>,
    authorizer: Arc<dyn Authorizer>,
    settings: ExecutionSettings,
}

impl ExecutionEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        registry: Arc<TargetRegistry>,
        pools: Arc<PoolManager>,
        authorizer: Arc<dyn Authorizer>,
        settings: ExecutionSettings,
    ) -> Self {
        Self {
            store,
            registry,
            pools,
            authorizer,
            settings,
        }
    }

    /// Execute an approved record against its target.
    ///
    /// On success the record moves to `executed` with its result and,
    /// for snapshot-backed mutations, rollback metadata. On failure the
    /// record moves to `failed` with the error message persisted, and
    /// the error is returned to the caller. Target connectivity problems
    /// are never papered over here; execution fails loudly.
    pub async fn execute(&self, user: &AuthenticatedUser, query_id: Uuid) -> Result<QueryRecord> {
        self.authorizer.authorize(user, Action::Execute).await?;

        let mut record = self.store.get_query(query_id).await?;
        if record.status != QueryStatus::Approved {
            return Err(StewardError::invalid_state(format!(
                "Query '{}' is '{}', only approved queries execute",
                record.id, record.status
            ))
            .with_context(ErrorContext::InvalidTransition {
                record_id: record.id.to_string(),
                current: record.status.to_string(),
                expected: QueryStatus::Approved.to_string(),
            }));
        }

        let target = self.registry.get(&record.target_id)?;
        let pool = self.pools.get_or_create(&target.id).await?;
        let bound = extract::bind_named(&record.statement, &record.parameters, target.dialect)?;

        let rollback_meta = if record.kind.is_read_only() {
            None
        } else {
            self.snapshot(&record, target.dialect, &pool).await?
        };

        let started = Instant::now();
        let outcome = if record.kind == StatementKind::Select {
            self.run_select(&pool, &bound).await
        } else {
            self.run_mutation(&pool, &bound).await
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok((rows_affected, preview)) => {
                record.execution_result = Some(ExecutionResult {
                    success: true,
                    rows_affected,
                    elapsed_ms,
                    preview,
                    error_message: None,
                });
                record.rollback = rollback_meta;
                record.executed_at = Some(Utc::now());
                state::transition(&mut record, QueryStatus::Executed)?;
                self.store.update_query(record.clone()).await?;
                info!(
                    query_id = %record.id,
                    target = %target.id,
                    rows_affected = ?rows_affected,
                    elapsed_ms,
                    rollback_capable = record.rollback.is_some(),
                    "Query executed"
                );
                Ok(record)
            }
            Err(e) => {
                // The statement failed, so the table is untouched and the
                // snapshot is dead weight.
                if let Some(meta) = &rollback_meta {
                    self.drop_backup(&pool, &meta.backup_table).await;
                }
                let message = e.to_string();
                record.execution_result = Some(ExecutionResult {
                    success: false,
                    rows_affected: None,
                    elapsed_ms,
                    preview: None,
                    error_message: Some(message.clone()),
                });
                record.error_message = Some(message.clone());
                state::transition(&mut record, QueryStatus::Failed)?;
                self.store.update_query(record.clone()).await?;
                Err(StewardError::new(
                    ErrorCode::ExecutionFailed,
                    format!("Execution of query '{}' failed: {}", record.id, message),
                )
                .with_context(ErrorContext::Execution {
                    record_id: record.id.to_string(),
                    table: None,
                    backup_table: None,
                }))
            }
        }
    }

    /// Take a pre-execution snapshot of the mutated table.
    ///
    /// Returns `None` when the table cannot be extracted; the statement
    /// still runs, it just cannot be rolled back afterwards. A snapshot
    /// that was promised but fails to materialize aborts the execution,
    /// since proceeding would break the rollback guarantee.
    async fn snapshot(
        &self,
        record: &QueryRecord,
        dialect: Dialect,
        pool: &AnyPool,
    ) -> Result<Option<RollbackMeta>> {
        let table = match extract::mutated_table(&record.statement) {
            Ok(table) => table,
            Err(e) => {
                warn!(
                    query_id = %record.id,
                    error = %e.message,
                    "No table extracted, executing without rollback capability"
                );
                return Ok(None);
            }
        };

        // The record id, not a timestamp, keys the backup to the query
        // that caused it. Dots in qualified names are flattened so the
        // snapshot lands in the default schema.
        let backup_table = format!(
            "{}_BACKUP_{}",
            table.replace('.', "_"),
            record.id.simple()
        );
        sqlx::query(&dialect.snapshot_sql(&table, &backup_table))
            .execute(pool)
            .await
            .map_err(|e| {
                StewardError::new(
                    ErrorCode::ExecutionFailed,
                    format!(
                        "Backup snapshot of '{}' failed, execution aborted: {}",
                        table, e
                    ),
                )
                .with_context(ErrorContext::Execution {
                    record_id: record.id.to_string(),
                    table: Some(table.clone()),
                    backup_table: Some(backup_table.clone()),
                })
            })?;

        info!(query_id = %record.id, table = %table, backup_table = %backup_table, "Backup snapshot taken");
        Ok(Some(RollbackMeta {
            backup_table,
            taken_at: Utc::now(),
        }))
    }

    async fn run_select(
        &self,
        pool: &AnyPool,
        bound: &extract::BoundStatement,
    ) -> std::result::Result<(Option<u64>, Option<Vec<serde_json::Value>>), sqlx::Error> {
        let mut query = sqlx::query(&bound.sql);
        for bind in &bound.binds {
            query = bind_any(query, bind);
        }
        let rows = query.fetch_all(pool).await?;
        let total = rows.len() as u64;
        let preview = rows
            .iter()
            .take(self.settings.preview_rows)
            .map(row_to_json)
            .collect();
        Ok((Some(total), Some(preview)))
    }

    async fn run_mutation(
        &self,
        pool: &AnyPool,
        bound: &extract::BoundStatement,
    ) -> std::result::Result<(Option<u64>, Option<Vec<serde_json::Value>>), sqlx::Error> {
        let mut query = sqlx::query(&bound.sql);
        for bind in &bound.binds {
            query = bind_any(query, bind);
        }
        let done = query.execute(pool).await?;
        Ok((Some(done.rows_affected()), None))
    }

    async fn drop_backup(&self, pool: &AnyPool, backup_table: &str) {
        if let Err(e) = sqlx::query(&format!("DROP TABLE {}", backup_table))
            .execute(pool)
            .await
        {
            warn!(backup_table = %backup_table, error = %e, "Failed to drop unused backup table");
        }
    }
}

/// Decode a row into a JSON object, column by column. Values that fit
/// none of the common scalar shapes come through as null.
fn row_to_json(row: &sqlx::any::AnyRow) -> serde_json::Value {
    let mut object = serde_json::Map::with_capacity(row.columns().len());
    for (i, column) in row.columns().iter().enumerate() {
        let value = if let Ok(v) = row.try_get::<i64, _>(i) {
            serde_json::Value::from(v)
        } else if let Ok(v) = row.try_get::<f64, _>(i) {
            serde_json::Value::from(v)
        } else if let Ok(v) = row.try_get::<bool, _>(i) {
            serde_json::Value::from(v)
        } else if let Ok(v) = row.try_get::<String, _>(i) {
            serde_json::Value::from(v)
        } else {
            serde_json::Value::Null
        };
        object.insert(column.name().to_string(), value);
    }
    serde_json::Value::Object(object)
}
