//! Compensating restore from a backup snapshot.
//!
//! Rollback replays the snapshot taken before execution: clear the live
//! table, re-insert every snapshot row, all inside one transaction. The
//! backup table itself is kept afterwards for audit. A failed restore is
//! the most severe error this system produces; the record stays
//! `executed` and the error tells the operator which tables to look at.

use std::sync::Arc;

use steward_common::auth::{Action, AuthenticatedUser, Authorizer};
use steward_common::models::{QueryRecord, QueryStatus};
use steward_error::{ErrorContext, Result, StewardError};
use steward_store::RecordStore;
use steward_targets::{PoolManager, TargetRegistry};
use steward_workflow::state;
use tracing::{error, info};
use uuid::Uuid;

use crate::extract;

pub struct RollbackEngine {
    store: Arc<dyn RecordStore>,
    registry: Arc<TargetRegistry>,
    pools: Arc<PoolManager>,
    authorizer: Arc<dyn Authorizer>,
}

impl RollbackEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        registry: Arc<TargetRegistry>,
        pools: Arc<PoolManager>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            store,
            registry,
            pools,
            authorizer,
        }
    }

    /// Restore the mutated table to its pre-execution snapshot.
    ///
    /// Only executed records with rollback metadata qualify. Records
    /// executed without a snapshot fail with `NotRollbackCapable`.
    pub async fn rollback(&self, user: &AuthenticatedUser, query_id: Uuid) -> Result<QueryRecord> {
        self.authorizer.authorize(user, Action::Rollback).await?;

        let mut record = self.store.get_query(query_id).await?;
        if record.status != QueryStatus::Executed {
            return Err(StewardError::invalid_state(format!(
                "Query '{}' is '{}', only executed queries roll back",
                record.id, record.status
            )));
        }
        let meta = record.rollback.clone().ok_or_else(|| {
            StewardError::not_rollback_capable(format!(
                "Query '{}' executed without a backup snapshot",
                record.id
            ))
            .with_hint("Only single-table mutations with an extractable table are snapshot-backed")
        })?;

        let table = extract::mutated_table(&record.statement)?;
        let target = self.registry.get(&record.target_id)?;
        let pool = self.pools.get_or_create(&target.id).await?;

        let mut tx = pool.begin().await.map_err(|e| {
            restore_error(&record, &table, &meta.backup_table, e.to_string())
        })?;

        let restore = async {
            sqlx::query(&target.dialect.clear_table_sql(&table))
                .execute(&mut *tx)
                .await?;
            sqlx::query(&target.dialect.restore_sql(&table, &meta.backup_table))
                .execute(&mut *tx)
                .await?;
            Ok::<_, sqlx::Error>(())
        };
        if let Err(e) = restore.await {
            // Nothing was committed; the live table is whatever execution
            // left behind, the record stays executed.
            let _ = tx.rollback().await;
            error!(
                query_id = %record.id,
                table = %table,
                backup_table = %meta.backup_table,
                error = %e,
                "Rollback failed"
            );
            return Err(restore_error(&record, &table, &meta.backup_table, e.to_string()));
        }
        tx.commit()
            .await
            .map_err(|e| restore_error(&record, &table, &meta.backup_table, e.to_string()))?;

        state::transition(&mut record, QueryStatus::RolledBack)?;
        self.store.update_query(record.clone()).await?;
        info!(
            query_id = %record.id,
            table = %table,
            backup_table = %meta.backup_table,
            "Rollback complete"
        );
        Ok(record)
    }
}

fn restore_error(
    record: &QueryRecord,
    table: &str,
    backup_table: &str,
    cause: String,
) -> StewardError {
    StewardError::rollback(format!(
        "Rollback of query '{}' failed: {}",
        record.id, cause
    ))
    .with_context(ErrorContext::Execution {
        record_id: record.id.to_string(),
        table: Some(table.to_string()),
        backup_table: Some(backup_table.to_string()),
    })
    .with_hint("Inspect the live and backup tables before retrying; the restore did not commit")
}
