use crate::{CatalogStore, RecordStore};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use steward_common::models::{
    ApprovalDecision, ApprovalRecord, QueryRecord, QueryStatus, TableDescriptor,
};
use steward_error::{Result, StewardError};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory record store. Backs tests and embedded deployments; the
/// production store lives outside the core.
#[derive(Default)]
pub struct MemoryRecordStore {
    queries: RwLock<HashMap<Uuid, QueryRecord>>,
    approvals: RwLock<HashMap<Uuid, ApprovalRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create_query(&self, record: QueryRecord) -> Result<()> {
        self.queries.write().await.insert(record.id, record);
        Ok(())
    }

    async fn get_query(&self, id: Uuid) -> Result<QueryRecord> {
        self.queries
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StewardError::not_found(format!("Query record '{}' not found", id)))
    }

    async fn update_query(&self, record: QueryRecord) -> Result<()> {
        let mut queries = self.queries.write().await;
        if !queries.contains_key(&record.id) {
            return Err(StewardError::not_found(format!(
                "Query record '{}' not found",
                record.id
            )));
        }
        queries.insert(record.id, record);
        Ok(())
    }

    async fn queries_by_submitter(&self, submitter: &str) -> Result<Vec<QueryRecord>> {
        let mut found: Vec<QueryRecord> = self
            .queries
            .read()
            .await
            .values()
            .filter(|q| q.submitter == submitter)
            .cloned()
            .collect();
        found.sort_by_key(|q| q.created_at);
        Ok(found)
    }

    async fn queries_by_status(&self, status: QueryStatus) -> Result<Vec<QueryRecord>> {
        let mut found: Vec<QueryRecord> = self
            .queries
            .read()
            .await
            .values()
            .filter(|q| q.status == status)
            .cloned()
            .collect();
        found.sort_by_key(|q| q.created_at);
        Ok(found)
    }

    async fn create_approval(&self, record: ApprovalRecord) -> Result<()> {
        self.approvals.write().await.insert(record.id, record);
        Ok(())
    }

    async fn get_approval(&self, id: Uuid) -> Result<ApprovalRecord> {
        self.approvals.read().await.get(&id).cloned().ok_or_else(|| {
            StewardError::new(
                steward_error::ErrorCode::ApprovalNotFound,
                format!("Approval record '{}' not found", id),
            )
        })
    }

    async fn finalize_approval(
        &self,
        id: Uuid,
        decision: ApprovalDecision,
        comment: Option<String>,
    ) -> Result<ApprovalRecord> {
        let mut approvals = self.approvals.write().await;
        let record = approvals.get_mut(&id).ok_or_else(|| {
            StewardError::new(
                steward_error::ErrorCode::ApprovalNotFound,
                format!("Approval record '{}' not found", id),
            )
        })?;
        if record.decision != ApprovalDecision::Pending {
            return Err(StewardError::new(
                steward_error::ErrorCode::AlreadyDecided,
                format!("Approval '{}' already carries a decision", id),
            )
            .with_context(steward_error::ErrorContext::Decision {
                approval_id: id.to_string(),
                recorded_decision: record.decision.to_string(),
            }));
        }
        record.decision = decision;
        record.comment = comment;
        record.decided_at = Some(Utc::now());
        Ok(record.clone())
    }

    async fn approvals_for_query(&self, query_id: Uuid) -> Result<Vec<ApprovalRecord>> {
        let mut found: Vec<ApprovalRecord> = self
            .approvals
            .read()
            .await
            .values()
            .filter(|a| a.query_id == query_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.created_at);
        Ok(found)
    }

    async fn approvals_by_approver(
        &self,
        approver: &str,
        decision: ApprovalDecision,
    ) -> Result<Vec<ApprovalRecord>> {
        let mut found: Vec<ApprovalRecord> = self
            .approvals
            .read()
            .await
            .values()
            .filter(|a| a.approver == approver && a.decision == decision)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.created_at);
        Ok(found)
    }
}

/// In-memory table catalog keyed by target id.
#[derive(Default)]
pub struct MemoryCatalogStore {
    tables: RwLock<HashMap<String, Vec<TableDescriptor>>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn merge_tables(&self, target_id: &str, tables: Vec<TableDescriptor>) -> Result<usize> {
        let mut catalog = self.tables.write().await;
        let entry = catalog.entry(target_id.to_string()).or_default();

        let mut added = 0;
        for table in tables {
            let exists = entry
                .iter()
                .any(|t| t.schema == table.schema && t.name == table.name);
            if !exists {
                entry.push(table);
                added += 1;
            }
        }
        Ok(added)
    }

    async fn tables_for_target(&self, target_id: &str) -> Result<Vec<TableDescriptor>> {
        Ok(self
            .tables
            .read()
            .await
            .get(target_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use steward_common::models::{ApprovalRole, StatementKind};

    fn record(submitter: &str, status: QueryStatus) -> QueryRecord {
        QueryRecord {
            id: Uuid::new_v4(),
            title: "test".to_string(),
            description: None,
            statement: "SELECT 1".to_string(),
            kind: StatementKind::Select,
            target_id: "t1".to_string(),
            status,
            submitter: submitter.to_string(),
            parameters: vec![],
            team_approver: None,
            skip_approver: None,
            dry_run: false,
            dry_run_result: None,
            execution_result: None,
            error_message: None,
            rollback: None,
            created_at: Utc::now(),
            submitted_at: None,
            executed_at: None,
        }
    }

    #[tokio::test]
    async fn test_query_crud_and_filters() {
        let store = MemoryRecordStore::new();
        let a = record("alice", QueryStatus::Draft);
        let b = record("bob", QueryStatus::Approved);
        store.create_query(a.clone()).await.unwrap();
        store.create_query(b.clone()).await.unwrap();

        assert_eq!(store.get_query(a.id).await.unwrap().submitter, "alice");
        assert_eq!(store.queries_by_submitter("bob").await.unwrap().len(), 1);
        assert_eq!(
            store
                .queries_by_status(QueryStatus::Approved)
                .await
                .unwrap()
                .len(),
            1
        );

        let missing = store.get_query(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(missing.code, steward_error::ErrorCode::RecordNotFound);
    }

    #[tokio::test]
    async fn test_update_unknown_query_fails() {
        let store = MemoryRecordStore::new();
        let err = store
            .update_query(record("alice", QueryStatus::Draft))
            .await
            .unwrap_err();
        assert_eq!(err.code, steward_error::ErrorCode::RecordNotFound);
    }

    #[tokio::test]
    async fn test_finalize_approval_rejects_second_decision() {
        let store = MemoryRecordStore::new();
        let approval = ApprovalRecord::pending(Uuid::new_v4(), ApprovalRole::Team, "lead");
        store.create_approval(approval.clone()).await.unwrap();

        let decided = store
            .finalize_approval(approval.id, ApprovalDecision::Approved, None)
            .await
            .unwrap();
        assert_eq!(decided.decision, ApprovalDecision::Approved);
        assert!(decided.decided_at.is_some());

        let err = store
            .finalize_approval(approval.id, ApprovalDecision::Rejected, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, steward_error::ErrorCode::AlreadyDecided);

        // The first decision stands untouched.
        let kept = store.get_approval(approval.id).await.unwrap();
        assert_eq!(kept.decision, ApprovalDecision::Approved);
    }

    #[tokio::test]
    async fn test_catalog_merge_is_idempotent() {
        let store = MemoryCatalogStore::new();
        let t = TableDescriptor {
            schema: "public".to_string(),
            name: "employees".to_string(),
            columns: vec![],
        };

        assert_eq!(store.merge_tables("t1", vec![t.clone()]).await.unwrap(), 1);
        assert_eq!(store.merge_tables("t1", vec![t.clone()]).await.unwrap(), 0);
        assert_eq!(store.tables_for_target("t1").await.unwrap().len(), 1);
    }
}
