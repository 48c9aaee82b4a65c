//! Boundary contracts for durable storage.
//!
//! The core never owns persistence mechanics: query and approval records
//! live behind [`RecordStore`], discovered table metadata behind
//! [`CatalogStore`]. Records are created and updated, never deleted:
//! terminal lifecycle states are retained for audit. In-memory
//! implementations back tests and embedded use.

mod memory;

pub use memory::{MemoryCatalogStore, MemoryRecordStore};

use async_trait::async_trait;
use steward_common::models::{
    ApprovalDecision, ApprovalRecord, QueryRecord, QueryStatus, TableDescriptor,
};
use steward_error::Result;
use uuid::Uuid;

/// Create/read/update access to query and approval records.
///
/// Queryable by submitter, by status, and by assigned approver + decision
/// status. There is deliberately no delete operation.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_query(&self, record: QueryRecord) -> Result<()>;

    /// Fails with `RecordNotFound` for unknown ids.
    async fn get_query(&self, id: Uuid) -> Result<QueryRecord>;

    async fn update_query(&self, record: QueryRecord) -> Result<()>;

    async fn queries_by_submitter(&self, submitter: &str) -> Result<Vec<QueryRecord>>;

    async fn queries_by_status(&self, status: QueryStatus) -> Result<Vec<QueryRecord>>;

    async fn create_approval(&self, record: ApprovalRecord) -> Result<()>;

    /// Fails with `ApprovalNotFound` for unknown ids.
    async fn get_approval(&self, id: Uuid) -> Result<ApprovalRecord>;

    /// Atomically record a decision on a pending approval.
    ///
    /// Approvals are append-only: a decision is recorded once and never
    /// overwritten. Fails with `AlreadyDecided` when the record is no
    /// longer pending, so concurrent double-submission of a decision is
    /// rejected rather than coerced.
    async fn finalize_approval(
        &self,
        id: Uuid,
        decision: ApprovalDecision,
        comment: Option<String>,
    ) -> Result<ApprovalRecord>;

    /// All approval records for a query, oldest first.
    async fn approvals_for_query(&self, query_id: Uuid) -> Result<Vec<ApprovalRecord>>;

    async fn approvals_by_approver(
        &self,
        approver: &str,
        decision: ApprovalDecision,
    ) -> Result<Vec<ApprovalRecord>>;
}

/// Write-mostly catalog of discovered tables per target.
///
/// The core only writes discovered entries into it; execution decisions
/// never read back from here. The read side exists for statement-authoring
/// assistance and the read-side degradation path.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Idempotent merge: descriptors whose schema+table pair already
    /// exists are skipped. Returns the number of newly added tables.
    async fn merge_tables(&self, target_id: &str, tables: Vec<TableDescriptor>) -> Result<usize>;

    async fn tables_for_target(&self, target_id: &str) -> Result<Vec<TableDescriptor>>;
}
