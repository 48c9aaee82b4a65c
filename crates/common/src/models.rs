use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of a submitted statement by its leading verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    /// Anything unrecognized is treated as mutating.
    Other,
}

impl StatementKind {
    pub fn is_read_only(&self) -> bool {
        matches!(self, StatementKind::Select)
    }
}

/// Lifecycle state of a query record.
///
/// `draft → submitted → team_approved → approved → executed`, with
/// `rejected` reachable from the two approval states, `failed` from an
/// execution attempt, and `rolled_back` from `executed` when rollback
/// metadata exists. Terminal states are retained for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Draft,
    Submitted,
    TeamApproved,
    Approved,
    Executed,
    Rejected,
    Failed,
    RolledBack,
}

impl std::fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QueryStatus::Draft => "draft",
            QueryStatus::Submitted => "submitted",
            QueryStatus::TeamApproved => "team_approved",
            QueryStatus::Approved => "approved",
            QueryStatus::Executed => "executed",
            QueryStatus::Rejected => "rejected",
            QueryStatus::Failed => "failed",
            QueryStatus::RolledBack => "rolled_back",
        };
        write!(f, "{}", s)
    }
}

/// A typed parameter value. The variant carries both the type tag and the
/// value, so each parameter has a statically known shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

/// One named statement parameter (`:name` placeholder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedParameter {
    pub name: String,
    #[serde(flatten)]
    pub value: ParamValue,
}

/// The two approval tiers, in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalRole {
    Team,
    Skip,
}

impl std::fmt::Display for ApprovalRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalRole::Team => write!(f, "team"),
            ApprovalRole::Skip => write!(f, "skip"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalDecision {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for ApprovalDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalDecision::Pending => write!(f, "pending"),
            ApprovalDecision::Approved => write!(f, "approved"),
            ApprovalDecision::Rejected => write!(f, "rejected"),
        }
    }
}

/// One decision step in a query record's approval chain. Append-only: a
/// decision is recorded once and never overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub id: Uuid,
    pub query_id: Uuid,
    pub role: ApprovalRole,
    pub approver: String,
    pub decision: ApprovalDecision,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl ApprovalRecord {
    pub fn pending(query_id: Uuid, role: ApprovalRole, approver: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            query_id,
            role,
            approver: approver.into(),
            decision: ApprovalDecision::Pending,
            comment: None,
            created_at: Utc::now(),
            decided_at: None,
        }
    }
}

/// Rollback metadata recorded when a backup snapshot was taken before a
/// mutating execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackMeta {
    pub backup_table: String,
    pub taken_at: DateTime<Utc>,
}

/// Advisory dry-run output. `estimated_rows == None` means the estimate is
/// explicitly unknown, not zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DryRunResult {
    pub estimated_rows: Option<u64>,
    pub estimated_cost: Option<f64>,
    pub plan_text: String,
    pub warnings: Vec<String>,
}

/// Outcome snapshot of one execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub rows_affected: Option<u64>,
    pub elapsed_ms: u64,
    /// First rows of a read-only result set, truncated to the configured
    /// preview bound.
    pub preview: Option<Vec<serde_json::Value>>,
    pub error_message: Option<String>,
}

/// The tracked unit of work: one submitted statement and its lifecycle.
///
/// Mutated only through workflow transitions; never physically deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub statement: String,
    pub kind: StatementKind,
    pub target_id: String,
    pub status: QueryStatus,
    pub submitter: String,
    pub parameters: Vec<NamedParameter>,
    pub team_approver: Option<String>,
    pub skip_approver: Option<String>,
    pub dry_run: bool,
    pub dry_run_result: Option<DryRunResult>,
    pub execution_result: Option<ExecutionResult>,
    pub error_message: Option<String>,
    pub rollback: Option<RollbackMeta>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
}

/// Boundary payload for a statement submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub statement: String,
    pub target_id: String,
    #[serde(default)]
    pub parameters: Vec<NamedParameter>,
    #[serde(default)]
    pub dry_run: bool,
}

/// Descriptor of one discovered table, fed into the external catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: String,
    pub length: Option<u32>,
    pub nullable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_kind_read_only() {
        assert!(StatementKind::Select.is_read_only());
        assert!(!StatementKind::Update.is_read_only());
        assert!(!StatementKind::Other.is_read_only());
    }

    #[test]
    fn test_status_display_matches_serde() {
        let json = serde_json::to_string(&QueryStatus::TeamApproved).unwrap();
        assert_eq!(json, "\"team_approved\"");
        assert_eq!(QueryStatus::TeamApproved.to_string(), "team_approved");
    }

    #[test]
    fn test_param_value_tagged_serde() {
        let p = NamedParameter {
            name: "dept".to_string(),
            value: ParamValue::Text("X".to_string()),
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["name"], "dept");
        assert_eq!(json["type"], "text");
        assert_eq!(json["value"], "X");
    }
}
