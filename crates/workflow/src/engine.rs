//! The query lifecycle engine.
//!
//! Owns the path from draft to a fully approved record: creation and
//! validation, submission with read-only auto-approval, and the two-tier
//! decision chain. Execution is a separate concern and never happens
//! here; this engine's job ends once a record reaches `approved` or a
//! terminal rejection.

use std::sync::Arc;

use chrono::Utc;
use steward_common::auth::{Action, AuthenticatedUser, Authorizer};
use steward_common::models::{
    ApprovalDecision, ApprovalRecord, ApprovalRole, QueryRecord, QueryStatus, Submission,
};
use steward_common::scrubber;
use steward_error::{Result, StewardError};
use steward_store::RecordStore;
use steward_targets::TargetRegistry;
use tracing::info;
use uuid::Uuid;

use crate::approver::ApproverPolicy;
use crate::classify::classify;
use crate::state;

pub struct WorkflowEngine {
    store: Arc<dyn RecordStore>,
    registry: Arc<TargetRegistry>,
    authorizer: Arc<dyn Authorizer>,
    policy: Arc<dyn ApproverPolicy>,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        registry: Arc<TargetRegistry>,
        authorizer: Arc<dyn Authorizer>,
        policy: Arc<dyn ApproverPolicy>,
    ) -> Self {
        Self {
            store,
            registry,
            authorizer,
            policy,
        }
    }

    /// Create a draft record from a submission.
    ///
    /// The statement is classified here, once, and the classification is
    /// stored on the record. Fails with a validation error when the
    /// statement is blank or the target is not registered.
    pub async fn create(
        &self,
        user: &AuthenticatedUser,
        submission: Submission,
    ) -> Result<QueryRecord> {
        self.authorizer.authorize(user, Action::Submit).await?;

        if submission.statement.trim().is_empty() {
            return Err(StewardError::new(
                steward_error::ErrorCode::EmptyStatement,
                "Submitted statement is empty",
            ));
        }
        if self.registry.get(&submission.target_id).is_err() {
            return Err(StewardError::validation(format!(
                "Unknown target '{}'",
                submission.target_id
            ))
            .with_hint("Register the target before submitting queries against it"));
        }

        let kind = classify(&submission.statement);
        let record = QueryRecord {
            id: Uuid::new_v4(),
            title: submission.title,
            description: submission.description,
            statement: submission.statement,
            kind,
            target_id: submission.target_id,
            status: QueryStatus::Draft,
            submitter: user.id.clone(),
            parameters: submission.parameters,
            team_approver: None,
            skip_approver: None,
            dry_run: submission.dry_run,
            dry_run_result: None,
            execution_result: None,
            error_message: None,
            rollback: None,
            created_at: Utc::now(),
            submitted_at: None,
            executed_at: None,
        };
        self.store.create_query(record.clone()).await?;

        info!(
            query_id = %record.id,
            target = %record.target_id,
            kind = ?record.kind,
            statement = %scrubber::scrub(&record.statement),
            "Query draft created"
        );
        Ok(record)
    }

    /// Submit a draft for approval.
    ///
    /// Read-only statements are auto-approved on the spot with no
    /// approval records. Mutating statements get their approver chain
    /// assigned and a pending team-tier approval created. Only the
    /// submitter may submit their own draft.
    pub async fn submit(&self, user: &AuthenticatedUser, query_id: Uuid) -> Result<QueryRecord> {
        self.authorizer.authorize(user, Action::Submit).await?;

        let mut record = self.store.get_query(query_id).await?;
        if record.submitter != user.id {
            return Err(StewardError::permission(format!(
                "Only submitter '{}' may submit query '{}'",
                record.submitter, record.id
            )));
        }

        if record.kind.is_read_only() {
            state::transition(&mut record, QueryStatus::Approved)?;
            record.submitted_at = Some(Utc::now());
            self.store.update_query(record.clone()).await?;
            info!(query_id = %record.id, "Read-only query auto-approved");
            return Ok(record);
        }

        let chain = self.policy.assign(user)?;
        state::transition(&mut record, QueryStatus::Submitted)?;
        record.submitted_at = Some(Utc::now());
        record.team_approver = Some(chain.team.clone());
        record.skip_approver = Some(chain.skip.clone());
        self.store.update_query(record.clone()).await?;

        let approval = ApprovalRecord::pending(record.id, ApprovalRole::Team, &chain.team);
        self.store.create_approval(approval).await?;

        info!(
            query_id = %record.id,
            team_approver = %chain.team,
            skip_approver = %chain.skip,
            "Mutating query submitted for approval"
        );
        Ok(record)
    }

    /// Record a decision on a pending approval and advance the parent
    /// record.
    ///
    /// Approve at the team tier opens the skip tier; approve at the skip
    /// tier marks the record approved. A rejection at either tier ends
    /// the chain. The decision itself is recorded atomically, so a
    /// second decision on the same approval fails with `AlreadyDecided`
    /// no matter how close the race.
    pub async fn decide(
        &self,
        user: &AuthenticatedUser,
        approval_id: Uuid,
        approve: bool,
        comment: Option<String>,
    ) -> Result<QueryRecord> {
        let approval = self.store.get_approval(approval_id).await?;

        let action = match approval.role {
            ApprovalRole::Team => Action::ApproveTeam,
            ApprovalRole::Skip => Action::ApproveSkip,
        };
        self.authorizer.authorize(user, action).await?;
        if approval.approver != user.id {
            return Err(StewardError::permission(format!(
                "Approval '{}' is assigned to '{}'",
                approval.id, approval.approver
            )));
        }

        let mut record = self.store.get_query(approval.query_id).await?;
        let expected = match approval.role {
            ApprovalRole::Team => QueryStatus::Submitted,
            ApprovalRole::Skip => QueryStatus::TeamApproved,
        };
        if record.status != expected {
            return Err(StewardError::invalid_state(format!(
                "Query '{}' is '{}', not awaiting a {} decision",
                record.id, record.status, approval.role
            )));
        }

        let decision = if approve {
            ApprovalDecision::Approved
        } else {
            ApprovalDecision::Rejected
        };
        // The store enforces at-most-one decision per approval.
        let decided = self
            .store
            .finalize_approval(approval.id, decision, comment)
            .await?;

        if !approve {
            state::transition(&mut record, QueryStatus::Rejected)?;
            self.store.update_query(record.clone()).await?;
            info!(
                query_id = %record.id,
                approver = %user.id,
                tier = %decided.role,
                "Query rejected"
            );
            return Ok(record);
        }

        match decided.role {
            ApprovalRole::Team => {
                state::transition(&mut record, QueryStatus::TeamApproved)?;
                self.store.update_query(record.clone()).await?;

                let skip_approver = record.skip_approver.clone().ok_or_else(|| {
                    StewardError::validation(format!(
                        "Query '{}' has no skip-level approver assigned",
                        record.id
                    ))
                })?;
                let next =
                    ApprovalRecord::pending(record.id, ApprovalRole::Skip, &skip_approver);
                self.store.create_approval(next).await?;
                info!(
                    query_id = %record.id,
                    approver = %user.id,
                    next_approver = %skip_approver,
                    "Team tier approved, skip tier opened"
                );
            }
            ApprovalRole::Skip => {
                state::transition(&mut record, QueryStatus::Approved)?;
                self.store.update_query(record.clone()).await?;
                info!(query_id = %record.id, approver = %user.id, "Query fully approved");
            }
        }
        Ok(record)
    }

    /// Pending approvals waiting on the given user, oldest first.
    pub async fn pending_for(&self, approver: &str) -> Result<Vec<ApprovalRecord>> {
        self.store
            .approvals_by_approver(approver, ApprovalDecision::Pending)
            .await
    }
}
