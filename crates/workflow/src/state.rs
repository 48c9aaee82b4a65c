//! Legal lifecycle transitions for query records.
//!
//! The transition table is the single authority; every status change in
//! the engine goes through [`transition`] so an illegal move is rejected
//! with the same error shape everywhere.

use steward_common::models::{QueryRecord, QueryStatus};
use steward_error::{ErrorContext, Result, StewardError};

/// Whether `from → to` is a legal lifecycle move.
///
/// `draft → approved` is the read-only auto-approval shortcut; every
/// other edge follows the two-tier approval chain. Terminal states have
/// no outgoing edges except `executed → rolled_back`.
pub fn is_legal(from: QueryStatus, to: QueryStatus) -> bool {
    use QueryStatus::*;
    matches!(
        (from, to),
        (Draft, Submitted)
            | (Draft, Approved)
            | (Submitted, TeamApproved)
            | (Submitted, Rejected)
            | (TeamApproved, Approved)
            | (TeamApproved, Rejected)
            | (Approved, Executed)
            | (Approved, Failed)
            | (Executed, RolledBack)
    )
}

/// Move a record to `to`, or fail with `InvalidState` carrying the
/// current and expected statuses.
pub fn transition(record: &mut QueryRecord, to: QueryStatus) -> Result<()> {
    if !is_legal(record.status, to) {
        return Err(StewardError::invalid_state(format!(
            "Query '{}' cannot move from '{}' to '{}'",
            record.id, record.status, to
        ))
        .with_context(ErrorContext::InvalidTransition {
            record_id: record.id.to_string(),
            current: record.status.to_string(),
            expected: to.to_string(),
        }));
    }
    record.status = to;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use QueryStatus::*;

    #[test]
    fn test_happy_path_edges() {
        assert!(is_legal(Draft, Submitted));
        assert!(is_legal(Submitted, TeamApproved));
        assert!(is_legal(TeamApproved, Approved));
        assert!(is_legal(Approved, Executed));
        assert!(is_legal(Executed, RolledBack));
    }

    #[test]
    fn test_read_only_shortcut() {
        assert!(is_legal(Draft, Approved));
        assert!(!is_legal(Draft, Executed));
    }

    #[test]
    fn test_rejection_only_from_approval_states() {
        assert!(is_legal(Submitted, Rejected));
        assert!(is_legal(TeamApproved, Rejected));
        assert!(!is_legal(Draft, Rejected));
        assert!(!is_legal(Approved, Rejected));
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        for to in [Draft, Submitted, TeamApproved, Approved, Executed] {
            assert!(!is_legal(Rejected, to));
            assert!(!is_legal(Failed, to));
            assert!(!is_legal(RolledBack, to));
        }
        assert!(!is_legal(Executed, Approved));
    }

    #[test]
    fn test_no_skipping_tiers() {
        assert!(!is_legal(Submitted, Approved));
        assert!(!is_legal(Submitted, Executed));
    }
}
