//! Approver assignment for the two-tier approval chain.
//!
//! Assignment is a deployment decision, so it sits behind
//! [`ApproverPolicy`]. Two strategies ship: [`TeamDerivedPolicy`] walks
//! the submitter's team to its lead and skip-lead, falling back to role
//! holders when the team has no leads on file, and [`RoleBasedPolicy`]
//! picks the first holder of each approver role regardless of team.

use std::collections::HashMap;
use std::sync::Arc;

use steward_common::auth::AuthenticatedUser;
use steward_error::{Result, StewardError};

pub const TEAM_APPROVER_ROLE: &str = "team-approver";
pub const SKIP_APPROVER_ROLE: &str = "skip-approver";

/// The two approvers a mutating query must pass, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproverChain {
    pub team: String,
    pub skip: String,
}

/// Directory of people, teams and roles. The engine never reads an org
/// chart directly; deployments plug theirs in here.
pub trait UserDirectory: Send + Sync {
    /// Direct lead of the named team, if known.
    fn team_lead(&self, team: &str) -> Option<String>;

    /// Skip-level lead of the named team, if known.
    fn skip_lead(&self, team: &str) -> Option<String>;

    /// First user holding the named role, in registration order.
    fn first_with_role(&self, role: &str) -> Option<String>;
}

/// Picks the approver chain for a submitter.
pub trait ApproverPolicy: Send + Sync {
    fn assign(&self, submitter: &AuthenticatedUser) -> Result<ApproverChain>;
}

/// In-memory directory for tests and embedded deployments.
#[derive(Default)]
pub struct StaticDirectory {
    // team -> (lead, skip_lead)
    teams: HashMap<String, (Option<String>, Option<String>)>,
    // role -> holders, in insertion order
    roles: HashMap<String, Vec<String>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_team(
        mut self,
        team: impl Into<String>,
        lead: Option<&str>,
        skip_lead: Option<&str>,
    ) -> Self {
        self.teams.insert(
            team.into(),
            (lead.map(String::from), skip_lead.map(String::from)),
        );
        self
    }

    pub fn with_role_holder(mut self, role: impl Into<String>, user: impl Into<String>) -> Self {
        self.roles.entry(role.into()).or_default().push(user.into());
        self
    }
}

impl UserDirectory for StaticDirectory {
    fn team_lead(&self, team: &str) -> Option<String> {
        self.teams.get(team).and_then(|(lead, _)| lead.clone())
    }

    fn skip_lead(&self, team: &str) -> Option<String> {
        self.teams.get(team).and_then(|(_, skip)| skip.clone())
    }

    fn first_with_role(&self, role: &str) -> Option<String> {
        self.roles.get(role).and_then(|holders| holders.first().cloned())
    }
}

/// Derives the chain from the submitter's team, with role holders as the
/// fallback when the team carries no leads.
pub struct TeamDerivedPolicy {
    directory: Arc<dyn UserDirectory>,
}

impl TeamDerivedPolicy {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }
}

impl ApproverPolicy for TeamDerivedPolicy {
    fn assign(&self, submitter: &AuthenticatedUser) -> Result<ApproverChain> {
        let team = submitter.team.as_deref();
        let team_approver = team
            .and_then(|t| self.directory.team_lead(t))
            .or_else(|| self.directory.first_with_role(TEAM_APPROVER_ROLE))
            .ok_or_else(|| {
                StewardError::validation(format!(
                    "No team approver available for submitter '{}'",
                    submitter.id
                ))
                .with_hint("Assign a team lead or register a team-approver role holder")
            })?;
        let skip_approver = team
            .and_then(|t| self.directory.skip_lead(t))
            .or_else(|| self.directory.first_with_role(SKIP_APPROVER_ROLE))
            .ok_or_else(|| {
                StewardError::validation(format!(
                    "No skip-level approver available for submitter '{}'",
                    submitter.id
                ))
                .with_hint("Assign a skip-level lead or register a skip-approver role holder")
            })?;
        Ok(ApproverChain {
            team: team_approver,
            skip: skip_approver,
        })
    }
}

/// Ignores team structure and assigns the first holder of each role.
pub struct RoleBasedPolicy {
    directory: Arc<dyn UserDirectory>,
}

impl RoleBasedPolicy {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }
}

impl ApproverPolicy for RoleBasedPolicy {
    fn assign(&self, submitter: &AuthenticatedUser) -> Result<ApproverChain> {
        let team = self
            .directory
            .first_with_role(TEAM_APPROVER_ROLE)
            .ok_or_else(|| {
                StewardError::validation(format!(
                    "No holder of role '{}' to approve for '{}'",
                    TEAM_APPROVER_ROLE, submitter.id
                ))
            })?;
        let skip = self
            .directory
            .first_with_role(SKIP_APPROVER_ROLE)
            .ok_or_else(|| {
                StewardError::validation(format!(
                    "No holder of role '{}' to approve for '{}'",
                    SKIP_APPROVER_ROLE, submitter.id
                ))
            })?;
        Ok(ApproverChain { team, skip })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submitter(team: Option<&str>) -> AuthenticatedUser {
        AuthenticatedUser {
            id: "carol".to_string(),
            team: team.map(String::from),
            permissions: vec![],
        }
    }

    #[test]
    fn test_team_derived_uses_team_leads() {
        let dir = Arc::new(
            StaticDirectory::new().with_team("data-eng", Some("alice"), Some("bob")),
        );
        let chain = TeamDerivedPolicy::new(dir)
            .assign(&submitter(Some("data-eng")))
            .unwrap();
        assert_eq!(chain.team, "alice");
        assert_eq!(chain.skip, "bob");
    }

    #[test]
    fn test_team_derived_falls_back_to_role_holders() {
        let dir = Arc::new(
            StaticDirectory::new()
                .with_team("data-eng", None, None)
                .with_role_holder(TEAM_APPROVER_ROLE, "alice")
                .with_role_holder(SKIP_APPROVER_ROLE, "bob"),
        );
        let chain = TeamDerivedPolicy::new(dir)
            .assign(&submitter(Some("data-eng")))
            .unwrap();
        assert_eq!(chain.team, "alice");
        assert_eq!(chain.skip, "bob");
    }

    #[test]
    fn test_team_derived_without_any_candidate_fails() {
        let dir = Arc::new(StaticDirectory::new());
        let err = TeamDerivedPolicy::new(dir)
            .assign(&submitter(None))
            .unwrap_err();
        assert_eq!(err.code, steward_error::ErrorCode::ValidationFailed);
    }

    #[test]
    fn test_role_based_takes_first_holder() {
        let dir = Arc::new(
            StaticDirectory::new()
                .with_role_holder(TEAM_APPROVER_ROLE, "alice")
                .with_role_holder(TEAM_APPROVER_ROLE, "dave")
                .with_role_holder(SKIP_APPROVER_ROLE, "bob"),
        );
        let chain = RoleBasedPolicy::new(dir).assign(&submitter(None)).unwrap();
        assert_eq!(chain.team, "alice");
        assert_eq!(chain.skip, "bob");
    }
}
