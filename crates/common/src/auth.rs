use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use steward_error::{ErrorContext, StewardError};

/// State-changing actions gated by the authorization collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Submit,
    ApproveTeam,
    ApproveSkip,
    Execute,
    Rollback,
}

impl Action {
    /// Permission string checked against the caller's grants.
    pub fn permission(&self) -> &'static str {
        match self {
            Action::Submit => "query:submit",
            Action::ApproveTeam => "approve:team",
            Action::ApproveSkip => "approve:skip",
            Action::Execute => "query:execute",
            Action::Rollback => "query:rollback",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AuthenticatedUser {
    pub id: String,
    /// Team membership used by the team-derived approver policy.
    pub team: Option<String>,
    pub permissions: Vec<String>,
}

impl AuthenticatedUser {
    pub fn new(id: impl Into<String>, permissions: Vec<String>) -> Self {
        Self {
            id: id.into(),
            team: None,
            permissions,
        }
    }

    /// Returns true if the user has the specified permission.
    /// Supports wildcards, e.g., 'query:*' matches 'query:execute'.
    ///
    /// # Security
    /// Admin permissions (`admin` or `system:admin`) bypass all checks.
    /// This bypass is logged for audit purposes.
    pub fn has_permission(&self, permission: &str) -> bool {
        if self
            .permissions
            .iter()
            .any(|p| p == "admin" || p == "system:admin")
        {
            tracing::info!(
                user_id = %self.id,
                permission = %permission,
                "Permission granted via admin bypass"
            );
            return true;
        }

        for p in &self.permissions {
            if p == permission {
                return true;
            }

            if p.ends_with(":*") {
                let prefix = &p[..p.len() - 1]; // "query:"
                if permission.starts_with(prefix) {
                    return true;
                }
            }

            if p == "*" {
                return true;
            }
        }

        false
    }
}

/// The authorization collaborator. Consulted before every state-changing
/// operation; a denial is terminal and never retried.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, user: &AuthenticatedUser, action: Action)
        -> steward_error::Result<()>;
}

/// Permission-string authorizer backed by the grants carried on the
/// caller identity itself.
#[derive(Debug, Default)]
pub struct StaticAuthorizer;

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn authorize(
        &self,
        user: &AuthenticatedUser,
        action: Action,
    ) -> steward_error::Result<()> {
        if user.has_permission(action.permission()) {
            return Ok(());
        }
        Err(StewardError::permission(format!(
            "User '{}' lacks permission for action '{}'",
            user.id,
            action.permission()
        ))
        .with_context(ErrorContext::Auth {
            user: Some(user.id.clone()),
            required_permission: Some(action.permission().to_string()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(perms: &[&str]) -> AuthenticatedUser {
        AuthenticatedUser::new("alice", perms.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_exact_permission() {
        assert!(user(&["query:submit"]).has_permission("query:submit"));
        assert!(!user(&["query:submit"]).has_permission("query:execute"));
    }

    #[test]
    fn test_wildcard_permission() {
        let u = user(&["query:*"]);
        assert!(u.has_permission("query:execute"));
        assert!(u.has_permission("query:rollback"));
        assert!(!u.has_permission("approve:team"));
    }

    #[test]
    fn test_admin_bypass() {
        assert!(user(&["admin"]).has_permission("approve:skip"));
        assert!(user(&["*"]).has_permission("anything:at:all"));
    }

    #[tokio::test]
    async fn test_static_authorizer_denies() {
        let auth = StaticAuthorizer;
        let u = user(&["query:submit"]);
        assert!(auth.authorize(&u, Action::Submit).await.is_ok());

        let err = auth.authorize(&u, Action::Rollback).await.unwrap_err();
        assert_eq!(err.code, steward_error::ErrorCode::PermissionDenied);
    }
}
