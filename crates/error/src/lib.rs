//! # steward-error
//!
//! Unified error types for the Steward query workflow engine.
//!
//! All errors carry:
//! - Numeric error codes (STEWARD-XXXX)
//! - Structured JSON context
//! - Actionable hints for the caller

mod code;
mod context;

pub use code::{ErrorCategory, ErrorCode};
pub use context::ErrorContext;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The unified error type for all Steward operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StewardError {
    /// Numeric error code (e.g., "STEWARD-3001")
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Structured context for programmatic handling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,

    /// Actionable suggestion for the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl StewardError {
    /// Create a new error with code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            hint: None,
        }
    }

    /// Add structured context
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Add an actionable hint
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// True if this error belongs to the given category
    pub fn is(&self, category: ErrorCategory) -> bool {
        self.code.category() == category
    }

    /// Serialize to JSON for API responses
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize StewardError: {}", e);
            format!(
                r#"{{"code":"{}","message":"Serialization failed"}}"#,
                self.code
            )
        })
    }

    // --- Taxonomy constructors ---

    /// A malformed submission. Not retried, surfaced to the caller.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    /// A target could not be reached. Surfaced; the caller may retry.
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TargetUnreachable, message)
    }

    /// An operation attempted from the wrong lifecycle state. Never coerced.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, message)
    }

    /// Unknown record, approval, or target id.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RecordNotFound, message)
    }

    /// Authorization denial. Terminal, not retried.
    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    /// Rollback requested on a record that carries no backup snapshot.
    pub fn not_rollback_capable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotRollbackCapable, message)
    }

    /// Failure during a compensating restore. The most severe class: the
    /// underlying data state is ambiguous and needs operator intervention.
    pub fn rollback(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RollbackFailed, message)
    }
}

impl fmt::Display for StewardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (Hint: {})", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for StewardError {}

/// Result type alias for Steward operations
pub type Result<T> = std::result::Result<T, StewardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steward_error_builder() {
        let err = StewardError::new(ErrorCode::RecordNotFound, "Query record not found")
            .with_hint("Check the record id");

        assert_eq!(err.code, ErrorCode::RecordNotFound);
        assert_eq!(err.message, "Query record not found");
        assert_eq!(err.hint, Some("Check the record id".to_string()));
        assert!(err.context.is_none());
    }

    #[test]
    fn test_display_implementation() {
        let err = StewardError::invalid_state("Record is not approved")
            .with_hint("Complete the approval chain first");

        assert_eq!(
            err.to_string(),
            "[STEWARD-3001] Record is not approved (Hint: Complete the approval chain first)"
        );

        let err_no_hint = StewardError::rollback("Restore failed");
        assert_eq!(err_no_hint.to_string(), "[STEWARD-5003] Restore failed");
    }

    #[test]
    fn test_json_output() {
        let err = StewardError::new(ErrorCode::PoolExhausted, "Too many connections");
        let json = err.to_json();

        assert!(json.contains("\"code\":\"STEWARD-1002\""));
        assert!(json.contains("\"message\":\"Too many connections\""));
    }

    #[test]
    fn test_taxonomy_categories() {
        assert!(StewardError::connectivity("down").is(ErrorCategory::Connection));
        assert!(StewardError::validation("empty").is(ErrorCategory::Validation));
        assert!(StewardError::invalid_state("wrong").is(ErrorCategory::Workflow));
        assert!(StewardError::permission("denied").is(ErrorCategory::Auth));
        assert!(StewardError::rollback("boom").is(ErrorCategory::Execution));
    }
}
