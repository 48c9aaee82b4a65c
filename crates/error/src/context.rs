//! # Error Contexts
//!
//! Structured metadata for errors to enable programmatic handling at the
//! API boundary.

use serde::{Deserialize, Serialize};

/// Structured context attached to a [`crate::StewardError`].
///
/// Each variant provides specific fields relevant to that error type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorContext {
    /// Context for connection errors (STEWARD-1001..1003)
    Connection {
        target: String,
        dialect: Option<String>,
        host: Option<String>,
        port: Option<u16>,
    },

    /// Context for STEWARD-3001 (InvalidState)
    InvalidTransition {
        record_id: String,
        current: String,
        expected: String,
    },

    /// Context for STEWARD-3004 (AlreadyDecided)
    Decision {
        approval_id: String,
        recorded_decision: String,
    },

    /// Context for STEWARD-4001 (PermissionDenied)
    Auth {
        user: Option<String>,
        required_permission: Option<String>,
    },

    /// Context for execution errors (STEWARD-5001..5004)
    Execution {
        record_id: String,
        table: Option<String>,
        backup_table: Option<String>,
    },

    /// Generic key-value context for extensibility
    Generic {
        #[serde(flatten)]
        data: std::collections::HashMap<String, serde_json::Value>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_context_serde_roundtrip() {
        let ctx = ErrorContext::InvalidTransition {
            record_id: "q-1".to_string(),
            current: "draft".to_string(),
            expected: "approved".to_string(),
        };

        let json = serde_json::to_string(&ctx).unwrap();
        let de: ErrorContext = serde_json::from_str(&json).unwrap();

        match de {
            ErrorContext::InvalidTransition { current, .. } => {
                assert_eq!(current, "draft");
            }
            _ => panic!("Wrong variant"),
        }
    }
}
