use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric error codes following STEWARD-XXXX format.
///
/// ## Code Ranges
/// - **1000-1999**: Connection errors
/// - **2000-2999**: Validation errors
/// - **3000-3999**: Workflow/state errors
/// - **4000-4999**: Authorization errors
/// - **5000-5999**: Execution/rollback errors
///
/// Codes are stable across versions (semver contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
#[non_exhaustive]
pub enum ErrorCode {
    // === Connection Errors (1000-1999) ===
    /// STEWARD-1001: Target unreachable
    TargetUnreachable = 1001,
    /// STEWARD-1002: Connection pool exhausted
    PoolExhausted = 1002,
    /// STEWARD-1003: Pool creation failed
    PoolCreationFailed = 1003,

    // === Validation Errors (2000-2999) ===
    /// STEWARD-2001: Malformed submission
    ValidationFailed = 2001,
    /// STEWARD-2002: Statement text is empty
    EmptyStatement = 2002,
    /// STEWARD-2003: Unsupported dialect tag on a target
    UnknownDialect = 2003,
    /// STEWARD-2004: Named parameter missing or of the wrong shape
    InvalidParameter = 2004,

    // === Workflow Errors (3000-3999) ===
    /// STEWARD-3001: Operation attempted from the wrong lifecycle state
    InvalidState = 3001,
    /// STEWARD-3002: Query record not found
    RecordNotFound = 3002,
    /// STEWARD-3003: Approval record not found
    ApprovalNotFound = 3003,
    /// STEWARD-3004: Approval already decided
    AlreadyDecided = 3004,
    /// STEWARD-3005: Target not registered
    TargetNotFound = 3005,

    // === Auth Errors (4000-4999) ===
    /// STEWARD-4001: Authorization denied
    PermissionDenied = 4001,

    // === Execution Errors (5000-5999) ===
    /// STEWARD-5001: Statement execution failed
    ExecutionFailed = 5001,
    /// STEWARD-5002: No backup snapshot exists for this record
    NotRollbackCapable = 5002,
    /// STEWARD-5003: Compensating restore failed
    RollbackFailed = 5003,
    /// STEWARD-5004: Target table could not be extracted from the statement
    ExtractionFailed = 5004,

    /// STEWARD-9999: Unknown/unclassified error
    Unknown = 9999,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Get the formatted code string (e.g., "STEWARD-3001")
    pub fn as_str(&self) -> String {
        format!("STEWARD-{:04}", self.as_u16())
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self.as_u16() {
            1000..=1999 => ErrorCategory::Connection,
            2000..=2999 => ErrorCategory::Validation,
            3000..=3999 => ErrorCategory::Workflow,
            4000..=4999 => ErrorCategory::Auth,
            5000..=5999 => ErrorCategory::Execution,
            _ => ErrorCategory::Execution,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> String {
        code.as_str()
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        // Parse "STEWARD-XXXX" format
        let num: u16 = s
            .strip_prefix("STEWARD-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| "Invalid format".to_string())?;
        Self::try_from(num).map_err(|_| "Unknown code".to_string())
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(n: u16) -> std::result::Result<Self, Self::Error> {
        match n {
            1001 => Ok(Self::TargetUnreachable),
            1002 => Ok(Self::PoolExhausted),
            1003 => Ok(Self::PoolCreationFailed),
            2001 => Ok(Self::ValidationFailed),
            2002 => Ok(Self::EmptyStatement),
            2003 => Ok(Self::UnknownDialect),
            2004 => Ok(Self::InvalidParameter),
            3001 => Ok(Self::InvalidState),
            3002 => Ok(Self::RecordNotFound),
            3003 => Ok(Self::ApprovalNotFound),
            3004 => Ok(Self::AlreadyDecided),
            3005 => Ok(Self::TargetNotFound),
            4001 => Ok(Self::PermissionDenied),
            5001 => Ok(Self::ExecutionFailed),
            5002 => Ok(Self::NotRollbackCapable),
            5003 => Ok(Self::RollbackFailed),
            5004 => Ok(Self::ExtractionFailed),
            9999 => Ok(Self::Unknown),
            _ => Err(format!("Unknown error code: {}", n)),
        }
    }
}

/// High-level error category for boundary mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ErrorCategory {
    Connection,
    Validation,
    Workflow,
    Auth,
    Execution,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_formatting() {
        assert_eq!(ErrorCode::TargetUnreachable.as_str(), "STEWARD-1001");
        assert_eq!(ErrorCode::InvalidState.as_str(), "STEWARD-3001");
        assert_eq!(ErrorCode::Unknown.as_str(), "STEWARD-9999");
    }

    #[test]
    fn test_error_code_parsing() {
        assert_eq!(
            ErrorCode::try_from("STEWARD-1001".to_string()).unwrap(),
            ErrorCode::TargetUnreachable
        );
        assert_eq!(
            ErrorCode::try_from("STEWARD-9999".to_string()).unwrap(),
            ErrorCode::Unknown
        );
    }

    #[test]
    fn test_error_code_parsing_errors() {
        assert!(ErrorCode::try_from("INVALID".to_string()).is_err());
        assert!(ErrorCode::try_from("STEWARD-0000".to_string()).is_err());
        assert!(ErrorCode::try_from("STEWARD-ABC".to_string()).is_err());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            ErrorCode::TargetUnreachable.category(),
            ErrorCategory::Connection
        );
        assert_eq!(
            ErrorCode::EmptyStatement.category(),
            ErrorCategory::Validation
        );
        assert_eq!(ErrorCode::AlreadyDecided.category(), ErrorCategory::Workflow);
        assert_eq!(
            ErrorCode::PermissionDenied.category(),
            ErrorCategory::Auth
        );
        assert_eq!(
            ErrorCode::RollbackFailed.category(),
            ErrorCategory::Execution
        );
    }
}
