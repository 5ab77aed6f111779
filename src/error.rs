//! Error Types
//!
//! Failure kinds surfaced by the orchestration layer. Every capability returns
//! `Result<T, ToolError>` so the request layer can tell a bad parameter from a
//! missing binary from a tool that ran and failed.

use std::fmt;
use std::time::Duration;

/// Why a caller-supplied value was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    /// Empty after trimming
    Empty,
    /// Contains `\n` or `\r`
    MultiLine,
    /// Contains a character outside the allow-list for its kind
    InvalidCharacters,
    /// Expected an all-digit value
    NotNumeric,
    /// Numeric value outside its permitted range
    OutOfRange,
    /// Referenced file does not exist
    NotFound,
    /// Not one of the accepted choices
    NotAllowed,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationFailure::Empty => write!(f, "cannot be empty"),
            ValidationFailure::MultiLine => write!(f, "must be a single line"),
            ValidationFailure::InvalidCharacters => write!(f, "contains invalid characters"),
            ValidationFailure::NotNumeric => write!(f, "must be numeric"),
            ValidationFailure::OutOfRange => write!(f, "is out of range"),
            ValidationFailure::NotFound => write!(f, "does not exist"),
            ValidationFailure::NotAllowed => write!(f, "is not a supported value"),
        }
    }
}

/// A caller-supplied value failed sanitization
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} {reason}")]
pub struct ValidationError {
    /// Name of the offending parameter
    pub field: String,

    /// Which constraint was violated
    pub reason: ValidationFailure,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: ValidationFailure) -> Self {
        Self {
            field: field.into(),
            reason,
        }
    }
}

/// Error types for tool orchestration
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Parameter rejected before any process was spawned
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Backing binary is not installed
    #[error("{binary} command not found. Please install {binary}.")]
    NotInstalled { binary: String },

    /// Tool exited non-zero on a synchronous invocation
    #[error("{tool} failed (exit code: {exit_code:?}): {stderr}")]
    Execution {
        tool: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Synchronous invocation exceeded its ceiling and was killed
    #[error("{tool} timed out after {after:?}")]
    TimedOut { tool: String, after: Duration },

    /// Structured report could not be parsed
    #[error("Failed to parse {tool} output: {reason}")]
    OutputParse { tool: String, reason: String },

    /// Local I/O failure (scratch files, artifacts, pipes)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// Stable short name used for logs, metrics and API payloads
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::Validation(_) => "validation",
            ToolError::NotInstalled { .. } => "not_installed",
            ToolError::Execution { .. } => "execution",
            ToolError::TimedOut { .. } => "timed_out",
            ToolError::OutputParse { .. } => "output_parse",
            ToolError::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_message_names_field() {
        let err = ValidationError::new("session_id", ValidationFailure::NotNumeric);
        assert_eq!(err.to_string(), "session_id must be numeric");
    }

    #[test]
    fn test_validation_converts_into_tool_error() {
        let err: ToolError = ValidationError::new("rhosts", ValidationFailure::MultiLine).into();
        assert_eq!(err.kind(), "validation");
        assert!(err.to_string().contains("rhosts must be a single line"));
    }

    #[test]
    fn test_not_installed_message() {
        let err = ToolError::NotInstalled {
            binary: "nmap".to_string(),
        };
        assert_eq!(err.to_string(), "nmap command not found. Please install nmap.");
        assert_eq!(err.kind(), "not_installed");
    }

    #[test]
    fn test_execution_error_carries_stderr() {
        let err = ToolError::Execution {
            tool: "netdiscover".to_string(),
            exit_code: Some(1),
            stderr: "permission denied".to_string(),
        };
        assert!(err.to_string().contains("permission denied"));
    }
}
