//! Structured error types for the Cyanea ecosystem.

use thiserror::Error;

/// Unified error type for all Cyanea operations.
#[derive(Debug, Error)]
pub enum CyaneaError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error (malformed input data)
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid input (bad arguments, out-of-range values, violated preconditions)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Internal consistency failure. Signals a defect, never a data condition.
    #[error("internal error: {0}")]
    Internal(String),

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the Cyanea ecosystem.
pub type Result<T> = std::result::Result<T, CyaneaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_category() {
        let err = CyaneaError::InvalidInput("batch is empty".into());
        assert_eq!(err.to_string(), "invalid input: batch is empty");

        let err = CyaneaError::Internal("bad backtrace code 7".into());
        assert_eq!(err.to_string(), "internal error: bad backtrace code 7");
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CyaneaError = io.into();
        assert!(matches!(err, CyaneaError::Io(_)));
    }
}
