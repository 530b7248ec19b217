//! Error types for gradual-cfg
//!
//! Imprecision is not an error: constructs the builder cannot model become
//! `NotSupported` instructions. The errors here are the other tier, where the
//! desugared tree breaks a promise the builder relies on.

use crate::config::ConfigError;
use crate::shared::models::Span;
use thiserror::Error;

/// Main error type for lowering operations
#[derive(Debug, Error)]
pub enum LoweringError {
    /// The desugared tree (or the builder itself) broke an internal invariant.
    /// Only the method being lowered is abandoned.
    #[error("invariant violated while lowering `{method}` at {span}: {message}")]
    InvariantViolation {
        method: String,
        span: Span,
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl LoweringError {
    pub fn invariant(method: impl Into<String>, span: Span, message: impl Into<String>) -> Self {
        LoweringError::InvariantViolation {
            method: method.into(),
            span,
            message: message.into(),
        }
    }

    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, LoweringError::InvariantViolation { .. })
    }
}

/// Result type alias for lowering operations
pub type Result<T> = std::result::Result<T, LoweringError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invariant_message_carries_location() {
        let err = LoweringError::invariant("Foo#bar", Span::new(3, 1, 3, 9), "assign to non-local");
        assert!(err.is_invariant_violation());
        assert_eq!(
            err.to_string(),
            "invariant violated while lowering `Foo#bar` at 3:1-3:9: assign to non-local"
        );
    }
}
