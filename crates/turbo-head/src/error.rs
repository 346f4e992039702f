//! Error types for head management.

use thiserror::Error;

/// Errors surfaced by the head engine.
///
/// Withdrawing a handle twice and rendering a title without a captured
/// template are defined no-ops, so neither has a variant here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeadError {
    /// The caller supplied a descriptor of the wrong shape.
    #[error("Head contract violation: {0}")]
    ContractViolation(String),

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl HeadError {
    /// Shorthand for a contract violation.
    pub fn contract(msg: impl Into<String>) -> Self {
        HeadError::ContractViolation(msg.into())
    }

    /// Whether this error is a caller contract violation.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, HeadError::ContractViolation(_))
    }
}

/// Result alias used throughout the crate.
pub type HeadResult<T> = Result<T, HeadError>;
