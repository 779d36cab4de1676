//! Error types for schema parsing

use thiserror::Error;

/// Errors raised while parsing schema values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// Identity value is not a decimal integer
    #[error("Invalid identity: {0:?}")]
    InvalidIdentity(String),
}
