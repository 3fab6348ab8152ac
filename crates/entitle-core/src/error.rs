//! Error types for entitlement operations

use thiserror::Error;

/// Entitlement error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntitlementError {
    /// No user identifier is available
    #[error("not signed in")]
    Unauthenticated,

    /// Remote store rejected the request
    #[error("remote store error: {0}")]
    Remote(String),

    /// Remote store could not be reached
    #[error("network error: {0}")]
    Network(String),

    /// Remote store answered with something we cannot read
    #[error("invalid response: {0}")]
    Decode(String),

    /// Invalid input or configuration
    #[error("config error: {0}")]
    Config(String),
}

/// Result type for entitlement operations
pub type EntitlementResult<T> = Result<T, EntitlementError>;
