//! Error types for box-controller

use box_types::ObjectKey;
use thiserror::Error;

/// Failures reported by the cluster collaborator
#[derive(Debug, Clone, Error)]
pub enum ClusterError {
    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object already exists or was concurrently modified
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Connectivity, rate limiting or any other transient failure
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Object rejected by the store
    #[error("Invalid object: {0}")]
    Invalid(String),
}

impl ClusterError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound(_))
    }
}

/// Result type for cluster operations
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors that abort a reconcile pass
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Parent resource could not be fetched
    #[error("Failed to fetch {key}: {source}")]
    FetchParent {
        key: ObjectKey,
        #[source]
        source: ClusterError,
    },

    /// Managed units could not be listed
    #[error("Failed to list boxes for {key}: {source}")]
    ListUnits {
        key: ObjectKey,
        #[source]
        source: ClusterError,
    },

    /// The pass ran past its deadline and was abandoned
    #[error("Reconcile of {0} exceeded its deadline")]
    DeadlineExceeded(ObjectKey),
}
