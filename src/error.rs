//! Error types for hierarchy operations.

use crate::store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Structural errors: persisted hierarchy is corrupted
    CycleDetected,
    DepthExceeded,

    // Transient errors: retry the whole operation
    SubtreeChanged,
    StorageError,
}

/// Failure of a hierarchy operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CascadeError {
    /// The walk reached a task it had already visited.
    #[error("cycle detected in task hierarchy at {0}")]
    CycleDetected(String),

    /// The walk went deeper than the configured maximum.
    #[error("task hierarchy exceeds maximum depth at {0}")]
    DepthExceeded(String),

    /// Tasks were attached under the subtree after it was collected.
    #[error("subtree changed during delete; orphaned: {}", .orphans.join(", "))]
    SubtreeChanged { orphans: Vec<String> },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl CascadeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CascadeError::CycleDetected(_) => ErrorCode::CycleDetected,
            CascadeError::DepthExceeded(_) => ErrorCode::DepthExceeded,
            CascadeError::SubtreeChanged { .. } => ErrorCode::SubtreeChanged,
            CascadeError::Storage(_) => ErrorCode::StorageError,
        }
    }

    /// True when the persisted data violates the acyclic-tree assumption.
    /// Retrying will hit the same error; the data needs repair.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            CascadeError::CycleDetected(_) | CascadeError::DepthExceeded(_)
        )
    }

    /// True when retrying the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        !self.is_structural()
    }

    /// Id of the task the error is about, when there is one.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            CascadeError::CycleDetected(id) | CascadeError::DepthExceeded(id) => Some(id),
            CascadeError::Storage(StoreError::DeleteFailed { id, .. })
            | CascadeError::Storage(StoreError::NotFound(id)) => Some(id),
            _ => None,
        }
    }
}

/// Result type for hierarchy operations.
pub type CascadeResult<T> = std::result::Result<T, CascadeError>;
