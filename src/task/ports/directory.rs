//! Port for the user and department directory.

use crate::task::domain::{DepartmentId, User, UserId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for directory lookups.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Read access to users and department heads.
#[async_trait]
pub trait DirectoryPort: Send + Sync {
    /// Finds a user by identifier.
    async fn find_user(&self, id: UserId) -> DirectoryResult<Option<User>>;

    /// Returns the head of `department`, if one is assigned.
    async fn head_of_department(&self, department: DepartmentId)
    -> DirectoryResult<Option<UserId>>;
}

/// Errors returned by directory implementations.
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    /// The directory could not be reached.
    #[error("directory unavailable: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),
}

impl DirectoryError {
    /// Wraps a backend error.
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Arc::new(err))
    }
}
