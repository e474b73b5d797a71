//! Port for the external proof file store.

use crate::task::domain::{ProofFile, StoredProof};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Stores proof files and hands back a stable locator.
///
/// Only the returned locator is persisted; file bytes never reach the task
/// store.
#[async_trait]
pub trait ProofStorage: Send + Sync {
    /// Uploads a file.
    ///
    /// # Errors
    ///
    /// Returns [`ProofStorageError`] when the file is rejected or the store
    /// is unavailable.
    async fn store(&self, file: &ProofFile) -> Result<StoredProof, ProofStorageError>;

    /// Removes a file stored under `url`. Unknown locators are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ProofStorageError::Unavailable`] when the store cannot be
    /// reached.
    async fn discard(&self, url: &str) -> Result<(), ProofStorageError>;
}

/// Errors returned by proof storage implementations.
#[derive(Debug, Clone, Error)]
pub enum ProofStorageError {
    /// The file was rejected by the store.
    #[error("proof file '{file_name}' rejected: {reason}")]
    Rejected {
        /// Offending file name.
        file_name: String,
        /// Reason given by the store.
        reason: String,
    },

    /// The store could not be reached.
    #[error("proof storage unavailable: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),
}
