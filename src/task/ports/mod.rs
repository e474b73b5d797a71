//! Port contracts for task lifecycle management.
//!
//! Ports define infrastructure-agnostic interfaces used by task services.

pub mod directory;
pub mod email;
pub mod proof_storage;
pub mod repository;

pub use directory::{DirectoryError, DirectoryPort, DirectoryResult};
pub use email::{EmailError, EmailMessage, EmailNotifier};
pub use proof_storage::{ProofStorage, ProofStorageError};
pub use repository::{TaskRepository, TaskRepositoryError, TaskRepositoryResult};
