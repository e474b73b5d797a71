//! In-memory adapter implementations for the task context.
//!
//! These adapters provide simple, thread-safe implementations suitable for
//! tests and for running the daemon without external infrastructure.

mod directory;
mod email;
mod proof_storage;
mod task;

pub use directory::InMemoryDirectory;
pub use email::RecordingEmailNotifier;
pub use proof_storage::InMemoryProofStorage;
pub use task::InMemoryTaskRepository;
