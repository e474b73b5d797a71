//! Domain model for task lifecycle management.
//!
//! The task domain models tasks, their closure and extension requests, the
//! proofs attached to those requests, and the state machine that governs
//! task status. Infrastructure concerns stay outside this boundary.

mod actor;
mod error;
mod ids;
mod proof;
mod request;
mod task;

pub use actor::{Actor, Role, User};
pub use error::{ParseTaskEnumError, RequestDomainError, TaskDomainError};
pub use ids::{DepartmentId, ProofId, TaskId, TaskRequestId, UserId};
pub use proof::{Proof, ProofFile, StoredProof};
pub use request::{RequestParams, RequestStatus, RequestType, TaskRequest};
pub use task::{NewTask, PersistedTaskData, Task, TaskStatus};
