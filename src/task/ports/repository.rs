//! Repository port for tasks and the requests and proofs they own.

use crate::task::domain::{
    DepartmentId, Proof, Task, TaskId, TaskRequest, TaskRequestId, TaskStatus, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for task repository operations.
pub type TaskRepositoryResult<T> = Result<T, TaskRepositoryError>;

/// Persistence contract for the task ownership tree.
///
/// A task owns its requests and proofs, so the writes that touch both a
/// task and one of its requests are single operations here. Implementations
/// must apply each of them atomically and must reject a task write whose
/// `expected_revision` no longer matches the stored revision.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Allocates the next task identifier.
    async fn next_id(&self) -> TaskRepositoryResult<TaskId>;

    /// Stores a new task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::DuplicateTask`] when the identifier is
    /// already used.
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()>;

    /// Persists changes to an existing task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the task does not
    /// exist and [`TaskRepositoryError::RevisionMismatch`] when another
    /// writer updated it first.
    async fn update(&self, task: &Task, expected_revision: u64) -> TaskRepositoryResult<()>;

    /// Finds a task by identifier.
    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>>;

    /// Returns tasks currently in `status`.
    async fn find_by_status(&self, status: TaskStatus) -> TaskRepositoryResult<Vec<Task>>;

    /// Returns tasks assigned to `user`.
    async fn find_by_assignee(&self, user: UserId) -> TaskRepositoryResult<Vec<Task>>;

    /// Returns tasks linked to `department`.
    async fn find_by_department(&self, department: DepartmentId)
    -> TaskRepositoryResult<Vec<Task>>;

    /// Returns active, non-closed tasks whose start date lies in
    /// `[from, until)`.
    async fn find_starting_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> TaskRepositoryResult<Vec<Task>>;

    /// Returns active, non-closed tasks whose due date lies in
    /// `[from, until)`.
    async fn find_due_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> TaskRepositoryResult<Vec<Task>>;

    /// Returns active, non-closed tasks whose due date lies before `before`.
    async fn find_overdue(&self, before: DateTime<Utc>) -> TaskRepositoryResult<Vec<Task>>;

    /// Stores a new pending request with its proofs and the task transition
    /// that accompanies it, as one unit.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::PendingRequestExists`] when the task
    /// already has a pending request, [`TaskRepositoryError::RevisionMismatch`]
    /// on a concurrent task update, or [`TaskRepositoryError::NotFound`].
    async fn store_request(
        &self,
        task: &Task,
        expected_revision: u64,
        request: &TaskRequest,
        proofs: &[Proof],
    ) -> TaskRepositoryResult<()>;

    /// Stores the resolution of a pending request together with the task
    /// transition it drives, as one unit.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::RequestNotPending`] when the stored
    /// request was already resolved, [`TaskRepositoryError::RevisionMismatch`]
    /// on a concurrent task update, or a not-found error.
    async fn resolve_request(
        &self,
        task: &Task,
        expected_revision: u64,
        request: &TaskRequest,
    ) -> TaskRepositoryResult<()>;

    /// Finds a request by identifier.
    async fn find_request(&self, id: TaskRequestId) -> TaskRepositoryResult<Option<TaskRequest>>;

    /// Finds the pending request of a task, if any.
    async fn find_pending_request(
        &self,
        task_id: TaskId,
    ) -> TaskRepositoryResult<Option<TaskRequest>>;

    /// Lists every request raised against a task, oldest first.
    async fn list_requests(&self, task_id: TaskId) -> TaskRepositoryResult<Vec<TaskRequest>>;

    /// Lists the proofs attached to a request in upload order.
    async fn list_proofs(&self, request_id: TaskRequestId) -> TaskRepositoryResult<Vec<Proof>>;
}

/// Errors returned by task repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskRepositoryError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The request was not found.
    #[error("task request not found: {0}")]
    RequestNotFound(TaskRequestId),

    /// The task already has a pending request.
    #[error("task {0} already has a pending request")]
    PendingRequestExists(TaskId),

    /// The stored request is no longer pending.
    #[error("task request {0} is no longer pending")]
    RequestNotPending(TaskRequestId),

    /// The stored task revision differs from the expected one.
    #[error("task {task_id} was modified concurrently (expected revision {expected}, found {actual})")]
    RevisionMismatch {
        /// Task being written.
        task_id: TaskId,
        /// Revision the writer read.
        expected: u64,
        /// Revision currently stored.
        actual: u64,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Returns `true` for errors caused by a competing writer or an
    /// existing pending request.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::DuplicateTask(_)
                | Self::PendingRequestExists(_)
                | Self::RequestNotPending(_)
                | Self::RevisionMismatch { .. }
        )
    }
}
