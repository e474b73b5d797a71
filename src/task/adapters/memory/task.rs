//! In-memory repository for tasks, requests and proofs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::task::{
    domain::{
        DepartmentId, Proof, Task, TaskId, TaskRequest, TaskRequestId, TaskStatus, UserId,
    },
    ports::{TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};

/// Thread-safe in-memory task repository.
///
/// All writes take the same lock, so the combined task-and-request writes
/// are atomic.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    state: Arc<RwLock<InMemoryTaskState>>,
}

#[derive(Debug, Default)]
struct InMemoryTaskState {
    last_id: u64,
    tasks: HashMap<TaskId, Task>,
    requests: HashMap<TaskRequestId, TaskRequest>,
    request_index: HashMap<TaskId, Vec<TaskRequestId>>,
    proofs: HashMap<TaskRequestId, Vec<Proof>>,
}

impl InMemoryTaskRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> TaskRepositoryResult<RwLockReadGuard<'_, InMemoryTaskState>> {
        self.state.read().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> TaskRepositoryResult<RwLockWriteGuard<'_, InMemoryTaskState>> {
        self.state.write().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn collect_tasks(&self, predicate: impl Fn(&Task) -> bool) -> TaskRepositoryResult<Vec<Task>> {
        let state = self.read()?;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|task| predicate(task))
            .cloned()
            .collect();
        tasks.sort_by_key(Task::id);
        Ok(tasks)
    }
}

fn is_scannable(task: &Task) -> bool {
    task.is_active() && !task.status().is_terminal()
}

/// Checks the stored revision of `task` against `expected_revision`.
fn check_revision(
    state: &InMemoryTaskState,
    task: &Task,
    expected_revision: u64,
) -> TaskRepositoryResult<()> {
    let stored = state
        .tasks
        .get(&task.id())
        .ok_or(TaskRepositoryError::NotFound(task.id()))?;
    if stored.revision() != expected_revision {
        return Err(TaskRepositoryError::RevisionMismatch {
            task_id: task.id(),
            expected: expected_revision,
            actual: stored.revision(),
        });
    }
    Ok(())
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn next_id(&self) -> TaskRepositoryResult<TaskId> {
        let mut state = self.write()?;
        state.last_id = state.last_id.saturating_add(1);
        Ok(TaskId::new(state.last_id))
    }

    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        if state.tasks.contains_key(&task.id()) {
            return Err(TaskRepositoryError::DuplicateTask(task.id()));
        }
        state.last_id = state.last_id.max(task.id().value());
        state.tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn update(&self, task: &Task, expected_revision: u64) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        check_revision(&state, task, expected_revision)?;
        state.tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        let state = self.read()?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn find_by_status(&self, status: TaskStatus) -> TaskRepositoryResult<Vec<Task>> {
        self.collect_tasks(|task| task.status() == status)
    }

    async fn find_by_assignee(&self, user: UserId) -> TaskRepositoryResult<Vec<Task>> {
        self.collect_tasks(|task| task.assignees().contains(&user))
    }

    async fn find_by_department(
        &self,
        department: DepartmentId,
    ) -> TaskRepositoryResult<Vec<Task>> {
        self.collect_tasks(|task| task.departments().contains(&department))
    }

    async fn find_starting_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> TaskRepositoryResult<Vec<Task>> {
        self.collect_tasks(|task| {
            is_scannable(task) && task.start_date() >= from && task.start_date() < until
        })
    }

    async fn find_due_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> TaskRepositoryResult<Vec<Task>> {
        self.collect_tasks(|task| {
            is_scannable(task) && task.due_date() >= from && task.due_date() < until
        })
    }

    async fn find_overdue(&self, before: DateTime<Utc>) -> TaskRepositoryResult<Vec<Task>> {
        self.collect_tasks(|task| is_scannable(task) && task.due_date() < before)
    }

    async fn store_request(
        &self,
        task: &Task,
        expected_revision: u64,
        request: &TaskRequest,
        proofs: &[Proof],
    ) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        check_revision(&state, task, expected_revision)?;

        let has_pending = state
            .request_index
            .get(&task.id())
            .into_iter()
            .flatten()
            .filter_map(|id| state.requests.get(id))
            .any(TaskRequest::is_pending);
        if has_pending {
            return Err(TaskRepositoryError::PendingRequestExists(task.id()));
        }

        state.tasks.insert(task.id(), task.clone());
        state.requests.insert(request.id(), request.clone());
        state
            .request_index
            .entry(task.id())
            .or_default()
            .push(request.id());
        state.proofs.insert(request.id(), proofs.to_vec());
        Ok(())
    }

    async fn resolve_request(
        &self,
        task: &Task,
        expected_revision: u64,
        request: &TaskRequest,
    ) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        let stored = state
            .requests
            .get(&request.id())
            .ok_or(TaskRepositoryError::RequestNotFound(request.id()))?;
        if !stored.is_pending() {
            return Err(TaskRepositoryError::RequestNotPending(request.id()));
        }
        check_revision(&state, task, expected_revision)?;

        state.tasks.insert(task.id(), task.clone());
        state.requests.insert(request.id(), request.clone());
        Ok(())
    }

    async fn find_request(&self, id: TaskRequestId) -> TaskRepositoryResult<Option<TaskRequest>> {
        let state = self.read()?;
        Ok(state.requests.get(&id).cloned())
    }

    async fn find_pending_request(
        &self,
        task_id: TaskId,
    ) -> TaskRepositoryResult<Option<TaskRequest>> {
        let state = self.read()?;
        let pending = state
            .request_index
            .get(&task_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.requests.get(id))
            .find(|request| request.is_pending())
            .cloned();
        Ok(pending)
    }

    async fn list_requests(&self, task_id: TaskId) -> TaskRepositoryResult<Vec<TaskRequest>> {
        let state = self.read()?;
        let requests = state
            .request_index
            .get(&task_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.requests.get(id).cloned())
            .collect();
        Ok(requests)
    }

    async fn list_proofs(&self, request_id: TaskRequestId) -> TaskRepositoryResult<Vec<Proof>> {
        let state = self.read()?;
        Ok(state.proofs.get(&request_id).cloned().unwrap_or_default())
    }
}
