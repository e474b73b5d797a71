//! Service layer for task creation, assignment and the overdue sweep.

use crate::error::ErrorKind;
use crate::notification::ports::{EventDelivery, EventSink};
use crate::task::{
    domain::{
        Actor, DepartmentId, NewTask, Task, TaskDomainError, TaskId, TaskStatus, UserId,
    },
    ports::{TaskRepository, TaskRepositoryError},
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mockable::Clock;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::events::{WorkflowOutcome, assignment_event, delayed_event, emit};
use super::schedule::{JobError, ScheduledJob};

/// Request payload for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTask {
    creator: Actor,
    title: String,
    description: Option<String>,
    start_date: DateTime<Utc>,
    due_date: DateTime<Utc>,
    status: Option<TaskStatus>,
    assignees: BTreeSet<UserId>,
    departments: BTreeSet<DepartmentId>,
    requires_approval: bool,
}

impl CreateTask {
    /// Creates a request with the required fields.
    #[must_use]
    pub fn new(
        creator: Actor,
        title: impl Into<String>,
        start_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> Self {
        Self {
            creator,
            title: title.into(),
            description: None,
            start_date,
            due_date,
            status: None,
            assignees: BTreeSet::new(),
            departments: BTreeSet::new(),
            requires_approval: false,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the initial status.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the assignees.
    #[must_use]
    pub fn with_assignees(mut self, assignees: impl IntoIterator<Item = UserId>) -> Self {
        self.assignees = assignees.into_iter().collect();
        self
    }

    /// Sets the departments.
    #[must_use]
    pub fn with_departments(mut self, departments: impl IntoIterator<Item = DepartmentId>) -> Self {
        self.departments = departments.into_iter().collect();
        self
    }

    /// Marks the task as needing sign-off.
    #[must_use]
    pub const fn requiring_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }
}

/// Service-level errors for task lifecycle operations.
#[derive(Debug, Clone, Error)]
pub enum TaskLifecycleError {
    /// Domain validation or a state transition failed.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),

    /// The task does not exist.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The actor may not change this task.
    #[error("user {user_id} may not modify task {task_id}")]
    Forbidden {
        /// Task being modified.
        task_id: TaskId,
        /// Acting user.
        user_id: UserId,
    },

    /// The task has been deactivated.
    #[error("task {0} is inactive")]
    Inactive(TaskId),

    /// The task has a pending request.
    #[error("task {0} has a pending request")]
    PendingRequest(TaskId),
}

impl TaskLifecycleError {
    /// Returns the caller-facing error category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(TaskDomainError::InvalidStateTransition { .. }) => {
                ErrorKind::InvalidStateTransition
            }
            Self::Domain(TaskDomainError::DueDateNotInFuture { .. }) => ErrorKind::InvalidArgument,
            Self::Domain(_) => ErrorKind::Validation,
            Self::Repository(TaskRepositoryError::NotFound(_)) | Self::NotFound(_) => {
                ErrorKind::NotFound
            }
            Self::Repository(err) if err.is_conflict() => ErrorKind::Conflict,
            Self::Repository(_) => ErrorKind::Internal,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::Inactive(_) | Self::PendingRequest(_) => ErrorKind::Conflict,
        }
    }
}

/// Result type for task lifecycle service operations.
pub type TaskLifecycleResult<T> = Result<T, TaskLifecycleError>;

/// Outcome of [`TaskLifecycleService::flag_overdue_tasks`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverdueSweep {
    /// Tasks moved to `DELAYED`.
    pub delayed: Vec<TaskId>,
    /// Overdue tasks left alone because of their status.
    pub skipped: usize,
    /// Tasks whose update failed.
    pub failed: usize,
    /// Events that were deferred or lost.
    pub undelivered: usize,
}

/// Task lifecycle orchestration service.
#[derive(Clone)]
pub struct TaskLifecycleService<R, E, C>
where
    R: TaskRepository,
    E: EventSink,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    events: Arc<E>,
    clock: Arc<C>,
}

impl<R, E, C> TaskLifecycleService<R, E, C>
where
    R: TaskRepository,
    E: EventSink,
    C: Clock + Send + Sync,
{
    /// Creates a new task lifecycle service.
    #[must_use]
    pub const fn new(repository: Arc<R>, events: Arc<E>, clock: Arc<C>) -> Self {
        Self {
            repository,
            events,
            clock,
        }
    }

    /// Creates a task and announces it to its assignees.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Domain`] for invalid input or
    /// [`TaskLifecycleError::Repository`] when persistence fails.
    pub async fn create_task(
        &self,
        request: CreateTask,
    ) -> TaskLifecycleResult<WorkflowOutcome<Task>> {
        let id = self.repository.next_id().await?;
        let _turn = self.events.acquire_turn(id).await;
        let task = Task::new(
            id,
            NewTask {
                title: request.title,
                description: request.description,
                start_date: request.start_date,
                due_date: request.due_date,
                status: request.status,
                created_by: request.creator.id(),
                assignees: request.assignees,
                departments: request.departments,
                requires_approval: request.requires_approval,
            },
            &*self.clock,
        )?;
        self.repository.store(&task).await?;
        info!(task_id = %task.id(), status = %task.status(), "task created");

        let delivery = if task.assignees().is_empty() {
            EventDelivery::Published
        } else {
            emit(&*self.events, &assignment_event(&task, &*self.clock)).await
        };
        Ok(WorkflowOutcome::new(task, delivery))
    }

    /// Adds assignees to a task.
    ///
    /// Users already assigned are ignored; when nobody new is added the task
    /// is left untouched and no event is raised.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Forbidden`] unless the actor holds the
    /// task or is an admin, [`TaskLifecycleError::Inactive`] for deactivated
    /// tasks, and a conflict when the task changed concurrently.
    pub async fn assign_users(
        &self,
        task_id: TaskId,
        users: impl IntoIterator<Item = UserId> + Send,
        actor: Actor,
    ) -> TaskLifecycleResult<WorkflowOutcome<BTreeSet<UserId>>> {
        let _turn = self.events.acquire_turn(task_id).await;
        let mut task = self.load(task_id).await?;
        ensure_may_modify(&task, actor)?;
        if !task.is_active() {
            return Err(TaskLifecycleError::Inactive(task_id));
        }

        let expected_revision = task.revision();
        let added = task.assign(users, &*self.clock);
        if added.is_empty() {
            return Ok(WorkflowOutcome::new(added, EventDelivery::Published));
        }
        self.repository.update(&task, expected_revision).await?;
        info!(task_id = %task_id, added = added.len(), "users assigned");

        let event = assignment_event(&task, &*self.clock).with_recipients(added.iter().copied());
        let delivery = emit(&*self.events, &event).await;
        Ok(WorkflowOutcome::new(added, delivery))
    }

    /// Retrieves a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] for unknown tasks.
    pub async fn find_task(&self, task_id: TaskId) -> TaskLifecycleResult<Task> {
        self.load(task_id).await
    }

    /// Lists tasks assigned to `user`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when the lookup fails.
    pub async fn tasks_assigned_to(&self, user: UserId) -> TaskLifecycleResult<Vec<Task>> {
        Ok(self.repository.find_by_assignee(user).await?)
    }

    /// Lists tasks of a department.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when the lookup fails.
    pub async fn tasks_of_department(
        &self,
        department: DepartmentId,
    ) -> TaskLifecycleResult<Vec<Task>> {
        Ok(self.repository.find_by_department(department).await?)
    }

    /// Lists tasks in `status`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when the lookup fails.
    pub async fn tasks_in_status(&self, status: TaskStatus) -> TaskLifecycleResult<Vec<Task>> {
        Ok(self.repository.find_by_status(status).await?)
    }

    /// Soft-deactivates a task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Forbidden`] unless the actor created the
    /// task or is an admin, and [`TaskLifecycleError::PendingRequest`] while
    /// a request awaits a decision.
    pub async fn deactivate_task(&self, task_id: TaskId, actor: Actor) -> TaskLifecycleResult<Task> {
        let mut task = self.load(task_id).await?;
        if !actor.role().may_act_on_any_task() && task.created_by() != actor.id() {
            return Err(TaskLifecycleError::Forbidden {
                task_id,
                user_id: actor.id(),
            });
        }
        if task.status().is_request_state() {
            return Err(TaskLifecycleError::PendingRequest(task_id));
        }
        let expected_revision = task.revision();
        task.deactivate(&*self.clock);
        if task.revision() != expected_revision {
            self.repository.update(&task, expected_revision).await?;
            info!(task_id = %task_id, "task deactivated");
        }
        Ok(task)
    }

    /// Moves every eligible overdue task to `DELAYED` and announces it.
    ///
    /// Each candidate is re-read under its publish turn. Tasks in a request
    /// state or already delayed are skipped. A failed update is logged and
    /// counted without stopping the sweep.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when the overdue scan
    /// itself fails.
    pub async fn flag_overdue_tasks(&self) -> TaskLifecycleResult<OverdueSweep> {
        let now = self.clock.utc();
        let candidates = self.repository.find_overdue(now).await?;
        let mut sweep = OverdueSweep::default();

        for candidate in candidates {
            let _turn = self.events.acquire_turn(candidate.id()).await;
            let mut task = match self.repository.find_by_id(candidate.id()).await {
                Ok(Some(current)) => current,
                Ok(None) => continue,
                Err(err) => {
                    warn!(task_id = %candidate.id(), error = %err, "failed to reload overdue task");
                    sweep.failed = sweep.failed.saturating_add(1);
                    continue;
                }
            };
            let expected_revision = task.revision();
            if let Err(err) = task.mark_delayed(&*self.clock) {
                debug!(task_id = %task.id(), status = %task.status(), error = %err, "overdue task skipped");
                sweep.skipped = sweep.skipped.saturating_add(1);
                continue;
            }
            if let Err(err) = self.repository.update(&task, expected_revision).await {
                warn!(task_id = %task.id(), error = %err, "failed to flag overdue task");
                sweep.failed = sweep.failed.saturating_add(1);
                continue;
            }
            let delivery = emit(&*self.events, &delayed_event(&task, &*self.clock)).await;
            if delivery != EventDelivery::Published {
                sweep.undelivered = sweep.undelivered.saturating_add(1);
            }
            sweep.delayed.push(task.id());
        }

        if !sweep.delayed.is_empty() {
            info!(delayed = sweep.delayed.len(), "overdue tasks flagged");
        }
        Ok(sweep)
    }

    async fn load(&self, task_id: TaskId) -> TaskLifecycleResult<Task> {
        self.repository
            .find_by_id(task_id)
            .await?
            .ok_or(TaskLifecycleError::NotFound(task_id))
    }
}

fn ensure_may_modify(task: &Task, actor: Actor) -> TaskLifecycleResult<()> {
    if actor.role().may_act_on_any_task() || task.is_held_by(actor.id()) {
        return Ok(());
    }
    Err(TaskLifecycleError::Forbidden {
        task_id: task.id(),
        user_id: actor.id(),
    })
}

#[async_trait]
impl<R, E, C> ScheduledJob for TaskLifecycleService<R, E, C>
where
    R: TaskRepository,
    E: EventSink,
    C: Clock + Send + Sync,
{
    fn name(&self) -> &'static str {
        "overdue-sweep"
    }

    async fn run(&self, _today: NaiveDate) -> Result<(), JobError> {
        self.flag_overdue_tasks()
            .await
            .map(|_| ())
            .map_err(|err| JobError::new(self.name(), &err))
    }
}
