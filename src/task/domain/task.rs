//! Task aggregate root and the lifecycle state machine.

use super::{DepartmentId, ParseTaskEnumError, RequestType, TaskDomainError, TaskId, UserId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Task is open and within its schedule.
    Pending,
    /// Task has been scheduled but work has not started.
    Upcoming,
    /// Task is past its due date.
    Delayed,
    /// A closure request is awaiting approval.
    RequestForClosure,
    /// An extension request is awaiting approval.
    RequestForExtension,
    /// The due date has been extended by an approved request.
    Extended,
    /// Task has been closed through an approved closure request.
    Closed,
}

impl TaskStatus {
    /// Every status, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Upcoming,
        Self::Delayed,
        Self::RequestForClosure,
        Self::RequestForExtension,
        Self::Extended,
        Self::Closed,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Upcoming => "UPCOMING",
            Self::Delayed => "DELAYED",
            Self::RequestForClosure => "REQUEST_FOR_CLOSURE",
            Self::RequestForExtension => "REQUEST_FOR_EXTENSION",
            Self::Extended => "EXTENDED",
            Self::Closed => "CLOSED",
        }
    }

    /// Returns `true` when no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns `true` while a closure or extension request is pending.
    #[must_use]
    pub const fn is_request_state(self) -> bool {
        matches!(self, Self::RequestForClosure | Self::RequestForExtension)
    }

    /// Returns `true` for states a request may be raised from.
    #[must_use]
    pub const fn accepts_requests(self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Upcoming | Self::Delayed | Self::Extended
        )
    }

    /// Returns `true` for states a new task may start in.
    #[must_use]
    pub const fn is_valid_initial(self) -> bool {
        self.accepts_requests()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskEnumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| ParseTaskEnumError::new("task status", value))
    }
}

/// Parameter object for creating a new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    /// Short task title.
    pub title: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Scheduled start.
    pub start_date: DateTime<Utc>,
    /// Required due date.
    pub due_date: DateTime<Utc>,
    /// Initial status, `PENDING` when not supplied.
    pub status: Option<TaskStatus>,
    /// Creating user.
    pub created_by: UserId,
    /// Users assigned to the task.
    pub assignees: BTreeSet<UserId>,
    /// Departments the task belongs to.
    pub departments: BTreeSet<DepartmentId>,
    /// Whether the task itself needs sign-off.
    pub requires_approval: bool,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted title.
    pub title: String,
    /// Persisted description.
    pub description: Option<String>,
    /// Persisted start date.
    pub start_date: DateTime<Utc>,
    /// Persisted due date.
    pub due_date: DateTime<Utc>,
    /// Persisted status.
    pub status: TaskStatus,
    /// Status restored when a pending request is rejected.
    pub prior_status: Option<TaskStatus>,
    /// Persisted creator.
    pub created_by: UserId,
    /// Persisted assignees.
    pub assignees: BTreeSet<UserId>,
    /// Persisted departments.
    pub departments: BTreeSet<DepartmentId>,
    /// Persisted approval requirement.
    pub requires_approval: bool,
    /// Persisted approval flag.
    pub approved: bool,
    /// Persisted closure timestamp.
    pub rfc_completed_at: Option<DateTime<Utc>>,
    /// Persisted soft-deactivation flag.
    pub active: bool,
    /// Persisted optimistic concurrency revision.
    pub revision: u64,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Task aggregate root.
///
/// The status field is private: every change goes through one of the
/// transition methods, each of which either applies fully or returns an
/// error without touching the task. Stored tasks are rebuilt with
/// [`Task::from_persisted`]; there is no deserialiser that could produce an
/// arbitrary status.
///
/// ```compile_fail
/// fn decodable<T: serde::de::DeserializeOwned>() {}
/// decodable::<taskwarden::task::domain::Task>();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    id: TaskId,
    title: String,
    description: Option<String>,
    start_date: DateTime<Utc>,
    due_date: DateTime<Utc>,
    status: TaskStatus,
    prior_status: Option<TaskStatus>,
    created_by: UserId,
    assignees: BTreeSet<UserId>,
    departments: BTreeSet<DepartmentId>,
    requires_approval: bool,
    approved: bool,
    rfc_completed_at: Option<DateTime<Utc>>,
    active: bool,
    revision: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new task with a store-allocated identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`], [`TaskDomainError::DueBeforeStart`]
    /// or [`TaskDomainError::InvalidInitialStatus`] when the input is invalid.
    pub fn new(id: TaskId, input: NewTask, clock: &impl Clock) -> Result<Self, TaskDomainError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(TaskDomainError::EmptyTitle);
        }
        if input.due_date < input.start_date {
            return Err(TaskDomainError::DueBeforeStart {
                start_date: input.start_date,
                due_date: input.due_date,
            });
        }
        let status = input.status.unwrap_or(TaskStatus::Pending);
        if !status.is_valid_initial() {
            return Err(TaskDomainError::InvalidInitialStatus(status));
        }

        let timestamp = clock.utc();
        Ok(Self {
            id,
            title: title.to_owned(),
            description: input.description,
            start_date: input.start_date,
            due_date: input.due_date,
            status,
            prior_status: None,
            created_by: input.created_by,
            assignees: input.assignees,
            departments: input.departments,
            requires_approval: input.requires_approval,
            approved: false,
            rfc_completed_at: None,
            active: true,
            revision: 0,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            title: data.title,
            description: data.description,
            start_date: data.start_date,
            due_date: data.due_date,
            status: data.status,
            prior_status: data.prior_status,
            created_by: data.created_by,
            assignees: data.assignees,
            departments: data.departments,
            requires_approval: data.requires_approval,
            approved: data.approved,
            rfc_completed_at: data.rfc_completed_at,
            active: data.active,
            revision: data.revision,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the task title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the task description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the scheduled start.
    #[must_use]
    pub const fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    /// Returns the current due date.
    #[must_use]
    pub const fn due_date(&self) -> DateTime<Utc> {
        self.due_date
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the status restored if the pending request is rejected.
    #[must_use]
    pub const fn prior_status(&self) -> Option<TaskStatus> {
        self.prior_status
    }

    /// Returns the creating user.
    #[must_use]
    pub const fn created_by(&self) -> UserId {
        self.created_by
    }

    /// Returns the assigned users.
    #[must_use]
    pub const fn assignees(&self) -> &BTreeSet<UserId> {
        &self.assignees
    }

    /// Returns the linked departments.
    #[must_use]
    pub const fn departments(&self) -> &BTreeSet<DepartmentId> {
        &self.departments
    }

    /// Returns whether the task needs sign-off.
    #[must_use]
    pub const fn requires_approval(&self) -> bool {
        self.requires_approval
    }

    /// Returns whether the task has been signed off.
    #[must_use]
    pub const fn approved(&self) -> bool {
        self.approved
    }

    /// Returns when the closure request was approved.
    #[must_use]
    pub const fn rfc_completed_at(&self) -> Option<DateTime<Utc>> {
        self.rfc_completed_at
    }

    /// Returns `false` once the task has been soft-deactivated.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Returns the optimistic concurrency revision.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest mutation timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns `true` when the user is the creator or an assignee.
    #[must_use]
    pub fn is_held_by(&self, user: UserId) -> bool {
        self.created_by == user || self.assignees.contains(&user)
    }

    /// Returns `true` when the due date lies before `now` and the task is
    /// still open.
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && self.due_date < now
    }

    /// Moves an open task past its due date to `DELAYED`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] when the task is
    /// not overdue or is in a state the sweep must not touch (delayed, a
    /// request state, or closed).
    pub fn mark_delayed(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        let now = clock.utc();
        let eligible = matches!(
            self.status,
            TaskStatus::Pending | TaskStatus::Upcoming | TaskStatus::Extended
        );
        if !eligible || !self.is_overdue(now) {
            return Err(self.invalid_transition(TaskStatus::Delayed));
        }
        self.status = TaskStatus::Delayed;
        self.touch(clock);
        Ok(())
    }

    /// Enters the request state matching `kind`, remembering the current
    /// status so a rejection can restore it.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] when the task is
    /// closed or already has a pending request.
    pub fn open_request(
        &mut self,
        kind: RequestType,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        let target = kind.pending_status();
        if !self.status.accepts_requests() {
            return Err(self.invalid_transition(target));
        }
        self.prior_status = Some(self.status);
        self.status = target;
        self.touch(clock);
        Ok(())
    }

    /// Closes the task after its closure request was approved.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] unless the task is
    /// in `REQUEST_FOR_CLOSURE`.
    pub fn approve_closure(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        if self.status != TaskStatus::RequestForClosure {
            return Err(self.invalid_transition(TaskStatus::Closed));
        }
        let now = clock.utc();
        self.status = TaskStatus::Closed;
        self.prior_status = None;
        self.rfc_completed_at = Some(now);
        self.touch(clock);
        Ok(())
    }

    /// Extends the due date after an extension request was approved.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] unless the task is
    /// in `REQUEST_FOR_EXTENSION`, or [`TaskDomainError::DueDateNotInFuture`]
    /// when `new_due_date` is not strictly after the current time.
    pub fn approve_extension(
        &mut self,
        new_due_date: DateTime<Utc>,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        if self.status != TaskStatus::RequestForExtension {
            return Err(self.invalid_transition(TaskStatus::Extended));
        }
        if new_due_date <= clock.utc() {
            return Err(TaskDomainError::DueDateNotInFuture {
                task_id: self.id,
                due_date: new_due_date,
            });
        }
        self.status = TaskStatus::Extended;
        self.prior_status = None;
        self.due_date = new_due_date;
        self.touch(clock);
        Ok(())
    }

    /// Restores the status held before the pending request was raised.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] when no request is
    /// pending.
    pub fn revert_request(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        let restored = self.prior_status.unwrap_or(TaskStatus::Pending);
        if !self.status.is_request_state() {
            return Err(self.invalid_transition(restored));
        }
        self.status = restored;
        self.prior_status = None;
        self.touch(clock);
        Ok(())
    }

    /// Adds users to the assignee set, returning those newly added.
    pub fn assign(
        &mut self,
        users: impl IntoIterator<Item = UserId>,
        clock: &impl Clock,
    ) -> BTreeSet<UserId> {
        let added: BTreeSet<UserId> = users
            .into_iter()
            .filter(|user| self.assignees.insert(*user))
            .collect();
        if !added.is_empty() {
            self.touch(clock);
        }
        added
    }

    /// Soft-deactivates the task. Deactivated tasks are skipped by reminder
    /// scans and reject new requests.
    pub fn deactivate(&mut self, clock: &impl Clock) {
        if self.active {
            self.active = false;
            self.touch(clock);
        }
    }

    const fn invalid_transition(&self, to: TaskStatus) -> TaskDomainError {
        TaskDomainError::InvalidStateTransition {
            task_id: self.id,
            from: self.status,
            to,
        }
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
        self.revision = self.revision.saturating_add(1);
    }
}
