//! Closure and extension request workflow.
//!
//! Each operation validates its input, applies the request and task changes
//! through one conditional repository write, and only then raises its event.
//! When the write fails nothing is published.

use chrono::{DateTime, Utc};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::events::{WorkflowOutcome, emit, request_event};
use crate::error::ErrorKind;
use crate::notification::{
    domain::EventType,
    ports::{EventDelivery, EventSink, PublishTurn},
};
use crate::task::{
    domain::{
        Actor, Proof, ProofFile, ProofId, RequestDomainError, RequestParams, RequestType,
        StoredProof, Task, TaskDomainError, TaskId, TaskRequest, TaskRequestId, UserId,
    },
    ports::{
        DirectoryError, DirectoryPort, EmailMessage, EmailNotifier, ProofStorage,
        ProofStorageError, TaskRepository, TaskRepositoryError,
    },
};

/// Payload for raising a closure or extension request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    task_id: TaskId,
    request_type: RequestType,
    requester: Actor,
    remarks: Option<String>,
    requested_due_date: Option<DateTime<Utc>>,
    proofs: Vec<ProofFile>,
}

impl CreateTaskRequest {
    /// Starts a closure request.
    #[must_use]
    pub const fn closure(task_id: TaskId, requester: Actor) -> Self {
        Self::new(task_id, RequestType::Closure, requester)
    }

    /// Starts an extension request with the mandatory remarks.
    #[must_use]
    pub fn extension(task_id: TaskId, requester: Actor, remarks: impl Into<String>) -> Self {
        Self::new(task_id, RequestType::Extension, requester).with_remarks(remarks)
    }

    /// Starts a request of the given kind.
    #[must_use]
    pub const fn new(task_id: TaskId, request_type: RequestType, requester: Actor) -> Self {
        Self {
            task_id,
            request_type,
            requester,
            remarks: None,
            requested_due_date: None,
            proofs: Vec::new(),
        }
    }

    /// Sets the remarks.
    #[must_use]
    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }

    /// Proposes a new due date for an extension.
    #[must_use]
    pub const fn with_requested_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.requested_due_date = Some(due_date);
        self
    }

    /// Attaches a proof file.
    #[must_use]
    pub fn with_proof(mut self, proof: ProofFile) -> Self {
        self.proofs.push(proof);
        self
    }
}

/// Payload for approving a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApproveTaskRequest {
    request_id: TaskRequestId,
    approver: Actor,
    new_due_date: Option<DateTime<Utc>>,
}

impl ApproveTaskRequest {
    /// Creates an approval.
    #[must_use]
    pub const fn new(request_id: TaskRequestId, approver: Actor) -> Self {
        Self {
            request_id,
            approver,
            new_due_date: None,
        }
    }

    /// Sets the approved due date of an extension.
    #[must_use]
    pub const fn with_new_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.new_due_date = Some(due_date);
        self
    }
}

/// Payload for rejecting a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectTaskRequest {
    request_id: TaskRequestId,
    approver: Actor,
    reason: String,
}

impl RejectTaskRequest {
    /// Creates a rejection.
    #[must_use]
    pub fn new(request_id: TaskRequestId, approver: Actor, reason: impl Into<String>) -> Self {
        Self {
            request_id,
            approver,
            reason: reason.into(),
        }
    }
}

/// Service-level errors for the request workflow.
#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    /// The request breaks a request rule.
    #[error(transparent)]
    Request(#[from] RequestDomainError),

    /// The task rejected the transition or the new due date.
    #[error(transparent)]
    Task(#[from] TaskDomainError),

    /// The task does not exist.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// The request does not exist.
    #[error("task request not found: {0}")]
    RequestNotFound(TaskRequestId),

    /// The acting user is unknown to the directory.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// The requester neither holds the task nor may act on any task.
    #[error("user {user_id} does not hold task {task_id}")]
    NotTaskHolder {
        /// Task the request targets.
        task_id: TaskId,
        /// Requesting user.
        user_id: UserId,
    },

    /// The task has been deactivated.
    #[error("task {0} is inactive")]
    TaskInactive(TaskId),

    /// The task already has a pending request.
    #[error("task {0} already has a pending request")]
    PendingRequestExists(TaskId),

    /// Proof storage refused a file.
    #[error(transparent)]
    ProofStorage(#[from] ProofStorageError),

    /// Directory lookup failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
}

impl WorkflowError {
    /// Returns the caller-facing error category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Request(RequestDomainError::SelfApproval { .. }) | Self::NotTaskHolder { .. } => {
                ErrorKind::Forbidden
            }
            Self::Request(RequestDomainError::AlreadyResolved { .. })
            | Self::TaskInactive(_)
            | Self::PendingRequestExists(_) => ErrorKind::Conflict,
            Self::Request(_)
            | Self::Task(TaskDomainError::DueDateNotInFuture { .. })
            | Self::ProofStorage(ProofStorageError::Rejected { .. }) => ErrorKind::Validation,
            Self::Task(TaskDomainError::InvalidStateTransition { .. }) => {
                ErrorKind::InvalidStateTransition
            }
            Self::Task(_) => ErrorKind::InvalidArgument,
            Self::TaskNotFound(_)
            | Self::RequestNotFound(_)
            | Self::UserNotFound(_)
            | Self::Repository(
                TaskRepositoryError::NotFound(_) | TaskRepositoryError::RequestNotFound(_),
            ) => ErrorKind::NotFound,
            Self::Repository(err) if err.is_conflict() => ErrorKind::Conflict,
            Self::Repository(_)
            | Self::Directory(_)
            | Self::ProofStorage(ProofStorageError::Unavailable(_)) => ErrorKind::Internal,
        }
    }
}

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Orchestrates closure and extension requests.
#[derive(Clone)]
pub struct TaskRequestWorkflow<R, D, S, E, C>
where
    R: TaskRepository,
    D: DirectoryPort,
    S: ProofStorage,
    E: EventSink,
    C: Clock + Send + Sync,
{
    tasks: Arc<R>,
    directory: Arc<D>,
    proofs: Arc<S>,
    events: Arc<E>,
    clock: Arc<C>,
    email: Option<Arc<dyn EmailNotifier>>,
}

impl<R, D, S, E, C> TaskRequestWorkflow<R, D, S, E, C>
where
    R: TaskRepository,
    D: DirectoryPort + 'static,
    S: ProofStorage,
    E: EventSink,
    C: Clock + Send + Sync,
{
    /// Creates a workflow service without email notification.
    #[must_use]
    pub const fn new(
        tasks: Arc<R>,
        directory: Arc<D>,
        proofs: Arc<S>,
        events: Arc<E>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            tasks,
            directory,
            proofs,
            events,
            clock,
            email: None,
        }
    }

    /// Also emails the requester when a request is resolved.
    #[must_use]
    pub fn with_email(mut self, email: Arc<dyn EmailNotifier>) -> Self {
        self.email = Some(email);
        self
    }

    /// Raises a closure or extension request.
    ///
    /// Proof files go to proof storage first; only their locators are
    /// persisted, and the files are removed again if the write fails. The
    /// request, its proofs and the task's move into the matching request
    /// state are written as one unit, after which a `REQUEST_CREATED` event
    /// is raised. The task's publish turn is held from the read until the
    /// event is handed over.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a closure without proofs or an
    /// extension without remarks, [`WorkflowError::TaskNotFound`],
    /// [`WorkflowError::NotTaskHolder`], and a conflict when the task is
    /// inactive, already has a pending request or changed concurrently.
    pub async fn create_request(
        &self,
        request: CreateTaskRequest,
    ) -> WorkflowResult<WorkflowOutcome<TaskRequest>> {
        let CreateTaskRequest {
            task_id,
            request_type,
            requester,
            remarks,
            requested_due_date,
            proofs: files,
        } = request;
        let params = RequestParams {
            task_id,
            request_type,
            requester: requester.id(),
            remarks,
            requested_due_date,
        };
        TaskRequest::validate(&params, files.len())?;

        let _turn = self.events.acquire_turn(task_id).await;
        let mut task = self.load_task(task_id).await?;
        if !task.is_active() {
            return Err(WorkflowError::TaskInactive(task_id));
        }
        if !requester.role().may_act_on_any_task() && !task.is_held_by(requester.id()) {
            return Err(WorkflowError::NotTaskHolder {
                task_id,
                user_id: requester.id(),
            });
        }
        if task.status().is_request_state() {
            return Err(WorkflowError::PendingRequestExists(task_id));
        }

        let expected_revision = task.revision();
        task.open_request(request_type, &*self.clock)?;

        let stored = self.store_proofs(&files).await?;
        let proof_ids = stored.iter().map(|(id, _)| *id).collect();
        let task_request = match TaskRequest::open(params, proof_ids, &*self.clock) {
            Ok(task_request) => task_request,
            Err(err) => {
                self.discard_proofs(&stored).await;
                return Err(err.into());
            }
        };
        let proofs: Vec<Proof> = stored
            .iter()
            .map(|(id, locator)| {
                Proof::new(
                    *id,
                    task_request.id(),
                    task_id,
                    locator.clone(),
                    requester.id(),
                    &*self.clock,
                )
            })
            .collect();

        if let Err(err) = self
            .tasks
            .store_request(&task, expected_revision, &task_request, &proofs)
            .await
        {
            self.discard_proofs(&stored).await;
            return Err(pending_conflict(err, task_id));
        }
        info!(
            task_id = %task_id,
            request_id = %task_request.id(),
            request_type = %request_type,
            proofs = proofs.len(),
            "task request created"
        );

        let message = format!(
            "{} request raised for task \"{}\"",
            capitalised(request_type),
            task.title()
        );
        let event = request_event(
            EventType::RequestCreated,
            &task,
            &task_request,
            message,
            &*self.clock,
        );
        let delivery = emit(&*self.events, &event).await;
        Ok(WorkflowOutcome::new(task_request, delivery))
    }

    /// Approves a pending request.
    ///
    /// A closure approval closes the task. An extension approval moves it to
    /// `EXTENDED` with the due date supplied by the approver; the date the
    /// requester proposed is advisory only.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for unknown requests, tasks or approvers,
    /// [`RequestDomainError::SelfApproval`] when the approver raised the
    /// request, a validation error for a missing or past due date, and a
    /// conflict when the request is resolved or the task changed.
    pub async fn approve(
        &self,
        approval: ApproveTaskRequest,
    ) -> WorkflowResult<WorkflowOutcome<TaskRequest>> {
        let _turn = self.turn_for_request(approval.request_id).await?;
        let (mut request, mut task) = self
            .load_resolvable(approval.request_id, approval.approver)
            .await?;
        let expected_revision = task.revision();

        match request.request_type() {
            RequestType::Closure => task.approve_closure(&*self.clock)?,
            RequestType::Extension => {
                let new_due_date = approval
                    .new_due_date
                    .ok_or(RequestDomainError::MissingDueDate)?;
                task.approve_extension(new_due_date, &*self.clock)?;
            }
        }
        request.approve(approval.approver.id(), &*self.clock)?;

        self.tasks
            .resolve_request(&task, expected_revision, &request)
            .await?;
        info!(
            task_id = %task.id(),
            request_id = %request.id(),
            status = %task.status(),
            "task request approved"
        );

        let message = format!(
            "{} request for task \"{}\" was approved",
            capitalised(request.request_type()),
            task.title()
        );
        let delivery = self
            .announce_resolution(EventType::RequestApproved, &task, &request, message)
            .await;
        Ok(WorkflowOutcome::new(request, delivery))
    }

    /// Rejects a pending request and restores the task's earlier status.
    ///
    /// # Errors
    ///
    /// Returns [`RequestDomainError::BlankReason`] for an empty reason, plus
    /// the not-found, self-approval and conflict errors of
    /// [`TaskRequestWorkflow::approve`].
    pub async fn reject(
        &self,
        rejection: RejectTaskRequest,
    ) -> WorkflowResult<WorkflowOutcome<TaskRequest>> {
        if rejection.reason.trim().is_empty() {
            return Err(RequestDomainError::BlankReason.into());
        }
        let _turn = self.turn_for_request(rejection.request_id).await?;
        let (mut request, mut task) = self
            .load_resolvable(rejection.request_id, rejection.approver)
            .await?;
        let expected_revision = task.revision();

        task.revert_request(&*self.clock)?;
        request.reject(rejection.approver.id(), &rejection.reason, &*self.clock)?;

        self.tasks
            .resolve_request(&task, expected_revision, &request)
            .await?;
        info!(
            task_id = %task.id(),
            request_id = %request.id(),
            status = %task.status(),
            "task request rejected"
        );

        let message = format!(
            "{} request for task \"{}\" was rejected: {}",
            capitalised(request.request_type()),
            task.title(),
            rejection.reason.trim()
        );
        let delivery = self
            .announce_resolution(EventType::RequestRejected, &task, &request, message)
            .await;
        Ok(WorkflowOutcome::new(request, delivery))
    }

    /// Finds a request by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::RequestNotFound`] for unknown requests.
    pub async fn find_request(&self, request_id: TaskRequestId) -> WorkflowResult<TaskRequest> {
        self.tasks
            .find_request(request_id)
            .await?
            .ok_or(WorkflowError::RequestNotFound(request_id))
    }

    /// Lists every request raised against a task, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::TaskNotFound`] for unknown tasks.
    pub async fn list_requests(&self, task_id: TaskId) -> WorkflowResult<Vec<TaskRequest>> {
        self.load_task(task_id).await?;
        Ok(self.tasks.list_requests(task_id).await?)
    }

    /// Lists the proofs attached to a request in upload order.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::RequestNotFound`] for unknown requests.
    pub async fn list_proofs(&self, request_id: TaskRequestId) -> WorkflowResult<Vec<Proof>> {
        self.find_request(request_id).await?;
        Ok(self.tasks.list_proofs(request_id).await?)
    }

    /// Waits for the publish turn of the task `request_id` belongs to.
    async fn turn_for_request(&self, request_id: TaskRequestId) -> WorkflowResult<PublishTurn> {
        let task_id = self.find_request(request_id).await?.task_id();
        Ok(self.events.acquire_turn(task_id).await)
    }

    /// Uploads `files`, removing the ones already stored when a later
    /// upload fails.
    async fn store_proofs(&self, files: &[ProofFile]) -> WorkflowResult<Vec<(ProofId, StoredProof)>> {
        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            match self.proofs.store(file).await {
                Ok(locator) => stored.push((ProofId::new(), locator)),
                Err(err) => {
                    self.discard_proofs(&stored).await;
                    return Err(err.into());
                }
            }
        }
        Ok(stored)
    }

    /// Removes uploaded proofs whose request was never persisted.
    async fn discard_proofs(&self, stored: &[(ProofId, StoredProof)]) {
        for (proof_id, locator) in stored {
            if let Err(err) = self.proofs.discard(&locator.url).await {
                warn!(proof_id = %proof_id, url = %locator.url, error = %err, "orphaned proof not removed");
            }
        }
    }

    async fn load_task(&self, task_id: TaskId) -> WorkflowResult<Task> {
        self.tasks
            .find_by_id(task_id)
            .await?
            .ok_or(WorkflowError::TaskNotFound(task_id))
    }

    /// Loads a request and its task after checking that `approver` exists
    /// and may resolve it.
    async fn load_resolvable(
        &self,
        request_id: TaskRequestId,
        approver: Actor,
    ) -> WorkflowResult<(TaskRequest, Task)> {
        let request = self.find_request(request_id).await?;
        self.directory
            .find_user(approver.id())
            .await?
            .ok_or(WorkflowError::UserNotFound(approver.id()))?;
        request.ensure_resolvable_by(approver.id())?;
        let task = self.load_task(request.task_id()).await?;
        Ok((request, task))
    }

    async fn announce_resolution(
        &self,
        event_type: EventType,
        task: &Task,
        request: &TaskRequest,
        message: String,
    ) -> EventDelivery {
        self.send_email(request, &message);
        let event = request_event(event_type, task, request, message, &*self.clock)
            .with_recipients([request.requester()]);
        emit(&*self.events, &event).await
    }

    /// Emails the requester on a detached task; failures are only logged.
    fn send_email(&self, request: &TaskRequest, message: &str) {
        let Some(email) = self.email.clone() else {
            return;
        };
        let directory = Arc::clone(&self.directory);
        let requester = request.requester();
        let subject = format!("Task request {}", request.status().as_str().to_lowercase());
        let body = message.to_owned();
        tokio::spawn(async move {
            let address = match directory.find_user(requester).await {
                Ok(Some(user)) => user.email,
                Ok(None) => None,
                Err(err) => {
                    warn!(user_id = %requester, error = %err, "email lookup failed");
                    None
                }
            };
            let Some(to) = address else {
                return;
            };
            if let Err(err) = email.send(EmailMessage { to, subject, body }).await {
                warn!(user_id = %requester, error = %err, "request email failed");
            }
        });
    }
}

fn pending_conflict(err: TaskRepositoryError, task_id: TaskId) -> WorkflowError {
    match err {
        TaskRepositoryError::PendingRequestExists(_) => WorkflowError::PendingRequestExists(task_id),
        other => WorkflowError::Repository(other),
    }
}

const fn capitalised(request_type: RequestType) -> &'static str {
    match request_type {
        RequestType::Closure => "Closure",
        RequestType::Extension => "Extension",
    }
}
