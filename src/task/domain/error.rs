//! Error types for task domain validation and parsing.

use super::{RequestStatus, TaskId, TaskRequestId, TaskStatus, UserId};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors returned by task construction and state transitions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The task title is empty after trimming.
    #[error("task title must not be empty")]
    EmptyTitle,

    /// The due date precedes the start date.
    #[error("due date {due_date} precedes start date {start_date}")]
    DueBeforeStart {
        /// Requested start date.
        start_date: DateTime<Utc>,
        /// Requested due date.
        due_date: DateTime<Utc>,
    },

    /// Tasks cannot be created directly in the requested status.
    #[error("tasks cannot be created in status {0}")]
    InvalidInitialStatus(TaskStatus),

    /// The requested transition is not permitted by the state machine.
    #[error("invalid state transition for task {task_id}: {from} -> {to}")]
    InvalidStateTransition {
        /// Task whose transition was rejected.
        task_id: TaskId,
        /// Current state.
        from: TaskStatus,
        /// Requested target state.
        to: TaskStatus,
    },

    /// An extension was approved with a due date that is not in the future.
    #[error("new due date {due_date} for task {task_id} is not in the future")]
    DueDateNotInFuture {
        /// Task being extended.
        task_id: TaskId,
        /// Rejected due date.
        due_date: DateTime<Utc>,
    },
}

/// Errors returned while opening or resolving task requests.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestDomainError {
    /// A closure request was raised without any proof attached.
    #[error("closure requests require at least one proof")]
    MissingProof,

    /// An extension request was raised without remarks.
    #[error("extension requests require non-empty remarks")]
    BlankRemarks,

    /// A rejection was submitted without a reason.
    #[error("a rejection reason is required")]
    BlankReason,

    /// An extension approval did not supply a new due date.
    #[error("extension approvals require a new due date")]
    MissingDueDate,

    /// The approver is the user who raised the request.
    #[error("user {user_id} cannot resolve their own request {request_id}")]
    SelfApproval {
        /// Request being resolved.
        request_id: TaskRequestId,
        /// Offending user.
        user_id: UserId,
    },

    /// The request has already been approved or rejected.
    #[error("request {request_id} is already {status}")]
    AlreadyResolved {
        /// Request being resolved.
        request_id: TaskRequestId,
        /// Status recorded by the earlier resolution.
        status: RequestStatus,
    },
}

/// Error returned while parsing enumerations from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseTaskEnumError {
    /// Name of the enumeration being parsed.
    pub kind: &'static str,
    /// Rejected input.
    pub value: String,
}

impl ParseTaskEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}
