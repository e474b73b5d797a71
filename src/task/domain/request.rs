//! Closure and extension requests raised against a task.

use super::{
    ParseTaskEnumError, ProofId, RequestDomainError, TaskId, TaskRequestId, TaskStatus, UserId,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of request raised by a task holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
    /// Ask for the task to be closed.
    Closure,
    /// Ask for the due date to be pushed back.
    Extension,
}

impl RequestType {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closure => "CLOSURE",
            Self::Extension => "EXTENSION",
        }
    }

    /// Returns the task status held while a request of this kind is pending.
    #[must_use]
    pub const fn pending_status(self) -> TaskStatus {
        match self {
            Self::Closure => TaskStatus::RequestForClosure,
            Self::Extension => TaskStatus::RequestForExtension,
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for RequestType {
    type Error = ParseTaskEnumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "CLOSURE" => Ok(Self::Closure),
            "EXTENSION" => Ok(Self::Extension),
            _ => Err(ParseTaskEnumError::new("request type", value)),
        }
    }
}

/// Resolution status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Awaiting a decision.
    Pending,
    /// Approved by a non-requester.
    Approved,
    /// Rejected by a non-requester.
    Rejected,
}

impl RequestStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for RequestStatus {
    type Error = ParseTaskEnumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            _ => Err(ParseTaskEnumError::new("request status", value)),
        }
    }
}

/// Parameters for opening a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParams {
    /// Task the request is raised against.
    pub task_id: TaskId,
    /// Closure or extension.
    pub request_type: RequestType,
    /// User raising the request.
    pub requester: UserId,
    /// Free-text remarks, mandatory for extensions.
    pub remarks: Option<String>,
    /// Proposed due date for extensions.
    pub requested_due_date: Option<DateTime<Utc>>,
}

/// A closure or extension request.
///
/// Resolved exactly once; after approval or rejection every mutator returns
/// [`RequestDomainError::AlreadyResolved`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    id: TaskRequestId,
    task_id: TaskId,
    request_type: RequestType,
    requester: UserId,
    requested_at: DateTime<Utc>,
    status: RequestStatus,
    remarks: Option<String>,
    requested_due_date: Option<DateTime<Utc>>,
    approver: Option<UserId>,
    rejection_reason: Option<String>,
    resolved_at: Option<DateTime<Utc>>,
    proof_ids: Vec<ProofId>,
}

impl TaskRequest {
    /// Opens a new pending request.
    ///
    /// # Errors
    ///
    /// Returns [`RequestDomainError::MissingProof`] for a closure without
    /// proofs and [`RequestDomainError::BlankRemarks`] for an extension
    /// without remarks.
    pub fn open(
        params: RequestParams,
        proof_ids: Vec<ProofId>,
        clock: &impl Clock,
    ) -> Result<Self, RequestDomainError> {
        Self::validate(&params, proof_ids.len())?;
        let remarks = params
            .remarks
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty());

        Ok(Self {
            id: TaskRequestId::new(),
            task_id: params.task_id,
            request_type: params.request_type,
            requester: params.requester,
            requested_at: clock.utc(),
            status: RequestStatus::Pending,
            remarks,
            requested_due_date: params.requested_due_date,
            approver: None,
            rejection_reason: None,
            resolved_at: None,
            proof_ids,
        })
    }

    /// Checks the creation rules without building a request.
    ///
    /// # Errors
    ///
    /// See [`TaskRequest::open`].
    pub fn validate(params: &RequestParams, proof_count: usize) -> Result<(), RequestDomainError> {
        match params.request_type {
            RequestType::Closure if proof_count == 0 => Err(RequestDomainError::MissingProof),
            RequestType::Extension if is_blank(params.remarks.as_deref()) => {
                Err(RequestDomainError::BlankRemarks)
            }
            RequestType::Closure | RequestType::Extension => Ok(()),
        }
    }

    /// Returns the request identifier.
    #[must_use]
    pub const fn id(&self) -> TaskRequestId {
        self.id
    }

    /// Returns the owning task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the request kind.
    #[must_use]
    pub const fn request_type(&self) -> RequestType {
        self.request_type
    }

    /// Returns the requesting user.
    #[must_use]
    pub const fn requester(&self) -> UserId {
        self.requester
    }

    /// Returns when the request was raised.
    #[must_use]
    pub const fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    /// Returns the resolution status.
    #[must_use]
    pub const fn status(&self) -> RequestStatus {
        self.status
    }

    /// Returns the remarks supplied with the request.
    #[must_use]
    pub fn remarks(&self) -> Option<&str> {
        self.remarks.as_deref()
    }

    /// Returns the due date proposed by the requester, if any.
    #[must_use]
    pub const fn requested_due_date(&self) -> Option<DateTime<Utc>> {
        self.requested_due_date
    }

    /// Returns the resolving user once resolved.
    #[must_use]
    pub const fn approver(&self) -> Option<UserId> {
        self.approver
    }

    /// Returns the stored rejection reason.
    #[must_use]
    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    /// Returns when the request was resolved.
    #[must_use]
    pub const fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    /// Returns the attached proofs in upload order.
    #[must_use]
    pub fn proof_ids(&self) -> &[ProofId] {
        &self.proof_ids
    }

    /// Returns `true` while awaiting a decision.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    /// Verifies that `approver` may resolve this request.
    ///
    /// # Errors
    ///
    /// Returns [`RequestDomainError::AlreadyResolved`] once resolved and
    /// [`RequestDomainError::SelfApproval`] when `approver` raised the
    /// request.
    pub fn ensure_resolvable_by(&self, approver: UserId) -> Result<(), RequestDomainError> {
        if approver == self.requester {
            return Err(RequestDomainError::SelfApproval {
                request_id: self.id,
                user_id: approver,
            });
        }
        if !self.is_pending() {
            return Err(RequestDomainError::AlreadyResolved {
                request_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    /// Marks the request approved.
    ///
    /// # Errors
    ///
    /// See [`TaskRequest::ensure_resolvable_by`].
    pub fn approve(&mut self, approver: UserId, clock: &impl Clock) -> Result<(), RequestDomainError> {
        self.ensure_resolvable_by(approver)?;
        self.status = RequestStatus::Approved;
        self.approver = Some(approver);
        self.resolved_at = Some(clock.utc());
        Ok(())
    }

    /// Marks the request rejected, storing the reason.
    ///
    /// # Errors
    ///
    /// Returns [`RequestDomainError::BlankReason`] for an empty reason, or
    /// any error from [`TaskRequest::ensure_resolvable_by`].
    pub fn reject(
        &mut self,
        approver: UserId,
        reason: &str,
        clock: &impl Clock,
    ) -> Result<(), RequestDomainError> {
        let trimmed = reason.trim();
        if trimmed.is_empty() {
            return Err(RequestDomainError::BlankReason);
        }
        self.ensure_resolvable_by(approver)?;
        self.status = RequestStatus::Rejected;
        self.approver = Some(approver);
        self.rejection_reason = Some(trimmed.to_owned());
        self.resolved_at = Some(clock.utc());
        Ok(())
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|text| text.trim().is_empty())
}
