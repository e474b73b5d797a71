//! Caller-facing classification of service errors.
//!
//! Every service error maps onto one [`ErrorKind`]. Callers branch on the
//! kind and show [`ErrorKind::public_message`]; the detailed error text is
//! only written to the log.

use std::fmt;

/// Coarse error category shared by all services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input failed a business rule.
    Validation,
    /// The operation lost a race or collides with existing state.
    Conflict,
    /// The actor may not perform the operation.
    Forbidden,
    /// A referenced entity does not exist.
    NotFound,
    /// The task state machine rejected the transition.
    InvalidStateTransition,
    /// An argument is well-formed but unacceptable, such as a past due date.
    InvalidArgument,
    /// The messaging transport rejected a publish.
    Transport,
    /// Infrastructure failure.
    Internal,
}

impl ErrorKind {
    /// Returns a message that is safe to show to the caller.
    #[must_use]
    pub const fn public_message(self) -> &'static str {
        match self {
            Self::Validation => "the request is invalid",
            Self::Conflict => "the resource was changed by another request",
            Self::Forbidden => "you are not allowed to perform this action",
            Self::NotFound => "the requested resource does not exist",
            Self::InvalidStateTransition => "the task cannot move to the requested status",
            Self::InvalidArgument => "an argument has an unacceptable value",
            Self::Transport => "the notification could not be delivered",
            Self::Internal => "an internal error occurred",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.public_message())
    }
}
