//! Notification events and their wire envelope.
//!
//! Events are transient: they travel over the messaging transport inside a
//! versioned [`EventEnvelope`] and are turned into per-recipient
//! notifications by the fan-out consumer.

use super::{EventCodecError, EventId, ParseEventTypeError};
use crate::task::domain::{TaskId, UserId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Time-triggered reminder from the scheduler.
    Reminder,
    /// Users were assigned to a task.
    Assigned,
    /// A closure or extension request was raised.
    RequestCreated,
    /// A request was approved.
    RequestApproved,
    /// A request was rejected.
    RequestRejected,
    /// The task passed its due date.
    TaskDelayed,
}

impl EventType {
    /// Returns the canonical tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reminder => "REMINDER",
            Self::Assigned => "ASSIGNED",
            Self::RequestCreated => "REQUEST_CREATED",
            Self::RequestApproved => "REQUEST_APPROVED",
            Self::RequestRejected => "REQUEST_REJECTED",
            Self::TaskDelayed => "TASK_DELAYED",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for EventType {
    type Error = ParseEventTypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "REMINDER" => Ok(Self::Reminder),
            "ASSIGNED" => Ok(Self::Assigned),
            "REQUEST_CREATED" => Ok(Self::RequestCreated),
            "REQUEST_APPROVED" => Ok(Self::RequestApproved),
            "REQUEST_REJECTED" => Ok(Self::RequestRejected),
            "TASK_DELAYED" => Ok(Self::TaskDelayed),
            _ => Err(ParseEventTypeError(value.to_owned())),
        }
    }
}

/// A message describing something that happened to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Idempotency key of the event.
    pub event_id: EventId,
    /// Event type tag.
    pub event_type: EventType,
    /// Task the event concerns; also the partition key.
    pub task_id: TaskId,
    /// Human-readable message.
    pub message: String,
    /// Extra recipients beyond assignees and department heads.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipient_hint: Vec<UserId>,
    /// When the event was raised.
    pub occurred_at: DateTime<Utc>,
}

impl NotificationEvent {
    /// Creates an event stamped with the current clock time.
    #[must_use]
    pub fn new(
        event_id: EventId,
        event_type: EventType,
        task_id: TaskId,
        message: impl Into<String>,
        clock: &impl Clock,
    ) -> Self {
        Self {
            event_id,
            event_type,
            task_id,
            message: message.into(),
            recipient_hint: Vec::new(),
            occurred_at: clock.utc(),
        }
    }

    /// Adds extra recipients.
    #[must_use]
    pub fn with_recipients(mut self, recipients: impl IntoIterator<Item = UserId>) -> Self {
        self.recipient_hint.extend(recipients);
        self
    }

    /// Returns the transport partition key.
    #[must_use]
    pub fn partition_key(&self) -> String {
        self.task_id.partition_key()
    }
}

/// Versioned wrapper written to the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    version: u32,
    event: NotificationEvent,
}

impl EventEnvelope {
    /// Schema version written by this build.
    pub const CURRENT_VERSION: u32 = 1;

    /// Wraps an event at the current schema version.
    #[must_use]
    pub const fn new(event: NotificationEvent) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            event,
        }
    }

    /// Returns the schema version.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Returns the wrapped event.
    #[must_use]
    pub const fn event(&self) -> &NotificationEvent {
        &self.event
    }

    /// Serialises an event into a transport payload.
    ///
    /// # Errors
    ///
    /// Returns [`EventCodecError::Malformed`] if serialisation fails.
    pub fn encode(event: &NotificationEvent) -> Result<Vec<u8>, EventCodecError> {
        serde_json::to_vec(&Self::new(event.clone()))
            .map_err(|err| EventCodecError::Malformed(err.to_string()))
    }

    /// Parses a transport payload back into an event.
    ///
    /// # Errors
    ///
    /// Returns [`EventCodecError::Malformed`] for invalid JSON and
    /// [`EventCodecError::UnsupportedVersion`] for envelopes written by a
    /// newer schema.
    pub fn decode(payload: &[u8]) -> Result<NotificationEvent, EventCodecError> {
        let envelope: Self = serde_json::from_slice(payload)
            .map_err(|err| EventCodecError::Malformed(err.to_string()))?;
        if envelope.version != Self::CURRENT_VERSION {
            return Err(EventCodecError::UnsupportedVersion(envelope.version));
        }
        Ok(envelope.event)
    }
}
