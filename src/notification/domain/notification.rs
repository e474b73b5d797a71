//! Per-recipient inbox entries.

use super::{EventId, EventType, NotificationEvent, NotificationId};
use crate::task::domain::{TaskId, UserId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Durable inbox entry derived from a [`NotificationEvent`].
///
/// Only the fan-out consumer creates notifications; afterwards only the read
/// flag changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    id: NotificationId,
    recipient: UserId,
    task_id: TaskId,
    event_id: EventId,
    event_type: EventType,
    message: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedNotificationData {
    /// Persisted identifier.
    pub id: NotificationId,
    /// Owning user.
    pub recipient: UserId,
    /// Originating task.
    pub task_id: TaskId,
    /// Originating event.
    pub event_id: EventId,
    /// Event type tag.
    pub event_type: EventType,
    /// Message text.
    pub message: String,
    /// Read flag.
    pub is_read: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Creates the inbox entry for one recipient of `event`.
    #[must_use]
    pub fn for_recipient(event: &NotificationEvent, recipient: UserId, clock: &impl Clock) -> Self {
        Self {
            id: NotificationId::new(),
            recipient,
            task_id: event.task_id,
            event_id: event.event_id,
            event_type: event.event_type,
            message: event.message.clone(),
            is_read: false,
            created_at: clock.utc(),
        }
    }

    /// Reconstructs a notification from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedNotificationData) -> Self {
        Self {
            id: data.id,
            recipient: data.recipient,
            task_id: data.task_id,
            event_id: data.event_id,
            event_type: data.event_type,
            message: data.message,
            is_read: data.is_read,
            created_at: data.created_at,
        }
    }

    /// Returns the notification identifier.
    #[must_use]
    pub const fn id(&self) -> NotificationId {
        self.id
    }

    /// Returns the owning user.
    #[must_use]
    pub const fn recipient(&self) -> UserId {
        self.recipient
    }

    /// Returns the originating task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the originating event.
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        self.event_id
    }

    /// Returns the event type tag.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Returns the message text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns whether the recipient has read the notification.
    #[must_use]
    pub const fn is_read(&self) -> bool {
        self.is_read
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns `true` when `user` owns this notification.
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.recipient == user
    }

    /// Marks the notification read, returning `false` if it already was.
    pub const fn mark_read(&mut self) -> bool {
        let changed = !self.is_read;
        self.is_read = true;
        changed
    }

    /// Builds the payload pushed over a live channel.
    #[must_use]
    pub fn push_payload(&self) -> PushPayload {
        PushPayload {
            notification_id: self.id,
            task_id: self.task_id,
            event_type: self.event_type,
            message: self.message.clone(),
            created_at: self.created_at,
        }
    }
}

/// Payload delivered to a connected recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayload {
    /// Persisted notification the push mirrors.
    pub notification_id: NotificationId,
    /// Originating task.
    pub task_id: TaskId,
    /// Event type tag.
    pub event_type: EventType,
    /// Message text.
    pub message: String,
    /// Creation timestamp of the notification.
    pub created_at: DateTime<Utc>,
}
