//! Port through which task services hand events to the notification
//! pipeline.

use crate::error::ErrorKind;
use crate::notification::domain::{EventCodecError, EventId, NotificationEvent};
use crate::notification::ports::{OutboxError, TransportError};
use crate::task::domain::TaskId;
use async_trait::async_trait;
use thiserror::Error;

/// Exclusive right to commit and publish for one task; dropping it hands
/// the turn to the next producer of that task.
pub type PublishTurn = tokio::sync::OwnedMutexGuard<()>;

/// How an event left the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDelivery {
    /// The transport accepted the event.
    Published,
    /// The event was parked in the outbox for later republication.
    Deferred,
    /// Neither the transport nor the outbox accepted the event.
    Failed,
}

impl EventDelivery {
    /// Returns `true` when the event still waits in the outbox.
    #[must_use]
    pub const fn is_deferred(self) -> bool {
        matches!(self, Self::Deferred)
    }

    /// Returns `true` when the event was lost.
    #[must_use]
    pub const fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Accepts events once the state change behind them has been committed.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publishes `event`, parking it when the transport keeps failing.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] only when the event could neither be
    /// published nor parked.
    async fn publish_or_defer(&self, event: &NotificationEvent)
    -> Result<EventDelivery, PublishError>;

    /// Waits until no other producer is committing or publishing for
    /// `task_id`.
    ///
    /// Producers take the turn before their conditional write and hold it
    /// until [`EventSink::publish_or_defer`] returns, so the events of one
    /// task reach the transport in commit order even while a publish is
    /// being retried.
    async fn acquire_turn(&self, task_id: TaskId) -> PublishTurn;
}

/// Errors raised while publishing an event.
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    /// The event could not be encoded.
    #[error(transparent)]
    Codec(#[from] EventCodecError),

    /// The transport rejected every attempt.
    #[error("publishing event {event_id} failed after {attempts} attempts: {source}")]
    Transport {
        /// Event being published.
        event_id: EventId,
        /// Attempts made.
        attempts: u32,
        /// Last transport error.
        #[source]
        source: TransportError,
    },

    /// The outbox could not be read or written.
    #[error(transparent)]
    Outbox(#[from] OutboxError),
}

impl PublishError {
    /// Returns the caller-facing error category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Codec(_) | Self::Outbox(_) => ErrorKind::Internal,
        }
    }
}
