//! Parking store for events whose publication was deferred.

use crate::notification::domain::{EventId, NotificationEvent};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for outbox operations.
pub type OutboxResult<T> = Result<T, OutboxError>;

/// Events committed by the workflow but not yet accepted by the transport.
///
/// Keyed by event id; parking the same event twice keeps one entry.
/// [`EventOutbox::pending`] returns entries in parking order so a replay
/// keeps per-task ordering.
#[async_trait]
pub trait EventOutbox: Send + Sync {
    /// Parks an event for later republication.
    async fn park(&self, event: &NotificationEvent) -> OutboxResult<()>;

    /// Returns parked events in parking order.
    async fn pending(&self) -> OutboxResult<Vec<NotificationEvent>>;

    /// Removes an event after it was published.
    async fn remove(&self, event_id: EventId) -> OutboxResult<()>;
}

/// Errors returned by outbox implementations.
#[derive(Debug, Clone, Error)]
#[error("outbox unavailable: {0}")]
pub struct OutboxError(pub Arc<dyn std::error::Error + Send + Sync>);

impl OutboxError {
    /// Wraps a storage error.
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(err))
    }
}
