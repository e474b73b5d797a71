//! In-memory outbox for deferred events.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::notification::{
    domain::{EventId, NotificationEvent},
    ports::{EventOutbox, OutboxError, OutboxResult},
};

/// Keeps deferred events in parking order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventOutbox {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
}

impl InMemoryEventOutbox {
    /// Creates an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(err: impl ToString) -> OutboxError {
    OutboxError::new(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl EventOutbox for InMemoryEventOutbox {
    async fn park(&self, event: &NotificationEvent) -> OutboxResult<()> {
        let mut events = self.events.lock().map_err(poisoned)?;
        if !events.iter().any(|parked| parked.event_id == event.event_id) {
            events.push(event.clone());
        }
        Ok(())
    }

    async fn pending(&self) -> OutboxResult<Vec<NotificationEvent>> {
        let events = self.events.lock().map_err(poisoned)?;
        Ok(events.clone())
    }

    async fn remove(&self, event_id: EventId) -> OutboxResult<()> {
        let mut events = self.events.lock().map_err(poisoned)?;
        events.retain(|parked| parked.event_id != event_id);
        Ok(())
    }
}
