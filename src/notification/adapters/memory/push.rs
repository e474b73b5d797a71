//! In-memory registry of live user channels.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::notification::{domain::PushPayload, ports::LivePush};
use crate::task::domain::UserId;

/// Tracks one live channel per connected user.
///
/// A push to a user whose receiver was dropped disconnects that user and
/// reports `false`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLivePush {
    channels: Arc<Mutex<HashMap<UserId, mpsc::UnboundedSender<PushPayload>>>>,
}

impl InMemoryLivePush {
    /// Creates a registry with no connected users.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a live channel for `user`, replacing any earlier one.
    #[must_use]
    pub fn connect(&self, user: UserId) -> mpsc::UnboundedReceiver<PushPayload> {
        let (sender, receiver) = mpsc::unbounded_channel();
        if let Ok(mut channels) = self.channels.lock() {
            channels.insert(user, sender);
        }
        receiver
    }

    /// Closes the live channel of `user`.
    pub fn disconnect(&self, user: UserId) {
        if let Ok(mut channels) = self.channels.lock() {
            channels.remove(&user);
        }
    }

    /// Returns `true` while `user` has an open channel.
    #[must_use]
    pub fn is_connected(&self, user: UserId) -> bool {
        self.channels
            .lock()
            .map(|channels| channels.get(&user).is_some_and(|tx| !tx.is_closed()))
            .unwrap_or(false)
    }
}

#[async_trait]
impl LivePush for InMemoryLivePush {
    async fn push_to_user(&self, user: UserId, payload: &PushPayload) -> bool {
        let Ok(mut channels) = self.channels.lock() else {
            return false;
        };
        let Some(sender) = channels.get(&user) else {
            return false;
        };
        if sender.send(payload.clone()).is_ok() {
            return true;
        }
        channels.remove(&user);
        false
    }
}
