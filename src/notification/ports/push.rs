//! Port for live push to connected users.

use crate::notification::domain::PushPayload;
use crate::task::domain::UserId;
use async_trait::async_trait;

/// Delivers a payload to a user's live channel, if one is open.
///
/// Push is fire-and-forget: the persisted notification is the source of
/// truth and a missed push is recovered from the inbox.
#[async_trait]
pub trait LivePush: Send + Sync {
    /// Pushes `payload` to `user`, returning `true` when a connected channel
    /// accepted it.
    async fn push_to_user(&self, user: UserId, payload: &PushPayload) -> bool;
}
