//! Repository port for persisted notifications.

use crate::notification::domain::{Notification, NotificationId};
use crate::task::domain::UserId;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for notification repository operations.
pub type NotificationRepositoryResult<T> = Result<T, NotificationRepositoryError>;

/// Outcome of [`NotificationRepository::insert_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was written.
    Inserted,
    /// A notification for the same event and recipient already existed.
    AlreadyPresent,
}

impl InsertOutcome {
    /// Returns `true` when a new row was written.
    #[must_use]
    pub const fn is_inserted(self) -> bool {
        matches!(self, Self::Inserted)
    }
}

/// Durable per-user inbox.
///
/// `(event_id, recipient)` is unique; inserting a second notification with
/// the same pair is a no-op reported as [`InsertOutcome::AlreadyPresent`].
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Inserts the notification unless its natural key is already stored.
    async fn insert_if_absent(
        &self,
        notification: &Notification,
    ) -> NotificationRepositoryResult<InsertOutcome>;

    /// Finds a notification by identifier.
    async fn find_by_id(
        &self,
        id: NotificationId,
    ) -> NotificationRepositoryResult<Option<Notification>>;

    /// Lists unread notifications for `user`, newest first.
    async fn list_unread(&self, user: UserId) -> NotificationRepositoryResult<Vec<Notification>>;

    /// Lists up to `limit` notifications for `user`, newest first.
    async fn list_for_user(
        &self,
        user: UserId,
        limit: usize,
    ) -> NotificationRepositoryResult<Vec<Notification>>;

    /// Marks one notification read. Marking a read notification again is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationRepositoryError::NotFound`] for unknown ids.
    async fn mark_read(&self, id: NotificationId) -> NotificationRepositoryResult<()>;

    /// Marks every notification of `user` read, returning how many changed.
    async fn mark_all_read(&self, user: UserId) -> NotificationRepositoryResult<usize>;

    /// Counts unread notifications for `user`.
    async fn count_unread(&self, user: UserId) -> NotificationRepositoryResult<usize>;
}

/// Errors returned by notification repository implementations.
#[derive(Debug, Clone, Error)]
pub enum NotificationRepositoryError {
    /// The notification was not found.
    #[error("notification not found: {0}")]
    NotFound(NotificationId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl NotificationRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
