//! Read side of the notification inbox.

use std::sync::Arc;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::notification::{
    domain::{Notification, NotificationId},
    ports::{NotificationRepository, NotificationRepositoryError},
};
use crate::task::domain::UserId;

/// Service-level errors for inbox operations.
#[derive(Debug, Clone, Error)]
pub enum InboxError {
    /// The notification does not exist.
    #[error("notification not found: {0}")]
    NotFound(NotificationId),

    /// The notification belongs to another user.
    #[error("user {user_id} does not own notification {notification_id}")]
    Forbidden {
        /// Notification being accessed.
        notification_id: NotificationId,
        /// Requesting user.
        user_id: UserId,
    },

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] NotificationRepositoryError),
}

impl InboxError {
    /// Returns the caller-facing error category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::Repository(NotificationRepositoryError::NotFound(_)) => {
                ErrorKind::NotFound
            }
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::Repository(NotificationRepositoryError::Persistence(_)) => ErrorKind::Internal,
        }
    }
}

/// Result type for inbox operations.
pub type InboxResult<T> = Result<T, InboxError>;

/// Per-user access to persisted notifications.
#[derive(Clone)]
pub struct NotificationInboxService<N>
where
    N: NotificationRepository,
{
    store: Arc<N>,
}

impl<N> NotificationInboxService<N>
where
    N: NotificationRepository,
{
    /// Creates an inbox service.
    #[must_use]
    pub const fn new(store: Arc<N>) -> Self {
        Self { store }
    }

    /// Lists the user's unread notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`InboxError::Repository`] when the store fails.
    pub async fn unread(&self, user: UserId) -> InboxResult<Vec<Notification>> {
        Ok(self.store.list_unread(user).await?)
    }

    /// Lists the user's latest notifications, read or not.
    ///
    /// # Errors
    ///
    /// Returns [`InboxError::Repository`] when the store fails.
    pub async fn recent(&self, user: UserId, limit: usize) -> InboxResult<Vec<Notification>> {
        Ok(self.store.list_for_user(user, limit).await?)
    }

    /// Counts the user's unread notifications.
    ///
    /// # Errors
    ///
    /// Returns [`InboxError::Repository`] when the store fails.
    pub async fn unread_count(&self, user: UserId) -> InboxResult<usize> {
        Ok(self.store.count_unread(user).await?)
    }

    /// Marks one of the user's notifications read.
    ///
    /// # Errors
    ///
    /// Returns [`InboxError::NotFound`] for unknown notifications and
    /// [`InboxError::Forbidden`] when `user` is not the recipient.
    pub async fn mark_read(&self, user: UserId, id: NotificationId) -> InboxResult<()> {
        let notification = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(InboxError::NotFound(id))?;
        if !notification.is_owned_by(user) {
            return Err(InboxError::Forbidden {
                notification_id: id,
                user_id: user,
            });
        }
        self.store.mark_read(id).await?;
        Ok(())
    }

    /// Marks all of the user's notifications read.
    ///
    /// # Errors
    ///
    /// Returns [`InboxError::Repository`] when the store fails.
    pub async fn mark_all_read(&self, user: UserId) -> InboxResult<usize> {
        Ok(self.store.mark_all_read(user).await?)
    }
}
