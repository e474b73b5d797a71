//! In-memory notification inbox.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::notification::{
    domain::{EventId, Notification, NotificationId},
    ports::{
        InsertOutcome, NotificationRepository, NotificationRepositoryError,
        NotificationRepositoryResult,
    },
};
use crate::task::domain::UserId;

/// Thread-safe in-memory notification repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationRepository {
    state: Arc<RwLock<NotificationState>>,
}

#[derive(Debug, Default)]
struct NotificationState {
    notifications: HashMap<NotificationId, Notification>,
    natural_keys: HashSet<(EventId, UserId)>,
    insertion_order: Vec<NotificationId>,
}

impl InMemoryNotificationRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored notification in insertion order.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the lock is poisoned.
    pub fn all(&self) -> NotificationRepositoryResult<Vec<Notification>> {
        let state = self.read()?;
        Ok(state
            .insertion_order
            .iter()
            .filter_map(|id| state.notifications.get(id).cloned())
            .collect())
    }

    fn read(&self) -> NotificationRepositoryResult<RwLockReadGuard<'_, NotificationState>> {
        self.state.read().map_err(|err| {
            NotificationRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> NotificationRepositoryResult<RwLockWriteGuard<'_, NotificationState>> {
        self.state.write().map_err(|err| {
            NotificationRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    /// Returns the user's notifications matching `predicate`, newest first.
    fn newest_first(
        &self,
        user: UserId,
        predicate: impl Fn(&Notification) -> bool,
    ) -> NotificationRepositoryResult<Vec<Notification>> {
        let state = self.read()?;
        Ok(state
            .insertion_order
            .iter()
            .rev()
            .filter_map(|id| state.notifications.get(id))
            .filter(|notification| notification.is_owned_by(user) && predicate(notification))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn insert_if_absent(
        &self,
        notification: &Notification,
    ) -> NotificationRepositoryResult<InsertOutcome> {
        let mut state = self.write()?;
        let key = (notification.event_id(), notification.recipient());
        if !state.natural_keys.insert(key) {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        state.insertion_order.push(notification.id());
        state
            .notifications
            .insert(notification.id(), notification.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn find_by_id(
        &self,
        id: NotificationId,
    ) -> NotificationRepositoryResult<Option<Notification>> {
        let state = self.read()?;
        Ok(state.notifications.get(&id).cloned())
    }

    async fn list_unread(&self, user: UserId) -> NotificationRepositoryResult<Vec<Notification>> {
        self.newest_first(user, |notification| !notification.is_read())
    }

    async fn list_for_user(
        &self,
        user: UserId,
        limit: usize,
    ) -> NotificationRepositoryResult<Vec<Notification>> {
        let mut notifications = self.newest_first(user, |_| true)?;
        notifications.truncate(limit);
        Ok(notifications)
    }

    async fn mark_read(&self, id: NotificationId) -> NotificationRepositoryResult<()> {
        let mut state = self.write()?;
        let notification = state
            .notifications
            .get_mut(&id)
            .ok_or(NotificationRepositoryError::NotFound(id))?;
        notification.mark_read();
        Ok(())
    }

    async fn mark_all_read(&self, user: UserId) -> NotificationRepositoryResult<usize> {
        let mut state = self.write()?;
        let mut changed = 0_usize;
        for notification in state
            .notifications
            .values_mut()
            .filter(|notification| notification.is_owned_by(user))
        {
            if notification.mark_read() {
                changed = changed.saturating_add(1);
            }
        }
        Ok(changed)
    }

    async fn count_unread(&self, user: UserId) -> NotificationRepositoryResult<usize> {
        let state = self.read()?;
        Ok(state
            .notifications
            .values()
            .filter(|notification| notification.is_owned_by(user) && !notification.is_read())
            .count())
    }
}
