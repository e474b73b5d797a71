//! `PostgreSQL` repository implementation for the notification inbox.

use super::{
    models::{NewNotificationRow, NotificationRow},
    schema::notifications,
};
use crate::notification::{
    domain::{EventId, EventType, Notification, NotificationId, PersistedNotificationData},
    ports::{
        InsertOutcome, NotificationRepository, NotificationRepositoryError,
        NotificationRepositoryResult,
    },
};
use crate::task::domain::{TaskId, UserId};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};

/// `PostgreSQL` connection pool type used by notification adapters.
pub type NotificationPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed notification repository.
#[derive(Debug, Clone)]
pub struct PostgresNotificationRepository {
    pool: NotificationPgPool,
}

impl PostgresNotificationRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: NotificationPgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool of at most `pool_size` connections to `url`.
    ///
    /// # Errors
    ///
    /// Returns a persistence error when the initial connections cannot be
    /// established.
    pub fn connect(url: &str, pool_size: u32) -> NotificationRepositoryResult<Self> {
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(ConnectionManager::<PgConnection>::new(url))
            .map_err(NotificationRepositoryError::persistence)?;
        Ok(Self::new(pool))
    }

    async fn run_blocking<F, T>(&self, f: F) -> NotificationRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> NotificationRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool
                .get()
                .map_err(NotificationRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(NotificationRepositoryError::persistence)?
    }
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    async fn insert_if_absent(
        &self,
        notification: &Notification,
    ) -> NotificationRepositoryResult<InsertOutcome> {
        let row = to_new_row(notification)?;
        self.run_blocking(move |connection| {
            let inserted = diesel::insert_into(notifications::table)
                .values(&row)
                .on_conflict((notifications::event_id, notifications::recipient_id))
                .do_nothing()
                .execute(connection)
                .map_err(NotificationRepositoryError::persistence)?;
            Ok(if inserted == 0 {
                InsertOutcome::AlreadyPresent
            } else {
                InsertOutcome::Inserted
            })
        })
        .await
    }

    async fn find_by_id(
        &self,
        id: NotificationId,
    ) -> NotificationRepositoryResult<Option<Notification>> {
        self.run_blocking(move |connection| {
            let row = notifications::table
                .filter(notifications::id.eq(id.into_inner()))
                .select(NotificationRow::as_select())
                .first::<NotificationRow>(connection)
                .optional()
                .map_err(NotificationRepositoryError::persistence)?;
            row.map(row_to_notification).transpose()
        })
        .await
    }

    async fn list_unread(&self, user: UserId) -> NotificationRepositoryResult<Vec<Notification>> {
        let recipient = to_db_id(user.value())?;
        self.run_blocking(move |connection| {
            notifications::table
                .filter(notifications::recipient_id.eq(recipient))
                .filter(notifications::is_read.eq(false))
                .order(notifications::created_at.desc())
                .select(NotificationRow::as_select())
                .load::<NotificationRow>(connection)
                .map_err(NotificationRepositoryError::persistence)?
                .into_iter()
                .map(row_to_notification)
                .collect()
        })
        .await
    }

    async fn list_for_user(
        &self,
        user: UserId,
        limit: usize,
    ) -> NotificationRepositoryResult<Vec<Notification>> {
        let recipient = to_db_id(user.value())?;
        let row_limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.run_blocking(move |connection| {
            notifications::table
                .filter(notifications::recipient_id.eq(recipient))
                .order(notifications::created_at.desc())
                .limit(row_limit)
                .select(NotificationRow::as_select())
                .load::<NotificationRow>(connection)
                .map_err(NotificationRepositoryError::persistence)?
                .into_iter()
                .map(row_to_notification)
                .collect()
        })
        .await
    }

    async fn mark_read(&self, id: NotificationId) -> NotificationRepositoryResult<()> {
        self.run_blocking(move |connection| {
            let updated = diesel::update(notifications::table)
                .filter(notifications::id.eq(id.into_inner()))
                .set(notifications::is_read.eq(true))
                .execute(connection)
                .map_err(NotificationRepositoryError::persistence)?;
            if updated == 0 {
                return Err(NotificationRepositoryError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn mark_all_read(&self, user: UserId) -> NotificationRepositoryResult<usize> {
        let recipient = to_db_id(user.value())?;
        self.run_blocking(move |connection| {
            diesel::update(notifications::table)
                .filter(notifications::recipient_id.eq(recipient))
                .filter(notifications::is_read.eq(false))
                .set(notifications::is_read.eq(true))
                .execute(connection)
                .map_err(NotificationRepositoryError::persistence)
        })
        .await
    }

    async fn count_unread(&self, user: UserId) -> NotificationRepositoryResult<usize> {
        let recipient = to_db_id(user.value())?;
        self.run_blocking(move |connection| {
            let count = notifications::table
                .filter(notifications::recipient_id.eq(recipient))
                .filter(notifications::is_read.eq(false))
                .count()
                .get_result::<i64>(connection)
                .map_err(NotificationRepositoryError::persistence)?;
            usize::try_from(count).map_err(NotificationRepositoryError::persistence)
        })
        .await
    }
}

fn to_db_id(value: u64) -> NotificationRepositoryResult<i64> {
    i64::try_from(value).map_err(NotificationRepositoryError::persistence)
}

fn from_db_id(value: i64) -> NotificationRepositoryResult<u64> {
    u64::try_from(value).map_err(NotificationRepositoryError::persistence)
}

fn to_new_row(notification: &Notification) -> NotificationRepositoryResult<NewNotificationRow> {
    Ok(NewNotificationRow {
        id: notification.id().into_inner(),
        recipient_id: to_db_id(notification.recipient().value())?,
        task_id: to_db_id(notification.task_id().value())?,
        event_id: notification.event_id().into_inner(),
        event_type: notification.event_type().as_str().to_owned(),
        message: notification.message().to_owned(),
        is_read: notification.is_read(),
        created_at: notification.created_at(),
    })
}

fn row_to_notification(row: NotificationRow) -> NotificationRepositoryResult<Notification> {
    let event_type = EventType::try_from(row.event_type.as_str())
        .map_err(NotificationRepositoryError::persistence)?;
    Ok(Notification::from_persisted(PersistedNotificationData {
        id: NotificationId::from_uuid(row.id),
        recipient: UserId::new(from_db_id(row.recipient_id)?),
        task_id: TaskId::new(from_db_id(row.task_id)?),
        event_id: EventId::from_uuid(row.event_id),
        event_type,
        message: row.message,
        is_read: row.is_read,
        created_at: row.created_at,
    }))
}
