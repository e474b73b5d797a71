//! Diesel row models for notification persistence.

use super::schema::notifications;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query result row for notifications.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NotificationRow {
    /// Notification identifier.
    pub id: uuid::Uuid,
    /// Owning user.
    pub recipient_id: i64,
    /// Originating task.
    pub task_id: i64,
    /// Originating event.
    pub event_id: uuid::Uuid,
    /// Event type tag.
    pub event_type: String,
    /// Message text.
    pub message: String,
    /// Read flag.
    pub is_read: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Insert model for notifications.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotificationRow {
    /// Notification identifier.
    pub id: uuid::Uuid,
    /// Owning user.
    pub recipient_id: i64,
    /// Originating task.
    pub task_id: i64,
    /// Originating event.
    pub event_id: uuid::Uuid,
    /// Event type tag.
    pub event_type: String,
    /// Message text.
    pub message: String,
    /// Read flag.
    pub is_read: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
