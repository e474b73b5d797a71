//! Diesel schema for notification persistence.

diesel::table! {
    /// Per-recipient notifications, unique on `(event_id, recipient_id)`.
    notifications (id) {
        /// Notification identifier.
        id -> Uuid,
        /// Owning user.
        recipient_id -> Int8,
        /// Originating task.
        task_id -> Int8,
        /// Originating event.
        event_id -> Uuid,
        /// Event type tag.
        #[max_length = 50]
        event_type -> Varchar,
        /// Message text.
        message -> Text,
        /// Read flag.
        is_read -> Bool,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}
