//! Domain model for task notifications.
//!
//! Events describe something that happened to a task; notifications are the
//! durable, per-recipient inbox entries the fan-out consumer derives from
//! them.

mod error;
mod event;
mod ids;
mod notification;

pub use error::{EventCodecError, ParseEventTypeError};
pub use event::{EventEnvelope, EventType, NotificationEvent};
pub use ids::{EventId, NotificationId};
pub use notification::{Notification, PersistedNotificationData, PushPayload};
