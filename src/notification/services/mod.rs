//! Notification services: publishing, fan-out and the inbox.

pub mod fanout;
pub mod inbox;
pub mod publisher;
pub mod retry;
pub mod sequencer;

pub use fanout::{
    DeliveryOutcome, FanOutError, FanOutReport, FanOutResult, NotificationFanOut,
};
pub use inbox::{InboxError, InboxResult, NotificationInboxService};
pub use publisher::{EventPublisher, RepublishReport};
pub use retry::RetryPolicy;
pub use sequencer::TaskSequencer;
