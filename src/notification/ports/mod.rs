//! Port contracts for notification delivery.

pub mod dead_letter;
pub mod outbox;
pub mod push;
pub mod sink;
pub mod store;
pub mod transport;

pub use dead_letter::{DeadLetter, DeadLetterError, DeadLetterResult, DeadLetterStore};
pub use outbox::{EventOutbox, OutboxError, OutboxResult};
pub use push::LivePush;
pub use sink::{EventDelivery, EventSink, PublishError, PublishTurn};
pub use store::{
    InsertOutcome, NotificationRepository, NotificationRepositoryError,
    NotificationRepositoryResult,
};
pub use transport::{
    Delivery, MessageTransport, PartitionStream, Subscription, TransportError, TransportResult,
};
