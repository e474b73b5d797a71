//! In-memory adapter implementations for the notification context.

mod dead_letter;
mod outbox;
mod push;
mod store;
mod transport;

pub use dead_letter::InMemoryDeadLetterStore;
pub use outbox::InMemoryEventOutbox;
pub use push::InMemoryLivePush;
pub use store::InMemoryNotificationRepository;
pub use transport::InMemoryTransport;
