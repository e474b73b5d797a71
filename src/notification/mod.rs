//! Event-driven notification delivery.
//!
//! Task services publish [`domain::NotificationEvent`]s through an
//! [`ports::EventSink`]. The [`services::EventPublisher`] writes them to a
//! topic partitioned by task id, and the [`services::NotificationFanOut`]
//! consumer turns each event into one persisted notification per recipient
//! and pushes it to connected users.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
