//! Port for the partitioned, ordered messaging transport.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Topic-based messaging with per-key ordering.
///
/// Payloads published under the same key land on the same partition and are
/// delivered in publish order. Nothing is promised across keys.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Publishes `payload` to `topic` under the partition key `key`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the payload could not be accepted.
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> TransportResult<()>;

    /// Opens the consumer side of `topic`, one stream per partition.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AlreadySubscribed`] when the topic already
    /// has a consumer, or [`TransportError::Unavailable`].
    async fn subscribe(&self, topic: &str) -> TransportResult<Subscription>;
}

/// One message received from a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Partition the message was read from.
    pub partition: usize,
    /// Partition key supplied by the publisher.
    pub key: String,
    /// Encoded event envelope.
    pub payload: Vec<u8>,
}

/// Ordered stream of deliveries for a single partition.
#[derive(Debug)]
pub struct PartitionStream {
    partition: usize,
    receiver: mpsc::UnboundedReceiver<Delivery>,
}

impl PartitionStream {
    /// Wraps the receiving end of a partition channel.
    #[must_use]
    pub const fn new(partition: usize, receiver: mpsc::UnboundedReceiver<Delivery>) -> Self {
        Self {
            partition,
            receiver,
        }
    }

    /// Returns the partition index.
    #[must_use]
    pub const fn partition(&self) -> usize {
        self.partition
    }

    /// Waits for the next delivery; `None` once the transport is closed.
    pub async fn next(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }
}

/// Consumer handle for a topic.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    partitions: Vec<PartitionStream>,
}

impl Subscription {
    /// Creates a subscription from its partition streams.
    #[must_use]
    pub fn new(topic: impl Into<String>, partitions: Vec<PartitionStream>) -> Self {
        Self {
            topic: topic.into(),
            partitions,
        }
    }

    /// Returns the subscribed topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the number of partitions.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Splits the subscription into its partition streams.
    #[must_use]
    pub fn into_partitions(self) -> Vec<PartitionStream> {
        self.partitions
    }
}

/// Errors returned by transport implementations.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The topic already has a consumer attached.
    #[error("topic {0} already has a subscriber")]
    AlreadySubscribed(String),

    /// The consumer side of the topic has gone away.
    #[error("topic {0} is closed")]
    Closed(String),

    /// The broker could not be reached.
    #[error("transport unavailable: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Wraps a broker error.
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Arc::new(err))
    }
}
