//! Parking store for deliveries the fan-out consumer gave up on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for dead-letter operations.
pub type DeadLetterResult<T> = Result<T, DeadLetterError>;

/// A delivery that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    /// Partition the delivery came from.
    pub partition: usize,
    /// Partition key.
    pub key: String,
    /// Raw payload, kept for inspection or replay.
    pub payload: Vec<u8>,
    /// Last failure, rendered for operators.
    pub reason: String,
    /// Processing attempts made before parking.
    pub attempts: u32,
    /// When the delivery was parked.
    pub parked_at: DateTime<Utc>,
}

/// Keeps deliveries that exhausted their retries or could not be decoded.
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    /// Parks a delivery.
    async fn park(&self, letter: DeadLetter) -> DeadLetterResult<()>;

    /// Lists parked deliveries, oldest first.
    async fn list(&self) -> DeadLetterResult<Vec<DeadLetter>>;
}

/// Errors returned by dead-letter implementations.
#[derive(Debug, Clone, Error)]
#[error("dead-letter store unavailable: {0}")]
pub struct DeadLetterError(pub Arc<dyn std::error::Error + Send + Sync>);

impl DeadLetterError {
    /// Wraps a storage error.
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(err))
    }
}
