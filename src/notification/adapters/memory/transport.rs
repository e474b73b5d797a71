//! In-process partitioned transport built on unbounded channels.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::notification::ports::{
    Delivery, MessageTransport, PartitionStream, Subscription, TransportError, TransportResult,
};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// Partitioned in-memory transport.
///
/// Each topic owns one channel per partition. Messages published before a
/// consumer subscribes are buffered in the channel. A topic accepts a single
/// subscriber.
#[derive(Debug, Clone)]
pub struct InMemoryTransport {
    partitions: usize,
    topics: Arc<Mutex<HashMap<String, Topic>>>,
}

#[derive(Debug)]
struct Topic {
    senders: Vec<mpsc::UnboundedSender<Delivery>>,
    receivers: Option<Vec<mpsc::UnboundedReceiver<Delivery>>>,
}

impl Topic {
    fn open(partitions: usize) -> Self {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..partitions)
            .map(|_| mpsc::unbounded_channel::<Delivery>())
            .unzip();
        Self {
            senders,
            receivers: Some(receivers),
        }
    }
}

impl InMemoryTransport {
    /// Creates a transport with `partitions` partitions per topic (at least
    /// one).
    #[must_use]
    pub fn new(partitions: usize) -> Self {
        Self {
            partitions: partitions.max(1),
            topics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the partition count.
    #[must_use]
    pub const fn partitions(&self) -> usize {
        self.partitions
    }

    /// Returns the partition `key` maps to.
    #[must_use]
    pub fn partition_for(&self, key: &str) -> usize {
        let hash = key.bytes().fold(FNV_OFFSET, |acc, byte| {
            (acc ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
        });
        let count = u64::try_from(self.partitions).unwrap_or(u64::MAX);
        hash.checked_rem(count)
            .and_then(|slot| usize::try_from(slot).ok())
            .unwrap_or_default()
    }

    fn topics(&self) -> TransportResult<std::sync::MutexGuard<'_, HashMap<String, Topic>>> {
        self.topics
            .lock()
            .map_err(|err| TransportError::unavailable(std::io::Error::other(err.to_string())))
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl MessageTransport for InMemoryTransport {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> TransportResult<()> {
        let partition = self.partition_for(key);
        let mut topics = self.topics()?;
        let entry = topics
            .entry(topic.to_owned())
            .or_insert_with(|| Topic::open(self.partitions));
        let sender = entry
            .senders
            .get(partition)
            .ok_or_else(|| TransportError::Closed(topic.to_owned()))?;
        sender
            .send(Delivery {
                partition,
                key: key.to_owned(),
                payload,
            })
            .map_err(|_| TransportError::Closed(topic.to_owned()))
    }

    async fn subscribe(&self, topic: &str) -> TransportResult<Subscription> {
        let mut topics = self.topics()?;
        let entry = topics
            .entry(topic.to_owned())
            .or_insert_with(|| Topic::open(self.partitions));
        let receivers = entry
            .receivers
            .take()
            .ok_or_else(|| TransportError::AlreadySubscribed(topic.to_owned()))?;
        let streams = receivers
            .into_iter()
            .enumerate()
            .map(|(partition, receiver)| PartitionStream::new(partition, receiver))
            .collect();
        Ok(Subscription::new(topic, streams))
    }
}
