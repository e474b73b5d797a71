//! Event publisher with bounded retries and a deferred-event outbox.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::{RetryPolicy, TaskSequencer};
use crate::notification::{
    domain::{EventEnvelope, NotificationEvent},
    ports::{
        EventDelivery, EventOutbox, EventSink, MessageTransport, PublishError, PublishTurn,
        TransportError,
    },
};
use crate::task::domain::TaskId;
use crate::task::services::{JobError, ScheduledJob};

/// Outcome of [`EventPublisher::republish_deferred`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepublishReport {
    /// Events the transport accepted and that left the outbox.
    pub published: usize,
    /// Events still parked.
    pub remaining: usize,
}

impl RepublishReport {
    const fn absorb(&mut self, other: Self) {
        self.published = self.published.saturating_add(other.published);
        self.remaining = self.remaining.saturating_add(other.remaining);
    }
}

const MIN_DRAIN_INTERVAL: Duration = Duration::from_millis(1);

/// Publishes notification events to a topic keyed by task id.
///
/// One instance is shared by every producer: it also hands out the per-task
/// publish turns that keep each task's events in commit order.
#[derive(Clone)]
pub struct EventPublisher<T, O>
where
    T: MessageTransport,
    O: EventOutbox,
{
    transport: Arc<T>,
    outbox: Arc<O>,
    topic: String,
    retry: RetryPolicy,
    turns: Arc<TaskSequencer>,
}

impl<T, O> EventPublisher<T, O>
where
    T: MessageTransport,
    O: EventOutbox,
{
    /// Creates a publisher for `topic`.
    #[must_use]
    pub fn new(transport: Arc<T>, outbox: Arc<O>, topic: impl Into<String>) -> Self {
        Self {
            transport,
            outbox,
            topic: topic.into(),
            retry: RetryPolicy::default(),
            turns: Arc::new(TaskSequencer::new()),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the topic events are published to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publishes `event`, retrying transport failures.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Transport`] once the retry budget is spent,
    /// or [`PublishError::Codec`] if the event cannot be encoded.
    pub async fn publish(&self, event: &NotificationEvent) -> Result<(), PublishError> {
        let payload = EventEnvelope::encode(event)?;
        let key = event.partition_key();
        let mut attempt = 1_u32;
        loop {
            match self
                .transport
                .publish(&self.topic, &key, payload.clone())
                .await
            {
                Ok(()) => {
                    debug!(
                        event_id = %event.event_id,
                        event_type = %event.event_type,
                        task_id = %event.task_id,
                        attempt,
                        "event published"
                    );
                    return Ok(());
                }
                Err(err) if self.retry.allows_retry_after(attempt) => {
                    warn!(event_id = %event.event_id, attempt, error = %err, "publish failed, retrying");
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(err) => return Err(transport_failure(event, attempt, err)),
            }
        }
    }

    /// Republishes parked events in parking order.
    ///
    /// Each task is drained under its publish turn. Once an event of a task
    /// fails again, later events of the same task stay parked so their order
    /// is kept.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Outbox`] when the outbox cannot be read or
    /// updated.
    pub async fn republish_deferred(&self) -> Result<RepublishReport, PublishError> {
        let parked = self.outbox.pending().await?;
        let mut tasks: Vec<TaskId> = Vec::new();
        for event in &parked {
            if !tasks.contains(&event.task_id) {
                tasks.push(event.task_id);
            }
        }
        let mut report = RepublishReport::default();
        for task_id in tasks {
            let _turn = self.turns.acquire(task_id).await;
            report.absorb(self.flush_parked(task_id).await?);
        }
        if report.published > 0 {
            info!(
                published = report.published,
                remaining = report.remaining,
                "republished deferred events"
            );
        }
        Ok(report)
    }

    /// Drains the outbox every `every` until `shutdown` turns `true` or its
    /// sender is dropped.
    pub async fn drain_periodically(&self, every: Duration, shutdown: &mut watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(every.max(MIN_DRAIN_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(interval_ms = every.as_millis(), "outbox drain started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match self.republish_deferred().await {
                        Ok(report) if report.remaining > 0 => {
                            debug!(remaining = report.remaining, "deferred events still parked");
                        }
                        Ok(_) => {}
                        Err(err) => warn!(error = %err, "outbox drain failed"),
                    }
                }
            }
        }
        debug!("outbox drain stopped");
    }

    /// Publishes the parked events of `task_id` in parking order, stopping
    /// at the first one that still fails. Callers hold the task's turn.
    async fn flush_parked(&self, task_id: TaskId) -> Result<RepublishReport, PublishError> {
        let parked = self.outbox.pending().await?;
        let mut report = RepublishReport::default();
        let mut blocked = false;
        for event in parked.iter().filter(|event| event.task_id == task_id) {
            if blocked {
                report.remaining = report.remaining.saturating_add(1);
                continue;
            }
            match self.publish(event).await {
                Ok(()) => {
                    self.outbox.remove(event.event_id).await?;
                    report.published = report.published.saturating_add(1);
                }
                Err(err) => {
                    warn!(event_id = %event.event_id, error = %err, "deferred event still undeliverable");
                    blocked = true;
                    report.remaining = report.remaining.saturating_add(1);
                }
            }
        }
        Ok(report)
    }
}

#[async_trait]
impl<T, O> EventSink for EventPublisher<T, O>
where
    T: MessageTransport,
    O: EventOutbox,
{
    async fn publish_or_defer(
        &self,
        event: &NotificationEvent,
    ) -> Result<EventDelivery, PublishError> {
        let backlog = self.flush_parked(event.task_id).await?;
        if backlog.remaining > 0 {
            self.outbox.park(event).await?;
            debug!(event_id = %event.event_id, task_id = %event.task_id, "event queued behind parked event");
            return Ok(EventDelivery::Deferred);
        }
        match self.publish(event).await {
            Ok(()) => Ok(EventDelivery::Published),
            Err(PublishError::Transport { attempts, source, .. }) => {
                warn!(
                    event_id = %event.event_id,
                    task_id = %event.task_id,
                    attempts,
                    error = %source,
                    "publish retries exhausted, deferring event"
                );
                self.outbox.park(event).await?;
                Ok(EventDelivery::Deferred)
            }
            Err(err) => Err(err),
        }
    }

    async fn acquire_turn(&self, task_id: TaskId) -> PublishTurn {
        self.turns.acquire(task_id).await
    }
}

fn transport_failure(event: &NotificationEvent, attempts: u32, source: TransportError) -> PublishError {
    PublishError::Transport {
        event_id: event.event_id,
        attempts,
        source,
    }
}

#[async_trait]
impl<T, O> ScheduledJob for EventPublisher<T, O>
where
    T: MessageTransport,
    O: EventOutbox,
{
    fn name(&self) -> &'static str {
        "outbox-drain"
    }

    async fn run(&self, _today: NaiveDate) -> Result<(), JobError> {
        let report = self
            .republish_deferred()
            .await
            .map_err(|err| JobError::new(self.name(), &err))?;
        if report.remaining > 0 {
            warn!(remaining = report.remaining, "deferred events still parked");
        }
        Ok(())
    }
}
