//! Fan-out consumer turning events into per-recipient notifications.
//!
//! One worker runs per transport partition and processes its deliveries
//! strictly in order. A delivery is retried under the configured
//! [`RetryPolicy`] and parked in the dead-letter store once the budget is
//! spent; payloads that cannot be decoded are parked straight away.

use mockable::Clock;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::RetryPolicy;
use crate::error::ErrorKind;
use crate::notification::{
    domain::{EventCodecError, EventEnvelope, Notification, NotificationEvent},
    ports::{
        DeadLetter, DeadLetterError, DeadLetterStore, Delivery, InsertOutcome, LivePush,
        NotificationRepository, NotificationRepositoryError, PartitionStream, Subscription,
    },
};
use crate::task::{
    domain::{TaskId, UserId},
    ports::{DirectoryPort, TaskRepository, TaskRepositoryError},
};

/// Errors raised while fanning out one event.
#[derive(Debug, Clone, Error)]
pub enum FanOutError {
    /// The payload is not a readable event envelope.
    #[error(transparent)]
    Codec(#[from] EventCodecError),

    /// The event refers to a task the store does not know.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// The task could not be loaded.
    #[error(transparent)]
    Tasks(#[from] TaskRepositoryError),

    /// Some recipients could not be persisted.
    #[error("failed to persist {failed} notification(s): {source}")]
    Store {
        /// Recipients whose write failed.
        failed: usize,
        /// First persistence error.
        #[source]
        source: NotificationRepositoryError,
    },

    /// The dead-letter store rejected a parked delivery.
    #[error(transparent)]
    DeadLetter(#[from] DeadLetterError),
}

impl FanOutError {
    /// Returns `true` for failures a retry cannot fix.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Codec(_) | Self::TaskNotFound(_))
    }

    /// Returns the error category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Codec(_) | Self::Store { .. } | Self::Tasks(_) | Self::DeadLetter(_) => {
                ErrorKind::Internal
            }
            Self::TaskNotFound(_) => ErrorKind::NotFound,
        }
    }
}

/// Result type for fan-out operations.
pub type FanOutResult<T> = Result<T, FanOutError>;

/// What one successful fan-out did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Distinct recipients resolved for the event.
    pub recipients: usize,
    /// Notifications written by this call.
    pub inserted: usize,
    /// Recipients that already had the notification.
    pub duplicates: usize,
    /// Live pushes a connected channel accepted.
    pub pushed: usize,
}

/// How a delivery left the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Every recipient holds the notification.
    Processed(FanOutReport),
    /// The delivery was parked in the dead-letter store.
    DeadLettered,
}

/// Resolves recipients, persists notifications and pushes them live.
#[derive(Clone)]
pub struct NotificationFanOut<R, D, N, P, C>
where
    R: TaskRepository,
    D: DirectoryPort,
    N: NotificationRepository,
    P: LivePush,
    C: Clock + Send + Sync,
{
    tasks: Arc<R>,
    directory: Arc<D>,
    store: Arc<N>,
    push: Arc<P>,
    clock: Arc<C>,
}

impl<R, D, N, P, C> NotificationFanOut<R, D, N, P, C>
where
    R: TaskRepository + 'static,
    D: DirectoryPort + 'static,
    N: NotificationRepository + 'static,
    P: LivePush + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a fan-out consumer.
    #[must_use]
    pub const fn new(
        tasks: Arc<R>,
        directory: Arc<D>,
        store: Arc<N>,
        push: Arc<P>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            tasks,
            directory,
            store,
            push,
            clock,
        }
    }

    /// Fans out one event.
    ///
    /// Recipients are the task's assignees, the head of each linked
    /// department and the event's recipient hint. Each gets at most one
    /// notification per event; a live push follows only a fresh insert and
    /// its failure is ignored. A failed insert does not stop the remaining
    /// recipients.
    ///
    /// # Errors
    ///
    /// Returns [`FanOutError::TaskNotFound`] for unknown tasks and
    /// [`FanOutError::Store`] when at least one insert failed.
    pub async fn handle(&self, event: &NotificationEvent) -> FanOutResult<FanOutReport> {
        let recipients = self.resolve_recipients(event).await?;
        let mut report = FanOutReport {
            recipients: recipients.len(),
            ..FanOutReport::default()
        };
        let mut failed = 0_usize;
        let mut first_error = None;

        for recipient in recipients {
            let notification = Notification::for_recipient(event, recipient, &*self.clock);
            match self.store.insert_if_absent(&notification).await {
                Ok(InsertOutcome::Inserted) => {
                    report.inserted = report.inserted.saturating_add(1);
                    if self
                        .push
                        .push_to_user(recipient, &notification.push_payload())
                        .await
                    {
                        report.pushed = report.pushed.saturating_add(1);
                    } else {
                        debug!(user_id = %recipient, "recipient not connected, push skipped");
                    }
                }
                Ok(InsertOutcome::AlreadyPresent) => {
                    report.duplicates = report.duplicates.saturating_add(1);
                }
                Err(err) => {
                    warn!(
                        event_id = %event.event_id,
                        user_id = %recipient,
                        error = %err,
                        "failed to persist notification"
                    );
                    failed = failed.saturating_add(1);
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        match first_error {
            Some(source) => Err(FanOutError::Store { failed, source }),
            None => Ok(report),
        }
    }

    async fn resolve_recipients(&self, event: &NotificationEvent) -> FanOutResult<BTreeSet<UserId>> {
        let task = self
            .tasks
            .find_by_id(event.task_id)
            .await?
            .ok_or(FanOutError::TaskNotFound(event.task_id))?;

        let mut recipients: BTreeSet<UserId> = task.assignees().clone();
        for department in task.departments() {
            match self.directory.head_of_department(*department).await {
                Ok(Some(head)) => {
                    recipients.insert(head);
                }
                Ok(None) => {
                    debug!(department_id = %department, "department has no head");
                }
                Err(err) => {
                    warn!(department_id = %department, error = %err, "failed to resolve department head");
                }
            }
        }
        recipients.extend(event.recipient_hint.iter().copied());
        Ok(recipients)
    }

    /// Decodes and fans out one delivery, retrying under `retry` and
    /// dead-lettering what cannot be processed.
    ///
    /// # Errors
    ///
    /// Returns [`FanOutError::DeadLetter`] only when parking itself fails.
    pub async fn process<L>(
        &self,
        delivery: Delivery,
        dead_letters: &L,
        retry: RetryPolicy,
    ) -> FanOutResult<DeliveryOutcome>
    where
        L: DeadLetterStore,
    {
        let event = match EventEnvelope::decode(&delivery.payload) {
            Ok(event) => event,
            Err(err) => {
                warn!(partition = delivery.partition, key = %delivery.key, error = %err, "undecodable payload");
                self.park(delivery, dead_letters, &err.to_string(), 1).await?;
                return Ok(DeliveryOutcome::DeadLettered);
            }
        };

        let mut attempt = 1_u32;
        loop {
            match self.handle(&event).await {
                Ok(report) => {
                    debug!(
                        event_id = %event.event_id,
                        inserted = report.inserted,
                        duplicates = report.duplicates,
                        "event fanned out"
                    );
                    return Ok(DeliveryOutcome::Processed(report));
                }
                Err(err) if !err.is_permanent() && retry.allows_retry_after(attempt) => {
                    warn!(event_id = %event.event_id, attempt, error = %err, "fan-out failed, retrying");
                    tokio::time::sleep(retry.delay_for(attempt)).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(err) => {
                    error!(event_id = %event.event_id, attempt, error = %err, "fan-out abandoned");
                    self.park(delivery, dead_letters, &err.to_string(), attempt)
                        .await?;
                    return Ok(DeliveryOutcome::DeadLettered);
                }
            }
        }
    }

    async fn park<L>(
        &self,
        delivery: Delivery,
        dead_letters: &L,
        reason: &str,
        attempts: u32,
    ) -> FanOutResult<()>
    where
        L: DeadLetterStore,
    {
        dead_letters
            .park(DeadLetter {
                partition: delivery.partition,
                key: delivery.key,
                payload: delivery.payload,
                reason: reason.to_owned(),
                attempts,
                parked_at: self.clock.utc(),
            })
            .await?;
        Ok(())
    }

    /// Starts one worker per partition of `subscription`.
    ///
    /// Workers stop when `shutdown` turns `true`, when its sender is
    /// dropped, or when their partition closes.
    #[must_use]
    pub fn spawn<L>(
        consumer: &Arc<Self>,
        subscription: Subscription,
        dead_letters: &Arc<L>,
        retry: RetryPolicy,
        shutdown: &watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>>
    where
        L: DeadLetterStore + 'static,
    {
        info!(
            topic = subscription.topic(),
            partitions = subscription.partition_count(),
            "starting fan-out workers"
        );
        subscription
            .into_partitions()
            .into_iter()
            .map(|mut stream| {
                let worker = Arc::clone(consumer);
                let letters = Arc::clone(dead_letters);
                let mut stop = shutdown.clone();
                tokio::spawn(async move {
                    worker
                        .run_partition(&mut stream, &*letters, retry, &mut stop)
                        .await;
                })
            })
            .collect()
    }

    async fn run_partition<L>(
        &self,
        stream: &mut PartitionStream,
        dead_letters: &L,
        retry: RetryPolicy,
        shutdown: &mut watch::Receiver<bool>,
    ) where
        L: DeadLetterStore,
    {
        let partition = stream.partition();
        debug!(partition, "fan-out worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                delivery = stream.next() => {
                    let Some(next) = delivery else {
                        break;
                    };
                    if let Err(err) = self.process(next, dead_letters, retry).await {
                        error!(partition, error = %err, "failed to park delivery");
                    }
                }
            }
        }
        debug!(partition, "fan-out worker stopped");
    }
}
