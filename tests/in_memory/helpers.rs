//! Shared wiring for the in-memory end-to-end tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as TimeDelta, Utc};
use eyre::{WrapErr, bail};
use mockable::DefaultClock;
use taskwarden::config::ReminderConfig;
use taskwarden::notification::{
    adapters::memory::{
        InMemoryDeadLetterStore, InMemoryEventOutbox, InMemoryLivePush,
        InMemoryNotificationRepository, InMemoryTransport,
    },
    domain::{EventId, EventType, Notification, NotificationEvent},
    ports::{MessageTransport, Subscription, TransportError, TransportResult},
    services::{EventPublisher, NotificationFanOut, NotificationInboxService, RetryPolicy},
};
use taskwarden::task::{
    adapters::memory::{InMemoryDirectory, InMemoryProofStorage, InMemoryTaskRepository},
    domain::{Actor, DepartmentId, ProofFile, Role, Task, TaskId, User, UserId},
    ports::TaskRepository,
    services::{CreateTask, ReminderScheduler, TaskLifecycleService, TaskRequestWorkflow},
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Creator of every seeded task.
pub const ADMIN: u64 = 1;
/// Employee holding the seeded tasks.
pub const REQUESTER: u64 = 2;
/// Second assignee.
pub const COLLEAGUE: u64 = 3;
/// Head of [`DEPARTMENT`].
pub const HEAD: u64 = 5;
/// Department linked to the seeded tasks.
pub const DEPARTMENT: u64 = 10;

const MARKER_PREFIX: &str = "marker ";

/// Publisher shared by every producer in the stack.
pub type TestPublisher = EventPublisher<FlakyTransport, InMemoryEventOutbox>;

/// In-memory transport that refuses a chosen number of publishes.
#[derive(Debug)]
pub struct FlakyTransport {
    inner: InMemoryTransport,
    refusals: AtomicUsize,
}

impl FlakyTransport {
    /// Wraps an in-memory transport with `partitions` partitions.
    #[must_use]
    pub fn new(partitions: usize) -> Self {
        Self {
            inner: InMemoryTransport::new(partitions),
            refusals: AtomicUsize::new(0),
        }
    }

    /// Refuses the next `count` publishes.
    pub fn refuse_next(&self, count: usize) {
        self.refusals.store(count, Ordering::SeqCst);
    }

    fn take_refusal(&self) -> bool {
        self.refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl MessageTransport for FlakyTransport {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> TransportResult<()> {
        if self.take_refusal() {
            return Err(TransportError::unavailable(std::io::Error::other(
                "broker briefly unreachable",
            )));
        }
        self.inner.publish(topic, key, payload).await
    }

    async fn subscribe(&self, topic: &str) -> TransportResult<Subscription> {
        self.inner.subscribe(topic).await
    }
}

/// Lifecycle service wired to the publisher.
pub type TestLifecycle = TaskLifecycleService<InMemoryTaskRepository, TestPublisher, DefaultClock>;

/// Request workflow wired to the publisher.
pub type TestWorkflow = TaskRequestWorkflow<
    InMemoryTaskRepository,
    InMemoryDirectory,
    InMemoryProofStorage,
    TestPublisher,
    DefaultClock,
>;

/// Reminder scheduler wired to the publisher.
pub type TestReminders = ReminderScheduler<InMemoryTaskRepository, TestPublisher, DefaultClock>;

/// Producers, transport and a running fan-out consumer.
pub struct Stack {
    pub tasks: Arc<InMemoryTaskRepository>,
    pub transport: Arc<FlakyTransport>,
    pub store: Arc<InMemoryNotificationRepository>,
    pub push: Arc<InMemoryLivePush>,
    pub dead_letters: Arc<InMemoryDeadLetterStore>,
    pub publisher: Arc<TestPublisher>,
    pub lifecycle: Arc<TestLifecycle>,
    pub workflow: Arc<TestWorkflow>,
    pub reminders: Arc<TestReminders>,
    pub inbox: NotificationInboxService<InMemoryNotificationRepository>,
    stop: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl Stack {
    /// Wires the in-memory adapters and starts one worker per partition.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic cannot be subscribed or the reminder
    /// templates do not compile.
    pub async fn start() -> eyre::Result<Self> {
        Self::start_with_retry(RetryPolicy::immediate(3)).await
    }

    /// Like [`Stack::start`], with `retry` governing the producers' publish
    /// attempts.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic cannot be subscribed or the reminder
    /// templates do not compile.
    pub async fn start_with_retry(retry: RetryPolicy) -> eyre::Result<Self> {
        let clock = Arc::new(DefaultClock);
        let tasks = Arc::new(InMemoryTaskRepository::new());
        let directory = Arc::new(InMemoryDirectory::new());
        directory.add_user(User::new(UserId::new(ADMIN), "Ida", Role::Admin));
        directory.add_user(
            User::new(UserId::new(REQUESTER), "Uma", Role::Employee)
                .with_email("uma@example.test"),
        );
        directory.add_user(User::new(UserId::new(COLLEAGUE), "Cal", Role::Employee));
        directory.add_user(
            User::new(UserId::new(HEAD), "Vic", Role::HeadOfDepartment)
                .with_department(DepartmentId::new(DEPARTMENT)),
        );
        directory.set_head(DepartmentId::new(DEPARTMENT), UserId::new(HEAD));

        let transport = Arc::new(FlakyTransport::new(4));
        let publisher = Arc::new(
            EventPublisher::new(
                Arc::clone(&transport),
                Arc::new(InMemoryEventOutbox::new()),
                "task-notifications",
            )
            .with_retry(retry),
        );
        let subscription = transport
            .subscribe(publisher.topic())
            .await
            .wrap_err("subscribe fan-out consumer")?;

        let store = Arc::new(InMemoryNotificationRepository::new());
        let push = Arc::new(InMemoryLivePush::new());
        let dead_letters = Arc::new(InMemoryDeadLetterStore::new());
        let fanout = Arc::new(NotificationFanOut::new(
            Arc::clone(&tasks),
            Arc::clone(&directory),
            Arc::clone(&store),
            Arc::clone(&push),
            Arc::clone(&clock),
        ));
        let (stop, shutdown) = watch::channel(false);
        let workers = NotificationFanOut::spawn(
            &fanout,
            subscription,
            &dead_letters,
            RetryPolicy::immediate(3),
            &shutdown,
        );

        let lifecycle = Arc::new(TaskLifecycleService::new(
            Arc::clone(&tasks),
            Arc::clone(&publisher),
            Arc::clone(&clock),
        ));
        let workflow = Arc::new(TaskRequestWorkflow::new(
            Arc::clone(&tasks),
            directory,
            Arc::new(InMemoryProofStorage::new()),
            Arc::clone(&publisher),
            Arc::clone(&clock),
        ));
        let reminders = Arc::new(ReminderScheduler::new(
            Arc::clone(&tasks),
            Arc::clone(&publisher),
            clock,
            &ReminderConfig::default(),
        )?);

        Ok(Self {
            tasks,
            transport,
            inbox: NotificationInboxService::new(Arc::clone(&store)),
            store,
            push,
            dead_letters,
            publisher,
            lifecycle,
            workflow,
            reminders,
            stop,
            workers,
        })
    }

    /// Creates a task held by [`REQUESTER`] and [`COLLEAGUE`] and linked to
    /// [`DEPARTMENT`].
    ///
    /// # Errors
    ///
    /// Returns an error if the task cannot be created.
    pub async fn create_task(
        &self,
        title: &str,
        start_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> eyre::Result<Task> {
        let request = CreateTask::new(admin(), title, start_date, due_date)
            .with_assignees([UserId::new(REQUESTER), UserId::new(COLLEAGUE)])
            .with_departments([DepartmentId::new(DEPARTMENT)]);
        Ok(self.lifecycle.create_task(request).await?.into_value())
    }

    /// Reloads a task from the repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the task is missing.
    pub async fn task(&self, task_id: TaskId) -> eyre::Result<Task> {
        self.tasks
            .find_by_id(task_id)
            .await?
            .ok_or_else(|| eyre::eyre!("task {task_id} vanished"))
    }

    /// Publishes a marker event for `task_id` and waits until it has been
    /// fanned out.
    ///
    /// Deliveries for one task are processed in publish order, so every
    /// event published for the task beforehand has been handled once this
    /// returns. Markers from earlier drains are left out of the returned list.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker cannot be published or does not arrive.
    pub async fn drain(&self, task_id: TaskId, label: &str) -> eyre::Result<Vec<Notification>> {
        let marker = NotificationEvent::new(
            EventId::derive(&["marker", label]),
            EventType::Reminder,
            task_id,
            format!("{MARKER_PREFIX}{label}"),
            &DefaultClock,
        );
        self.publisher.publish(&marker).await?;
        let marker_id = marker.event_id;
        self.wait_until(|stored| stored.iter().any(|n| n.event_id() == marker_id))
            .await?;
        Ok(self
            .store
            .all()?
            .into_iter()
            .filter(|notification| !notification.message().starts_with(MARKER_PREFIX))
            .collect())
    }

    /// Polls the notification store until `ready` holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the condition does not hold within two seconds.
    pub async fn wait_until(
        &self,
        ready: impl Fn(&[Notification]) -> bool,
    ) -> eyre::Result<Vec<Notification>> {
        for _ in 0..200 {
            let stored = self.store.all()?;
            if ready(stored.as_slice()) {
                return Ok(stored);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        bail!("notifications did not settle: {:?}", self.store.all()?)
    }

    /// Stops the fan-out workers.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker panicked or failed to stop in time.
    pub async fn shutdown(self) -> eyre::Result<()> {
        self.stop.send(true)?;
        for worker in self.workers {
            tokio::time::timeout(Duration::from_secs(2), worker).await??;
        }
        Ok(())
    }
}

/// Returns a timestamp `days` from now.
#[must_use]
pub fn days_from_now(days: i64) -> DateTime<Utc> {
    Utc::now() + TimeDelta::days(days)
}

/// Returns the admin actor.
#[must_use]
pub const fn admin() -> Actor {
    Actor::new(UserId::new(ADMIN), Role::Admin)
}

/// Returns the requesting employee.
#[must_use]
pub const fn requester() -> Actor {
    Actor::new(UserId::new(REQUESTER), Role::Employee)
}

/// Returns the colleague sharing the seeded tasks.
#[must_use]
pub const fn colleague() -> Actor {
    Actor::new(UserId::new(COLLEAGUE), Role::Employee)
}

/// Returns the department head.
#[must_use]
pub const fn head() -> Actor {
    Actor::new(UserId::new(HEAD), Role::HeadOfDepartment)
}

/// Returns a one-page PDF proof.
#[must_use]
pub fn proof() -> ProofFile {
    ProofFile::new("signed-off.pdf", "application/pdf", b"%PDF-1.7".to_vec())
}

/// Returns the notifications of `event_type` for `user`.
#[must_use]
pub fn of_type_for(
    notifications: &[Notification],
    event_type: EventType,
    user: u64,
) -> Vec<Notification> {
    notifications
        .iter()
        .filter(|n| n.event_type() == event_type && n.recipient() == UserId::new(user))
        .cloned()
        .collect()
}

/// Returns the sorted recipients of `event_type` notifications.
#[must_use]
pub fn recipients_of(notifications: &[Notification], event_type: EventType) -> Vec<u64> {
    let mut recipients: Vec<u64> = notifications
        .iter()
        .filter(|n| n.event_type() == event_type)
        .map(|n| n.recipient().value())
        .collect();
    recipients.sort_unstable();
    recipients
}
