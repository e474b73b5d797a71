//! Runs the taskwarden daemon.
//!
//! Usage:
//!
//! ```text
//! taskwarden
//! ```
//!
//! Configuration is read from `taskwarden.toml` in the working directory and
//! from `TASKWARDEN_*` environment variables; `TASKWARDEN_LOG` sets the
//! tracing filter. The daemon wires the in-memory adapters (or, with the
//! `postgres` feature and `database.url` set, the `PostgreSQL` notification
//! store), starts one fan-out worker per transport partition, the outbox
//! drain loop and the daily job runner, and stops cleanly on Ctrl-C.

use mockable::DefaultClock;
use std::sync::Arc;
use taskwarden::config::AppConfig;
use taskwarden::notification::adapters::memory::{
    InMemoryDeadLetterStore, InMemoryEventOutbox, InMemoryLivePush,
    InMemoryNotificationRepository, InMemoryTransport,
};
use taskwarden::notification::ports::{MessageTransport, NotificationRepository, Subscription};
use taskwarden::notification::services::{EventPublisher, NotificationFanOut, RetryPolicy};
use taskwarden::task::adapters::memory::{InMemoryDirectory, InMemoryTaskRepository};
use taskwarden::task::services::{JobRunner, ReminderScheduler, TaskLifecycleService};
use taskwarden::telemetry::init_tracing;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;
#[cfg(not(feature = "postgres"))]
use tracing::warn;

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Collaborators of the fan-out consumer that do not depend on the store.
struct FanOutParts {
    tasks: Arc<InMemoryTaskRepository>,
    directory: Arc<InMemoryDirectory>,
    clock: Arc<DefaultClock>,
    dead_letters: Arc<InMemoryDeadLetterStore>,
    retry: RetryPolicy,
}

impl FanOutParts {
    /// Starts one worker per partition persisting into `store`.
    fn spawn<N>(
        self,
        store: Arc<N>,
        subscription: Subscription,
        shutdown: &watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>>
    where
        N: NotificationRepository + 'static,
    {
        let fanout = Arc::new(NotificationFanOut::new(
            self.tasks,
            self.directory,
            store,
            Arc::new(InMemoryLivePush::new()),
            self.clock,
        ));
        NotificationFanOut::spawn(&fanout, subscription, &self.dead_letters, self.retry, shutdown)
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config.log.filter)?;

    let clock = Arc::new(DefaultClock);
    let tasks = Arc::new(InMemoryTaskRepository::new());
    let directory = Arc::new(InMemoryDirectory::new());
    let transport = Arc::new(InMemoryTransport::new(config.transport.partitions));
    let dead_letters = Arc::new(InMemoryDeadLetterStore::new());
    let publisher = Arc::new(
        EventPublisher::new(
            Arc::clone(&transport),
            Arc::new(InMemoryEventOutbox::new()),
            config.publisher.topic.clone(),
        )
        .with_retry(config.publisher.retry_policy()),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let subscription = transport.subscribe(publisher.topic()).await?;
    let consumer = FanOutParts {
        tasks: Arc::clone(&tasks),
        directory,
        clock: Arc::clone(&clock),
        dead_letters,
        retry: config.fanout.retry_policy(),
    };
    let mut handles = match config.database.url.as_deref() {
        #[cfg(feature = "postgres")]
        Some(url) => {
            use taskwarden::notification::adapters::postgres::PostgresNotificationRepository;
            let store = PostgresNotificationRepository::connect(url, config.database.pool_size)?;
            info!(pool_size = config.database.pool_size, "using PostgreSQL notification store");
            consumer.spawn(Arc::new(store), subscription, &shutdown_rx)
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => {
            warn!("database.url is set but the postgres feature is disabled; using memory");
            consumer.spawn(
                Arc::new(InMemoryNotificationRepository::new()),
                subscription,
                &shutdown_rx,
            )
        }
        None => consumer.spawn(
            Arc::new(InMemoryNotificationRepository::new()),
            subscription,
            &shutdown_rx,
        ),
    };

    let lifecycle = Arc::new(TaskLifecycleService::new(
        Arc::clone(&tasks),
        Arc::clone(&publisher),
        Arc::clone(&clock),
    ));
    let reminders = Arc::new(ReminderScheduler::new(
        tasks,
        Arc::clone(&publisher),
        Arc::clone(&clock),
        &config.reminders,
    )?);
    let drainer = Arc::clone(&publisher);
    let drain_interval = config.publisher.drain_interval();
    let mut drain_shutdown = shutdown_rx.clone();
    handles.push(tokio::spawn(async move {
        drainer
            .drain_periodically(drain_interval, &mut drain_shutdown)
            .await;
    }));

    let runner = Arc::new(
        JobRunner::new(config.reminders.run_at_time()?, clock)
            .with_job(reminders)
            .with_job(lifecycle)
            .with_job(publisher),
    );
    let mut runner_shutdown = shutdown_rx.clone();
    handles.push(tokio::spawn(async move {
        runner.run(&mut runner_shutdown).await;
    }));

    info!(
        topic = %config.publisher.topic,
        partitions = config.transport.partitions,
        "taskwarden started"
    );
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    shutdown_tx.send(true)?;
    for handle in handles {
        handle.await?;
    }
    info!("taskwarden stopped");
    Ok(())
}
