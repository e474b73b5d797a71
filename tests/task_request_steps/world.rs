//! Shared world state for task request BDD scenarios.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mockable::DefaultClock;
use rstest::fixture;
use taskwarden::notification::{
    domain::{EventType, NotificationEvent},
    ports::{EventDelivery, EventSink, PublishError, PublishTurn},
    services::TaskSequencer,
};
use taskwarden::task::{
    adapters::memory::{InMemoryDirectory, InMemoryProofStorage, InMemoryTaskRepository},
    domain::{Role, TaskId, TaskRequestId, User, UserId},
    services::{TaskRequestWorkflow, WorkflowError},
};

/// Event sink that keeps every event it is handed.
#[derive(Debug, Default)]
pub struct CapturingSink {
    events: Mutex<Vec<NotificationEvent>>,
    turns: TaskSequencer,
}

impl CapturingSink {
    /// Returns the types of the captured events in emission order.
    #[must_use]
    pub fn event_types(&self) -> Vec<EventType> {
        self.events
            .lock()
            .map(|events| events.iter().map(|event| event.event_type).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventSink for CapturingSink {
    async fn publish_or_defer(
        &self,
        event: &NotificationEvent,
    ) -> Result<EventDelivery, PublishError> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        Ok(EventDelivery::Published)
    }

    async fn acquire_turn(&self, task_id: TaskId) -> PublishTurn {
        self.turns.acquire(task_id).await
    }
}

/// Workflow type used by the BDD world.
pub type TestWorkflow = TaskRequestWorkflow<
    InMemoryTaskRepository,
    InMemoryDirectory,
    InMemoryProofStorage,
    CapturingSink,
    DefaultClock,
>;

/// Scenario world for task request behaviour tests.
pub struct TaskRequestWorld {
    pub workflow: TestWorkflow,
    pub tasks: Arc<InMemoryTaskRepository>,
    pub sink: Arc<CapturingSink>,
    pub task_id: Option<TaskId>,
    pub request_id: Option<TaskRequestId>,
    pub last_result: Option<Result<(), WorkflowError>>,
}

impl TaskRequestWorld {
    /// Creates a world whose directory knows employees 2 and 3 and head 5.
    #[must_use]
    pub fn new() -> Self {
        let tasks = Arc::new(InMemoryTaskRepository::new());
        let directory = Arc::new(InMemoryDirectory::new());
        directory.add_user(User::new(UserId::new(2), "Uma", Role::Employee));
        directory.add_user(User::new(UserId::new(3), "Cal", Role::Employee));
        directory.add_user(User::new(UserId::new(5), "Vic", Role::HeadOfDepartment));
        let sink = Arc::new(CapturingSink::default());
        let workflow = TaskRequestWorkflow::new(
            Arc::clone(&tasks),
            directory,
            Arc::new(InMemoryProofStorage::new()),
            Arc::clone(&sink),
            Arc::new(DefaultClock),
        );
        Self {
            workflow,
            tasks,
            sink,
            task_id: None,
            request_id: None,
            last_result: None,
        }
    }

    /// Returns the task created by the scenario.
    ///
    /// # Errors
    ///
    /// Returns an error when no task has been created yet.
    pub fn task_id(&self) -> eyre::Result<TaskId> {
        self.task_id
            .ok_or_else(|| eyre::eyre!("missing task in scenario world"))
    }

    /// Returns the request raised by the scenario.
    ///
    /// # Errors
    ///
    /// Returns an error when no request has been raised yet.
    pub fn request_id(&self) -> eyre::Result<TaskRequestId> {
        self.request_id
            .ok_or_else(|| eyre::eyre!("missing request in scenario world"))
    }
}

impl Default for TaskRequestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> TaskRequestWorld {
    TaskRequestWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
