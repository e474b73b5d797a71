//! Event construction and hand-off shared by the task services.

use mockable::Clock;
use tracing::error;

use crate::notification::{
    domain::{EventId, EventType, NotificationEvent},
    ports::{EventDelivery, EventSink},
};
use crate::task::domain::{Task, TaskRequest};

/// Result of a committed operation together with the fate of its event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowOutcome<T> {
    /// Value produced by the operation.
    pub value: T,
    /// How the resulting event left the service.
    pub delivery: EventDelivery,
}

impl<T> WorkflowOutcome<T> {
    /// Pairs a value with its event delivery.
    #[must_use]
    pub const fn new(value: T, delivery: EventDelivery) -> Self {
        Self { value, delivery }
    }

    /// Discards the delivery information.
    #[must_use]
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Hands `event` to `sink`. The state change is already committed, so a
/// failure is logged and reported instead of returned.
pub(crate) async fn emit<E>(sink: &E, event: &NotificationEvent) -> EventDelivery
where
    E: EventSink + ?Sized,
{
    match sink.publish_or_defer(event).await {
        Ok(delivery) => delivery,
        Err(err) => {
            error!(
                event_id = %event.event_id,
                event_type = %event.event_type,
                task_id = %event.task_id,
                error = %err,
                "event lost after commit"
            );
            EventDelivery::Failed
        }
    }
}

/// Event for a request after it reached its current status.
///
/// The identifier depends only on the request and its status, so
/// republishing the same transition yields the same event.
pub(crate) fn request_event(
    event_type: EventType,
    task: &Task,
    request: &TaskRequest,
    message: String,
    clock: &impl Clock,
) -> NotificationEvent {
    let request_id = request.id().to_string();
    let event_id = EventId::derive(&["request", &request_id, request.status().as_str()]);
    NotificationEvent::new(event_id, event_type, task.id(), message, clock)
}

/// Event announcing new assignees at the task's current revision.
pub(crate) fn assignment_event(task: &Task, clock: &impl Clock) -> NotificationEvent {
    let task_id = task.id().to_string();
    let revision = task.revision().to_string();
    let event_id = EventId::derive(&["assigned", &task_id, &revision]);
    let message = format!("You have been assigned to task \"{}\"", task.title());
    NotificationEvent::new(event_id, EventType::Assigned, task.id(), message, clock)
}

/// Event announcing that a task passed its due date.
pub(crate) fn delayed_event(task: &Task, clock: &impl Clock) -> NotificationEvent {
    let task_id = task.id().to_string();
    let due = task.due_date().to_rfc3339();
    let event_id = EventId::derive(&["delayed", &task_id, &due]);
    let message = format!(
        "Task \"{}\" is delayed: it was due on {}",
        task.title(),
        task.due_date().date_naive()
    );
    NotificationEvent::new(event_id, EventType::TaskDelayed, task.id(), message, clock)
}
