//! Per-task ordering and redelivery through the partitioned transport.

use super::helpers::{REQUESTER, Stack, days_from_now};
use eyre::ensure;
use mockable::DefaultClock;
use taskwarden::notification::domain::{EventId, EventType, NotificationEvent};
use taskwarden::notification::ports::DeadLetterStore;
use taskwarden::task::domain::{TaskId, UserId};

fn numbered(task_id: TaskId, index: usize) -> NotificationEvent {
    NotificationEvent::new(
        EventId::derive(&["ordering", &task_id.to_string(), &index.to_string()]),
        EventType::Reminder,
        task_id,
        format!("step {index}"),
        &DefaultClock,
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn events_for_one_task_are_applied_in_publish_order() -> eyre::Result<()> {
    let stack = Stack::start().await?;
    let first = stack
        .create_task("First", days_from_now(-1), days_from_now(5))
        .await?;
    let second = stack
        .create_task("Second", days_from_now(-1), days_from_now(5))
        .await?;

    for index in 0..20 {
        stack.publisher.publish(&numbered(first.id(), index)).await?;
        stack.publisher.publish(&numbered(second.id(), index)).await?;
    }
    stack.drain(first.id(), "first").await?;
    let delivered = stack.drain(second.id(), "second").await?;

    for task in [first.id(), second.id()] {
        let steps: Vec<String> = delivered
            .iter()
            .filter(|n| {
                n.task_id() == task
                    && n.recipient() == UserId::new(REQUESTER)
                    && n.message().starts_with("step ")
            })
            .map(|n| n.message().to_owned())
            .collect();
        let expected: Vec<String> = (0..20).map(|index| format!("step {index}")).collect();
        ensure!(steps == expected, "task {task} saw {steps:?}");
    }
    stack.shutdown().await
}

#[tokio::test(flavor = "multi_thread")]
async fn redelivered_event_creates_one_row_per_recipient() -> eyre::Result<()> {
    let stack = Stack::start().await?;
    let task = stack
        .create_task("Idempotent", days_from_now(-1), days_from_now(5))
        .await?;
    let event = numbered(task.id(), 0);

    for _ in 0..3 {
        stack.publisher.publish(&event).await?;
    }

    let delivered = stack.drain(task.id(), "redelivery").await?;
    let rows = delivered
        .iter()
        .filter(|n| n.event_id() == event.event_id)
        .count();
    ensure!(rows == 3, "expected one row per recipient, got {rows}");
    ensure!(stack.dead_letters.list().await?.is_empty());
    stack.shutdown().await
}
