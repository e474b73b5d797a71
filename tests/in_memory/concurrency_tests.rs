//! Producers racing on one task: fan-out order and conflict outcomes.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::helpers::{REQUESTER, Stack, admin, colleague, days_from_now, head, proof, requester};
use eyre::{bail, ensure};
use mockable::DefaultClock;
use taskwarden::error::ErrorKind;
use taskwarden::notification::domain::{EventId, EventType, Notification, NotificationEvent};
use taskwarden::notification::ports::{EventDelivery, EventSink};
use taskwarden::notification::services::RetryPolicy;
use taskwarden::task::domain::{TaskId, TaskRequestId, TaskStatus, UserId};
use taskwarden::task::services::{ApproveTaskRequest, CreateTaskRequest};

fn inbox_of(delivered: &[Notification], user: u64) -> Vec<EventType> {
    delivered
        .iter()
        .filter(|n| n.recipient() == UserId::new(user))
        .map(Notification::event_type)
        .collect()
}

async fn first_request(stack: &Stack, task_id: TaskId) -> eyre::Result<TaskRequestId> {
    for _ in 0..100 {
        if let Some(request) = stack.workflow.list_requests(task_id).await?.first() {
            return Ok(request.id());
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    bail!("no request was stored for task {task_id}")
}

#[tokio::test(flavor = "multi_thread")]
async fn approval_waits_for_retried_creation_announcement() -> eyre::Result<()> {
    let stack = Stack::start_with_retry(RetryPolicy::new(3, Duration::from_millis(300))).await?;
    let task = stack
        .create_task("Quarterly audit", days_from_now(-2), days_from_now(4))
        .await?;
    stack.transport.refuse_next(1);

    let creator = Arc::clone(&stack.workflow);
    let task_id = task.id();
    let creation = tokio::spawn(async move {
        creator
            .create_request(CreateTaskRequest::closure(task_id, requester()).with_proof(proof()))
            .await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    let request_id = first_request(&stack, task_id).await?;
    stack
        .workflow
        .approve(ApproveTaskRequest::new(request_id, head()))
        .await?;
    let created = creation.await??;
    ensure!(created.delivery == EventDelivery::Published);

    let delivered = stack.drain(task_id, "retried-creation").await?;
    let inbox = inbox_of(&delivered, REQUESTER);
    ensure!(
        inbox
            == vec![
                EventType::Assigned,
                EventType::RequestCreated,
                EventType::RequestApproved
            ],
        "requester saw {inbox:?}"
    );
    stack.shutdown().await
}

#[tokio::test(flavor = "multi_thread")]
async fn racing_producers_fan_out_in_commit_order() -> eyre::Result<()> {
    let stack = Stack::start_with_retry(RetryPolicy::new(3, Duration::from_millis(20))).await?;
    let task = stack
        .create_task("Shared ledger", days_from_now(-1), days_from_now(5))
        .await?;
    let task_id = task.id();
    let commits = Arc::new(AtomicUsize::new(0));
    stack.transport.refuse_next(2);

    let mut producers = Vec::new();
    for _ in 0..8 {
        let publisher = Arc::clone(&stack.publisher);
        let counter = Arc::clone(&commits);
        producers.push(tokio::spawn(async move {
            let _turn = publisher.acquire_turn(task_id).await;
            let position = counter.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            let event = NotificationEvent::new(
                EventId::derive(&["commit", &task_id.to_string(), &position.to_string()]),
                EventType::Reminder,
                task_id,
                format!("commit {position}"),
                &DefaultClock,
            );
            publisher.publish_or_defer(&event).await
        }));
    }
    for producer in producers {
        let delivery = producer.await??;
        ensure!(delivery == EventDelivery::Published, "got {delivery:?}");
    }

    let delivered = stack.drain(task_id, "racing-producers").await?;
    let commits_seen: Vec<String> = delivered
        .iter()
        .filter(|n| n.recipient() == UserId::new(REQUESTER) && n.message().starts_with("commit "))
        .map(|n| n.message().to_owned())
        .collect();
    let expected: Vec<String> = (0..8).map(|position| format!("commit {position}")).collect();
    ensure!(commits_seen == expected, "fan-out order was {commits_seen:?}");
    stack.shutdown().await
}

#[tokio::test(flavor = "multi_thread")]
async fn simultaneous_requests_leave_one_pending() -> eyre::Result<()> {
    let stack = Stack::start().await?;
    let task = stack
        .create_task("Inventory count", days_from_now(-1), days_from_now(5))
        .await?;
    let task_id = task.id();

    let mut attempts = Vec::new();
    for actor in [requester(), colleague()] {
        let workflow = Arc::clone(&stack.workflow);
        attempts.push(tokio::spawn(async move {
            workflow
                .create_request(CreateTaskRequest::extension(task_id, actor, "more time"))
                .await
        }));
    }
    let mut accepted = 0_usize;
    for attempt in attempts {
        match attempt.await? {
            Ok(_) => accepted += 1,
            Err(err) => ensure!(err.kind() == ErrorKind::Conflict, "unexpected error {err}"),
        }
    }

    ensure!(accepted == 1, "{accepted} requests were accepted");
    ensure!(stack.workflow.list_requests(task_id).await?.len() == 1);
    ensure!(stack.task(task_id).await?.status() == TaskStatus::RequestForExtension);
    let delivered = stack.drain(task_id, "simultaneous-requests").await?;
    let created = inbox_of(&delivered, REQUESTER)
        .into_iter()
        .filter(|event_type| *event_type == EventType::RequestCreated)
        .count();
    ensure!(created == 1, "requester was told of {created} requests");
    stack.shutdown().await
}

#[tokio::test(flavor = "multi_thread")]
async fn simultaneous_approvals_resolve_once() -> eyre::Result<()> {
    let stack = Stack::start().await?;
    let task = stack
        .create_task("Close the quarter", days_from_now(-2), days_from_now(4))
        .await?;
    let request = stack
        .workflow
        .create_request(CreateTaskRequest::closure(task.id(), requester()).with_proof(proof()))
        .await?
        .into_value();

    let mut approvals = Vec::new();
    for approver in [head(), admin()] {
        let workflow = Arc::clone(&stack.workflow);
        let request_id = request.id();
        approvals.push(tokio::spawn(async move {
            workflow
                .approve(ApproveTaskRequest::new(request_id, approver))
                .await
        }));
    }
    let mut resolved = 0_usize;
    for approval in approvals {
        match approval.await? {
            Ok(_) => resolved += 1,
            Err(err) => ensure!(err.kind() == ErrorKind::Conflict, "unexpected error {err}"),
        }
    }

    ensure!(resolved == 1, "{resolved} approvals succeeded");
    ensure!(stack.task(task.id()).await?.status() == TaskStatus::Closed);
    let delivered = stack.drain(task.id(), "simultaneous-approvals").await?;
    let approved = inbox_of(&delivered, REQUESTER)
        .into_iter()
        .filter(|event_type| *event_type == EventType::RequestApproved)
        .count();
    ensure!(approved == 1, "requester was told of {approved} approvals");
    stack.shutdown().await
}
