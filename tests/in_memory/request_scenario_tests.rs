//! Closure and extension requests observed end to end.

use super::helpers::{
    HEAD, REQUESTER, Stack, days_from_now, head, of_type_for, proof, recipients_of, requester,
};
use eyre::{bail, ensure};
use taskwarden::error::ErrorKind;
use taskwarden::notification::domain::EventType;
use taskwarden::task::domain::{TaskStatus, UserId};
use taskwarden::task::services::{ApproveTaskRequest, CreateTaskRequest, RejectTaskRequest};

#[tokio::test(flavor = "multi_thread")]
async fn approved_closure_closes_task_and_notifies_requester() -> eyre::Result<()> {
    let stack = Stack::start().await?;
    let task = stack
        .create_task("Close the books", days_from_now(-2), days_from_now(4))
        .await?;

    let request = stack
        .workflow
        .create_request(CreateTaskRequest::closure(task.id(), requester()).with_proof(proof()))
        .await?
        .into_value();
    ensure!(stack.task(task.id()).await?.status() == TaskStatus::RequestForClosure);

    stack
        .workflow
        .approve(ApproveTaskRequest::new(request.id(), head()))
        .await?;

    let closed = stack.task(task.id()).await?;
    ensure!(closed.status() == TaskStatus::Closed);
    ensure!(closed.rfc_completed_at().is_some());

    let delivered = stack.drain(task.id(), "closure").await?;
    let approvals = of_type_for(&delivered, EventType::RequestApproved, REQUESTER);
    ensure!(approvals.len() == 1, "requester got {approvals:?}");
    ensure!(recipients_of(&delivered, EventType::RequestApproved) == vec![2, 3, 5]);

    let unread = stack.inbox.unread(UserId::new(REQUESTER)).await?;
    ensure!(of_type_for(&unread, EventType::RequestApproved, REQUESTER).len() == 1);
    stack.shutdown().await
}

#[tokio::test(flavor = "multi_thread")]
async fn extension_with_past_due_date_keeps_request_state() -> eyre::Result<()> {
    let stack = Stack::start().await?;
    let task = stack
        .create_task("Migrate archive", days_from_now(-2), days_from_now(1))
        .await?;
    let request = stack
        .workflow
        .create_request(CreateTaskRequest::extension(task.id(), requester(), "delay"))
        .await?
        .into_value();

    let result = stack
        .workflow
        .approve(ApproveTaskRequest::new(request.id(), head()).with_new_due_date(days_from_now(-1)))
        .await;

    let Err(err) = result else {
        bail!("approval with a past due date succeeded");
    };
    ensure!(err.kind() == ErrorKind::Validation, "unexpected error {err}");
    ensure!(stack.task(task.id()).await?.status() == TaskStatus::RequestForExtension);
    ensure!(stack.workflow.find_request(request.id()).await?.is_pending());

    let delivered = stack.drain(task.id(), "extension").await?;
    ensure!(recipients_of(&delivered, EventType::RequestApproved).is_empty());
    stack.shutdown().await
}

#[tokio::test(flavor = "multi_thread")]
async fn approved_extension_moves_due_date() -> eyre::Result<()> {
    let stack = Stack::start().await?;
    let task = stack
        .create_task("Renew licences", days_from_now(-2), days_from_now(1))
        .await?;
    let new_due = days_from_now(10);
    let request = stack
        .workflow
        .create_request(CreateTaskRequest::extension(task.id(), requester(), "vendor delay"))
        .await?
        .into_value();

    stack
        .workflow
        .approve(ApproveTaskRequest::new(request.id(), head()).with_new_due_date(new_due))
        .await?;

    let extended = stack.task(task.id()).await?;
    ensure!(extended.status() == TaskStatus::Extended);
    ensure!(extended.due_date() == new_due);
    stack.shutdown().await
}

#[tokio::test(flavor = "multi_thread")]
async fn closure_without_proof_leaves_no_trace() -> eyre::Result<()> {
    let stack = Stack::start().await?;
    let task = stack
        .create_task("File returns", days_from_now(-2), days_from_now(4))
        .await?;

    let result = stack
        .workflow
        .create_request(CreateTaskRequest::closure(task.id(), requester()))
        .await;

    let Err(err) = result else {
        bail!("closure without proof succeeded");
    };
    ensure!(err.kind() == ErrorKind::Validation);
    let unchanged = stack.task(task.id()).await?;
    ensure!(unchanged.status() == TaskStatus::Pending);
    ensure!(unchanged.revision() == task.revision());

    let delivered = stack.drain(task.id(), "no-proof").await?;
    ensure!(recipients_of(&delivered, EventType::RequestCreated).is_empty());
    ensure!(recipients_of(&delivered, EventType::Assigned) == vec![2, 3, 5]);
    stack.shutdown().await
}

#[tokio::test(flavor = "multi_thread")]
async fn rejection_restores_status_and_allows_a_new_request() -> eyre::Result<()> {
    let stack = Stack::start().await?;
    let task = stack
        .create_task("Audit vendors", days_from_now(-2), days_from_now(4))
        .await?;
    let first = stack
        .workflow
        .create_request(CreateTaskRequest::closure(task.id(), requester()).with_proof(proof()))
        .await?
        .into_value();

    let second = stack
        .workflow
        .create_request(CreateTaskRequest::extension(task.id(), requester(), "more time"))
        .await;
    ensure!(matches!(second, Err(ref err) if err.kind() == ErrorKind::Conflict));

    stack
        .workflow
        .reject(RejectTaskRequest::new(first.id(), head(), "proof is unsigned"))
        .await?;
    ensure!(stack.task(task.id()).await?.status() == TaskStatus::Pending);

    stack
        .workflow
        .create_request(CreateTaskRequest::closure(task.id(), requester()).with_proof(proof()))
        .await?;

    let delivered = stack.drain(task.id(), "reject").await?;
    let rejected = of_type_for(&delivered, EventType::RequestRejected, REQUESTER);
    let [rejection] = rejected.as_slice() else {
        bail!("expected one rejection notice, got {rejected:?}");
    };
    ensure!(rejection.message().contains("proof is unsigned"));
    ensure!(of_type_for(&delivered, EventType::RequestCreated, HEAD).len() == 2);
    stack.shutdown().await
}

#[tokio::test(flavor = "multi_thread")]
async fn requester_cannot_resolve_own_request() -> eyre::Result<()> {
    let stack = Stack::start().await?;
    let task = stack
        .create_task("Sign contract", days_from_now(-2), days_from_now(4))
        .await?;
    let request = stack
        .workflow
        .create_request(CreateTaskRequest::closure(task.id(), requester()).with_proof(proof()))
        .await?
        .into_value();

    let approval = stack
        .workflow
        .approve(ApproveTaskRequest::new(request.id(), requester()))
        .await;
    let rejection = stack
        .workflow
        .reject(RejectTaskRequest::new(request.id(), requester(), "changed my mind"))
        .await;

    ensure!(matches!(approval, Err(ref err) if err.kind() == ErrorKind::Forbidden));
    ensure!(matches!(rejection, Err(ref err) if err.kind() == ErrorKind::Forbidden));
    ensure!(stack.task(task.id()).await?.status() == TaskStatus::RequestForClosure);
    stack.shutdown().await
}
