//! When steps for task request BDD scenarios.

use super::world::{TaskRequestWorld, run_async};
use chrono::{Duration, Utc};
use rstest_bdd_macros::when;
use taskwarden::task::{
    domain::{Actor, ProofFile, Role, UserId},
    services::{ApproveTaskRequest, CreateTaskRequest, RejectTaskRequest},
};

fn approver(id: u64) -> Actor {
    let role = if id == 5 {
        Role::HeadOfDepartment
    } else {
        Role::Employee
    };
    Actor::new(UserId::new(id), role)
}

#[when("employee {requester:u64} requests closure with {proofs:u64} proofs")]
fn request_closure(
    world: &mut TaskRequestWorld,
    requester: u64,
    proofs: u64,
) -> Result<(), eyre::Report> {
    let mut request =
        CreateTaskRequest::closure(world.task_id()?, Actor::new(UserId::new(requester), Role::Employee));
    for index in 0..proofs {
        request = request.with_proof(ProofFile::new(
            format!("proof-{index}.pdf"),
            "application/pdf",
            b"%PDF-1.7".to_vec(),
        ));
    }
    let result = run_async(world.workflow.create_request(request));
    world.last_result = Some(result.map(|_| ()));
    Ok(())
}

#[when(r#"employee {requester:u64} requests an extension because "{remarks}""#)]
fn request_extension(
    world: &mut TaskRequestWorld,
    requester: u64,
    remarks: String,
) -> Result<(), eyre::Report> {
    let request = CreateTaskRequest::extension(
        world.task_id()?,
        Actor::new(UserId::new(requester), Role::Employee),
        remarks,
    );
    let result = run_async(world.workflow.create_request(request));
    world.last_result = Some(result.map(|_| ()));
    Ok(())
}

#[when("user {approver_id:u64} approves the request")]
fn approve(world: &mut TaskRequestWorld, approver_id: u64) -> Result<(), eyre::Report> {
    let approval = ApproveTaskRequest::new(world.request_id()?, approver(approver_id));
    let result = run_async(world.workflow.approve(approval));
    world.last_result = Some(result.map(|_| ()));
    Ok(())
}

#[when("user {approver_id:u64} approves the request with a due date {days:i64} days ago")]
fn approve_with_past_date(
    world: &mut TaskRequestWorld,
    approver_id: u64,
    days: i64,
) -> Result<(), eyre::Report> {
    let approval = ApproveTaskRequest::new(world.request_id()?, approver(approver_id))
        .with_new_due_date(Utc::now() - Duration::days(days));
    let result = run_async(world.workflow.approve(approval));
    world.last_result = Some(result.map(|_| ()));
    Ok(())
}

#[when(r#"user {approver_id:u64} rejects the request because "{reason}""#)]
fn reject(
    world: &mut TaskRequestWorld,
    approver_id: u64,
    reason: String,
) -> Result<(), eyre::Report> {
    let rejection = RejectTaskRequest::new(world.request_id()?, approver(approver_id), reason);
    let result = run_async(world.workflow.reject(rejection));
    world.last_result = Some(result.map(|_| ()));
    Ok(())
}
