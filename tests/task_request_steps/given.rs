//! Given steps for task request BDD scenarios.

use std::collections::BTreeSet;

use super::world::{TaskRequestWorld, run_async};
use chrono::{Duration, Utc};
use eyre::WrapErr;
use mockable::DefaultClock;
use rstest_bdd_macros::given;
use taskwarden::task::{
    domain::{Actor, NewTask, ProofFile, Role, Task, TaskId, UserId},
    ports::TaskRepository,
    services::CreateTaskRequest,
};

fn employee(id: u64) -> Actor {
    Actor::new(UserId::new(id), Role::Employee)
}

#[given("a pending task held by employee {holder:u64}")]
fn pending_task(world: &mut TaskRequestWorld, holder: u64) -> Result<(), eyre::Report> {
    let task = Task::new(
        TaskId::new(1),
        NewTask {
            title: "Prepare board pack".to_owned(),
            description: None,
            start_date: Utc::now() - Duration::days(2),
            due_date: Utc::now() + Duration::days(5),
            status: None,
            created_by: UserId::new(1),
            assignees: BTreeSet::from([UserId::new(holder)]),
            departments: BTreeSet::new(),
            requires_approval: false,
        },
        &DefaultClock,
    )?;
    run_async(world.tasks.store(&task)).wrap_err("store scenario task")?;
    world.task_id = Some(task.id());
    Ok(())
}

#[given("employee {requester:u64} has requested closure with {proofs:u64} proof")]
fn closure_requested(
    world: &mut TaskRequestWorld,
    requester: u64,
    proofs: u64,
) -> Result<(), eyre::Report> {
    let mut request = CreateTaskRequest::closure(world.task_id()?, employee(requester));
    for index in 0..proofs {
        request = request.with_proof(ProofFile::new(
            format!("proof-{index}.pdf"),
            "application/pdf",
            b"%PDF-1.7".to_vec(),
        ));
    }
    let created = run_async(world.workflow.create_request(request))
        .wrap_err("raise closure request in scenario setup")?;
    world.request_id = Some(created.value.id());
    Ok(())
}

#[given(r#"employee {requester:u64} has requested an extension because "{remarks}""#)]
fn extension_requested(
    world: &mut TaskRequestWorld,
    requester: u64,
    remarks: String,
) -> Result<(), eyre::Report> {
    let request = CreateTaskRequest::extension(world.task_id()?, employee(requester), remarks);
    let created = run_async(world.workflow.create_request(request))
        .wrap_err("raise extension request in scenario setup")?;
    world.request_id = Some(created.value.id());
    Ok(())
}
