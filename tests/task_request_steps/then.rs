//! Then steps for task request BDD scenarios.

use super::world::{TaskRequestWorld, run_async};
use rstest_bdd_macros::then;
use taskwarden::notification::domain::EventType;
use taskwarden::task::{domain::TaskStatus, ports::TaskRepository};

#[then(r#"the task status is "{status}""#)]
fn task_status_is(world: &TaskRequestWorld, status: String) -> Result<(), eyre::Report> {
    let expected = TaskStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid expected status in scenario: {err}"))?;
    let task = run_async(world.tasks.find_by_id(world.task_id()?))?
        .ok_or_else(|| eyre::eyre!("scenario task vanished"))?;

    if task.status() != expected {
        return Err(eyre::eyre!(
            "expected status {}, found {}",
            expected.as_str(),
            task.status().as_str()
        ));
    }
    Ok(())
}

#[then(r#"the request fails with a "{kind}" error"#)]
fn request_fails_with(world: &TaskRequestWorld, kind: String) -> Result<(), eyre::Report> {
    let result = world
        .last_result
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing request result"))?;

    match result {
        Err(err) if format!("{:?}", err.kind()) == kind => Ok(()),
        other => Err(eyre::eyre!("expected a {kind} error, got {other:?}")),
    }
}

#[then(r#"a "{event_type}" event is published"#)]
fn event_published(world: &TaskRequestWorld, event_type: String) -> Result<(), eyre::Report> {
    let expected = EventType::try_from(event_type.as_str())?;
    let published = world.sink.event_types();
    if published.last() != Some(&expected) {
        return Err(eyre::eyre!(
            "expected {expected} as the latest event, got {published:?}"
        ));
    }
    Ok(())
}

#[then(r#"no "{event_type}" event is published"#)]
fn event_not_published(world: &TaskRequestWorld, event_type: String) -> Result<(), eyre::Report> {
    let unexpected = EventType::try_from(event_type.as_str())?;
    let published = world.sink.event_types();
    if published.contains(&unexpected) {
        return Err(eyre::eyre!("{unexpected} was published: {published:?}"));
    }
    Ok(())
}
