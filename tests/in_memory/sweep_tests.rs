//! The overdue sweep and the daily job runner.

use std::sync::Arc;

use super::helpers::{Stack, days_from_now, recipients_of};
use chrono::NaiveTime;
use eyre::ensure;
use mockable::DefaultClock;
use taskwarden::notification::domain::EventType;
use taskwarden::task::domain::TaskStatus;
use taskwarden::task::services::{JobRunner, ScheduledJob};

#[tokio::test(flavor = "multi_thread")]
async fn overdue_task_is_delayed_once_and_announced() -> eyre::Result<()> {
    let stack = Stack::start().await?;
    let task = stack
        .create_task("Late filing", days_from_now(-6), days_from_now(-1))
        .await?;

    let sweep = stack.lifecycle.flag_overdue_tasks().await?;
    let again = stack.lifecycle.flag_overdue_tasks().await?;

    ensure!(sweep.delayed == vec![task.id()]);
    ensure!(again.delayed.is_empty());
    ensure!(again.skipped == 1);
    ensure!(stack.task(task.id()).await?.status() == TaskStatus::Delayed);

    let delivered = stack.drain(task.id(), "sweep").await?;
    ensure!(recipients_of(&delivered, EventType::TaskDelayed) == vec![2, 3, 5]);
    stack.shutdown().await
}

#[tokio::test(flavor = "multi_thread")]
async fn triggered_run_executes_every_daily_job() -> eyre::Result<()> {
    let stack = Stack::start().await?;
    let late = stack
        .create_task("Overdue report", days_from_now(-6), days_from_now(-1))
        .await?;
    let runner = JobRunner::new(NaiveTime::MIN, Arc::new(DefaultClock))
        .with_job(Arc::clone(&stack.reminders) as Arc<dyn ScheduledJob>)
        .with_job(Arc::clone(&stack.lifecycle) as Arc<dyn ScheduledJob>)
        .with_job(Arc::clone(&stack.publisher) as Arc<dyn ScheduledJob>);

    let report = runner.trigger_now().await?;

    ensure!(report.succeeded == vec!["reminders", "overdue-sweep", "outbox-drain"]);
    ensure!(report.failed.is_empty());
    ensure!(stack.task(late.id()).await?.status() == TaskStatus::Delayed);

    let delivered = stack.drain(late.id(), "runner").await?;
    ensure!(recipients_of(&delivered, EventType::Reminder) == vec![2, 3, 5]);
    ensure!(recipients_of(&delivered, EventType::TaskDelayed) == vec![2, 3, 5]);
    stack.shutdown().await
}
