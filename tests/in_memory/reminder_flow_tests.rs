//! Reminder runs observed through the fan-out consumer.

use super::helpers::{COLLEAGUE, HEAD, REQUESTER, Stack, days_from_now, recipients_of};
use chrono::Utc;
use eyre::ensure;
use taskwarden::notification::domain::EventType;
use taskwarden::task::domain::UserId;

#[tokio::test(flavor = "multi_thread")]
async fn due_soon_reminder_reaches_assignees_and_head() -> eyre::Result<()> {
    let stack = Stack::start().await?;
    let task = stack
        .create_task("Quarterly audit", days_from_now(-5), days_from_now(3))
        .await?;
    stack.drain(task.id(), "created").await?;
    let mut live = stack.push.connect(UserId::new(HEAD));

    let run = stack.reminders.run_once(Utc::now().date_naive()).await?;

    ensure!(run.due_soon == 1);
    ensure!(run.starting_soon == 0);
    ensure!(run.overdue == 0);
    ensure!(run.published == 1);

    let delivered = stack.drain(task.id(), "reminder").await?;
    ensure!(
        recipients_of(&delivered, EventType::Reminder) == vec![REQUESTER, COLLEAGUE, HEAD]
    );
    let reminder = delivered
        .iter()
        .find(|n| n.event_type() == EventType::Reminder)
        .ok_or_else(|| eyre::eyre!("no reminder stored"))?;
    ensure!(
        reminder.message().starts_with("Due soon: Quarterly audit"),
        "unexpected message {}",
        reminder.message()
    );
    let pushed = live.try_recv()?;
    ensure!(pushed.event_type == EventType::Reminder);
    stack.shutdown().await
}

#[tokio::test(flavor = "multi_thread")]
async fn rerun_on_same_day_is_absorbed_by_the_inbox() -> eyre::Result<()> {
    let stack = Stack::start().await?;
    let task = stack
        .create_task("Renew certificates", days_from_now(-5), days_from_now(2))
        .await?;
    let today = Utc::now().date_naive();

    stack.reminders.run_once(today).await?;
    stack.reminders.run_once(today).await?;

    let delivered = stack.drain(task.id(), "rerun").await?;
    ensure!(recipients_of(&delivered, EventType::Reminder).len() == 3);
    ensure!(stack.inbox.unread_count(UserId::new(REQUESTER)).await? == 3);
    stack.shutdown().await
}
