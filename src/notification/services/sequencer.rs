//! Per-task turns that keep commit order and publish order aligned.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as TurnLock;

use crate::notification::ports::PublishTurn;
use crate::task::domain::TaskId;

/// Grants one [`PublishTurn`] per task at a time.
///
/// Waiters are served first come, first served, so producers of the same
/// task commit and publish in the order they asked for their turn. Tasks
/// nobody holds or waits for are forgotten on the next acquisition.
#[derive(Debug, Default)]
pub struct TaskSequencer {
    turns: Mutex<HashMap<TaskId, Arc<TurnLock<()>>>>,
}

impl TaskSequencer {
    /// Creates a sequencer with no tasks in flight.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the turn of `task_id`.
    pub async fn acquire(&self, task_id: TaskId) -> PublishTurn {
        let lock = {
            let mut turns = self.turns.lock().unwrap_or_else(PoisonError::into_inner);
            turns.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(turns.entry(task_id).or_default())
        };
        lock.lock_owned().await
    }

    /// Returns the number of tasks whose turn is held or awaited.
    #[must_use]
    pub fn tasks_in_flight(&self) -> usize {
        let turns = self.turns.lock().unwrap_or_else(PoisonError::into_inner);
        turns
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }
}
