//! Shared fixtures for task service tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mockable::DefaultClock;
use std::collections::BTreeSet;
use std::sync::Mutex;

use crate::notification::{
    domain::NotificationEvent,
    ports::{EventDelivery, EventSink, PublishError, PublishTurn},
    services::TaskSequencer,
};
use crate::task::domain::{Actor, NewTask, Role, Task, TaskDomainError, TaskId, UserId};

/// Event sink that records every event and answers with a fixed delivery.
#[derive(Debug)]
pub struct RecordingSink {
    delivery: EventDelivery,
    events: Mutex<Vec<NotificationEvent>>,
    turns: TaskSequencer,
}

impl RecordingSink {
    pub fn publishing() -> Self {
        Self::answering(EventDelivery::Published)
    }

    pub fn answering(delivery: EventDelivery) -> Self {
        Self {
            delivery,
            events: Mutex::new(Vec::new()),
            turns: TaskSequencer::new(),
        }
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish_or_defer(
        &self,
        event: &NotificationEvent,
    ) -> Result<EventDelivery, PublishError> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        Ok(self.delivery)
    }

    async fn acquire_turn(&self, task_id: TaskId) -> PublishTurn {
        self.turns.acquire(task_id).await
    }
}

pub fn days_from_now(days: i64) -> DateTime<Utc> {
    Utc::now() + Duration::days(days)
}

pub const fn employee(id: u64) -> Actor {
    Actor::new(UserId::new(id), Role::Employee)
}

pub const fn admin(id: u64) -> Actor {
    Actor::new(UserId::new(id), Role::Admin)
}

/// Builds a pending task created by user 1 and assigned to user 2.
pub fn task_due_in(start_days: i64, due_days: i64) -> Result<Task, TaskDomainError> {
    Task::new(
        TaskId::new(1),
        NewTask {
            title: "Quarterly audit".to_owned(),
            description: None,
            start_date: days_from_now(start_days),
            due_date: days_from_now(due_days),
            status: None,
            created_by: UserId::new(1),
            assignees: BTreeSet::from([UserId::new(2)]),
            departments: BTreeSet::new(),
            requires_approval: false,
        },
        &DefaultClock,
    )
}
