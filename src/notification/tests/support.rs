//! Shared builders for notification tests.

use chrono::{Duration, Utc};
use mockable::DefaultClock;
use std::collections::BTreeSet;

use crate::notification::domain::{EventId, EventType, NotificationEvent};
use crate::task::domain::{DepartmentId, NewTask, Task, TaskDomainError, TaskId, UserId};

pub fn event(task: u64, label: &str) -> NotificationEvent {
    NotificationEvent::new(
        EventId::derive(&["test", label]),
        EventType::Assigned,
        TaskId::new(task),
        format!("event {label}"),
        &DefaultClock,
    )
}

pub fn task_with(
    id: u64,
    assignees: &[u64],
    departments: &[u64],
) -> Result<Task, TaskDomainError> {
    Task::new(
        TaskId::new(id),
        NewTask {
            title: format!("Task {id}"),
            description: None,
            start_date: Utc::now(),
            due_date: Utc::now() + Duration::days(3),
            status: None,
            created_by: UserId::new(1),
            assignees: assignees.iter().copied().map(UserId::new).collect(),
            departments: departments
                .iter()
                .copied()
                .map(DepartmentId::new)
                .collect::<BTreeSet<_>>(),
            requires_approval: false,
        },
        &DefaultClock,
    )
}
