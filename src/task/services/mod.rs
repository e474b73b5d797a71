//! Application services for task lifecycle orchestration.

mod events;
mod lifecycle;
mod reminder;
mod schedule;
mod workflow;

pub use events::WorkflowOutcome;
pub use lifecycle::{
    CreateTask, OverdueSweep, TaskLifecycleError, TaskLifecycleResult, TaskLifecycleService,
};
pub use reminder::{ReminderError, ReminderKind, ReminderRun, ReminderScheduler};
pub use schedule::{JobError, JobRunReport, JobRunner, ScheduleError, ScheduledJob};
pub use workflow::{
    ApproveTaskRequest, CreateTaskRequest, RejectTaskRequest, TaskRequestWorkflow,
    WorkflowError, WorkflowResult,
};
