//! Reminder scheduler: a time-triggered producer of `REMINDER` events.
//!
//! A run scans the task store three times (tasks starting within the
//! look-ahead window, tasks due within it, and overdue tasks) and raises one
//! event per match. It never changes a task. Event identifiers are derived
//! from the task, the reminder kind and the run date, so a second run on the
//! same day republishes identical events and the fan-out stores no
//! duplicates.

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use minijinja::{Environment, context};
use mockable::Clock;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::events::emit;
use super::schedule::{JobError, ScheduledJob};
use crate::config::{ReminderConfig, ReminderTemplates};
use crate::notification::{
    domain::{EventId, EventType, NotificationEvent},
    ports::{EventDelivery, EventSink},
};
use crate::task::{
    domain::Task,
    ports::{TaskRepository, TaskRepositoryError},
};

/// Which scan matched a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReminderKind {
    /// The task starts within the window.
    StartingSoon,
    /// The task is due within the window.
    DueSoon,
    /// The task is past its due date.
    Overdue,
}

impl ReminderKind {
    /// Returns the canonical tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StartingSoon => "STARTING_SOON",
            Self::DueSoon => "DUE_SOON",
            Self::Overdue => "OVERDUE",
        }
    }
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the reminder scheduler.
#[derive(Debug, Clone, Error)]
pub enum ReminderError {
    /// A configured template does not parse or render.
    #[error("reminder template '{name}' is invalid: {reason}")]
    Template {
        /// Template name.
        name: &'static str,
        /// Parser or renderer message.
        reason: String,
    },

    /// The window end lies outside the supported calendar.
    #[error("reminder window starting {0} is out of range")]
    DateOutOfRange(NaiveDate),

    /// A scan failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
}

/// Counts from one scheduler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderRun {
    /// Run date.
    pub date: NaiveDate,
    /// Tasks starting within the window.
    pub starting_soon: usize,
    /// Tasks due within the window.
    pub due_soon: usize,
    /// Overdue tasks.
    pub overdue: usize,
    /// Events the transport accepted.
    pub published: usize,
    /// Events parked in the outbox.
    pub deferred: usize,
    /// Events that could not be rendered or handed off.
    pub failed: usize,
}

impl ReminderRun {
    const fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            starting_soon: 0,
            due_soon: 0,
            overdue: 0,
            published: 0,
            deferred: 0,
            failed: 0,
        }
    }

    /// Returns the number of matched tasks across all scans.
    #[must_use]
    pub const fn matched(&self) -> usize {
        self.starting_soon
            .saturating_add(self.due_soon)
            .saturating_add(self.overdue)
    }

    const fn record(&mut self, delivery: EventDelivery) {
        match delivery {
            EventDelivery::Published => self.published = self.published.saturating_add(1),
            EventDelivery::Deferred => self.deferred = self.deferred.saturating_add(1),
            EventDelivery::Failed => self.failed = self.failed.saturating_add(1),
        }
    }
}

/// Scans for upcoming, due and overdue tasks and raises reminders.
#[derive(Clone)]
pub struct ReminderScheduler<R, E, C>
where
    R: TaskRepository,
    E: EventSink,
    C: Clock + Send + Sync,
{
    tasks: Arc<R>,
    events: Arc<E>,
    clock: Arc<C>,
    lookahead_days: u32,
    environment: Environment<'static>,
}

impl<R, E, C> ReminderScheduler<R, E, C>
where
    R: TaskRepository,
    E: EventSink,
    C: Clock + Send + Sync,
{
    /// Creates a scheduler, compiling every template once.
    ///
    /// # Errors
    ///
    /// Returns [`ReminderError::Template`] for a template with a syntax
    /// error.
    pub fn new(
        tasks: Arc<R>,
        events: Arc<E>,
        clock: Arc<C>,
        config: &ReminderConfig,
    ) -> Result<Self, ReminderError> {
        let mut environment = Environment::new();
        for kind in [
            ReminderKind::StartingSoon,
            ReminderKind::DueSoon,
            ReminderKind::Overdue,
        ] {
            let source = template_for(&config.templates, kind).to_owned();
            environment
                .add_template_owned(template_name(kind), source)
                .map_err(|err| template_error(kind, &err))?;
        }
        Ok(Self {
            tasks,
            events,
            clock,
            lookahead_days: config.lookahead_days,
            environment,
        })
    }

    /// Returns the look-ahead window in days.
    #[must_use]
    pub const fn lookahead_days(&self) -> u32 {
        self.lookahead_days
    }

    /// Runs the three scans for `today`.
    ///
    /// The start and due scans cover `today` through `today +
    /// lookahead_days`, both inclusive; the overdue scan covers due dates
    /// before `today`. Rendering or hand-off failures for single tasks are
    /// counted, not returned.
    ///
    /// # Errors
    ///
    /// Returns [`ReminderError::Repository`] when a scan fails.
    pub async fn run_once(&self, today: NaiveDate) -> Result<ReminderRun, ReminderError> {
        let window_start = start_of(today);
        let window_end = today
            .checked_add_days(Days::new(u64::from(self.lookahead_days).saturating_add(1)))
            .map(start_of)
            .ok_or(ReminderError::DateOutOfRange(today))?;

        let starting = self
            .tasks
            .find_starting_between(window_start, window_end)
            .await?;
        let due = self.tasks.find_due_between(window_start, window_end).await?;
        let overdue = self.tasks.find_overdue(window_start).await?;

        let mut run = ReminderRun::empty(today);
        run.starting_soon = starting.len();
        run.due_soon = due.len();
        run.overdue = overdue.len();

        for (kind, tasks) in [
            (ReminderKind::StartingSoon, starting),
            (ReminderKind::DueSoon, due),
            (ReminderKind::Overdue, overdue),
        ] {
            for task in tasks {
                match self.reminder_event(kind, &task, today) {
                    Ok(event) => {
                        let _turn = self.events.acquire_turn(task.id()).await;
                        run.record(emit(&*self.events, &event).await);
                    }
                    Err(err) => {
                        warn!(task_id = %task.id(), kind = %kind, error = %err, "reminder skipped");
                        run.failed = run.failed.saturating_add(1);
                    }
                }
            }
        }

        info!(
            date = %today,
            starting_soon = run.starting_soon,
            due_soon = run.due_soon,
            overdue = run.overdue,
            deferred = run.deferred,
            failed = run.failed,
            "reminder run finished"
        );
        Ok(run)
    }

    /// Builds the reminder event for one matched task.
    fn reminder_event(
        &self,
        kind: ReminderKind,
        task: &Task,
        today: NaiveDate,
    ) -> Result<NotificationEvent, ReminderError> {
        let message = self
            .environment
            .get_template(template_name(kind))
            .and_then(|template| {
                template.render(context! {
                    title => task.title(),
                    task_id => task.id().value(),
                    start_date => task.start_date().date_naive().to_string(),
                    due_date => task.due_date().date_naive().to_string(),
                })
            })
            .map_err(|err| template_error(kind, &err))?;
        let task_id = task.id().to_string();
        let date = today.to_string();
        let event_id = EventId::derive(&["reminder", &task_id, kind.as_str(), &date]);
        Ok(NotificationEvent::new(
            event_id,
            EventType::Reminder,
            task.id(),
            message,
            &*self.clock,
        ))
    }
}

#[async_trait]
impl<R, E, C> ScheduledJob for ReminderScheduler<R, E, C>
where
    R: TaskRepository,
    E: EventSink,
    C: Clock + Send + Sync,
{
    fn name(&self) -> &'static str {
        "reminders"
    }

    async fn run(&self, today: NaiveDate) -> Result<(), JobError> {
        self.run_once(today)
            .await
            .map(|_| ())
            .map_err(|err| JobError::new(self.name(), &err))
    }
}

const fn template_for(templates: &ReminderTemplates, kind: ReminderKind) -> &str {
    match kind {
        ReminderKind::StartingSoon => templates.starting_soon.as_str(),
        ReminderKind::DueSoon => templates.due_soon.as_str(),
        ReminderKind::Overdue => templates.overdue.as_str(),
    }
}

const fn template_name(kind: ReminderKind) -> &'static str {
    match kind {
        ReminderKind::StartingSoon => "starting_soon",
        ReminderKind::DueSoon => "due_soon",
        ReminderKind::Overdue => "overdue",
    }
}

fn template_error(kind: ReminderKind, err: &minijinja::Error) -> ReminderError {
    ReminderError::Template {
        name: template_name(kind),
        reason: err.to_string(),
    }
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}
