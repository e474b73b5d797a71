//! Daily driver for periodic jobs.
//!
//! The [`JobRunner`] runs its jobs one after another, once per day at a
//! fixed UTC wall-clock time. A single gate covers both the timer and
//! manual triggers, so two runs never overlap.

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{error, info};

/// A unit of periodic work.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    /// Stable job name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Runs the job for `today`.
    ///
    /// # Errors
    ///
    /// Returns [`JobError`] when the run fails as a whole.
    async fn run(&self, today: NaiveDate) -> Result<(), JobError>;
}

/// Failure of one job run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("job {job} failed: {reason}")]
pub struct JobError {
    /// Failing job.
    pub job: &'static str,
    /// Rendered cause.
    pub reason: String,
}

impl JobError {
    /// Creates a job error from any displayable cause.
    #[must_use]
    pub fn new(job: &'static str, cause: &impl std::fmt::Display) -> Self {
        Self {
            job,
            reason: cause.to_string(),
        }
    }
}

/// Errors returned by [`JobRunner::trigger_now`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// A run is already in flight.
    #[error("a scheduled run is already in progress")]
    AlreadyRunning,
}

/// Outcome of one pass over every job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRunReport {
    /// Date the jobs ran for.
    pub date: NaiveDate,
    /// Jobs that finished.
    pub succeeded: Vec<&'static str>,
    /// Jobs that failed.
    pub failed: Vec<JobError>,
}

/// Runs scheduled jobs sequentially, once a day.
pub struct JobRunner<C>
where
    C: Clock + Send + Sync,
{
    jobs: Vec<Arc<dyn ScheduledJob>>,
    run_at: NaiveTime,
    clock: Arc<C>,
    gate: Mutex<()>,
}

impl<C> JobRunner<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a runner firing daily at `run_at` UTC.
    #[must_use]
    pub fn new(run_at: NaiveTime, clock: Arc<C>) -> Self {
        Self {
            jobs: Vec::new(),
            run_at,
            clock,
            gate: Mutex::new(()),
        }
    }

    /// Appends a job; jobs run in the order they were added.
    #[must_use]
    pub fn with_job(mut self, job: Arc<dyn ScheduledJob>) -> Self {
        self.jobs.push(job);
        self
    }

    /// Returns the job names in run order.
    #[must_use]
    pub fn job_names(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|job| job.name()).collect()
    }

    /// Returns the first scheduled instant strictly after `now`.
    #[must_use]
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.run_at).and_utc();
        if today > now {
            return today;
        }
        now.date_naive()
            .checked_add_days(Days::new(1))
            .map_or(today, |tomorrow| tomorrow.and_time(self.run_at).and_utc())
    }

    /// Runs every job now, unless a run is already in flight.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::AlreadyRunning`] while another run holds the
    /// gate.
    pub async fn trigger_now(&self) -> Result<JobRunReport, ScheduleError> {
        let _guard = self
            .gate
            .try_lock()
            .map_err(|_| ScheduleError::AlreadyRunning)?;
        Ok(self.run_jobs(self.clock.utc().date_naive()).await)
    }

    /// Fires the jobs every day at `run_at` until `shutdown` turns `true`
    /// or its sender is dropped.
    pub async fn run(&self, shutdown: &mut watch::Receiver<bool>) {
        info!(run_at = %self.run_at, jobs = self.jobs.len(), "job runner started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let now = self.clock.utc();
            let wait = (self.next_run_after(now) - now)
                .to_std()
                .unwrap_or(Duration::ZERO);
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = tokio::time::sleep(wait) => {
                    let _guard = self.gate.lock().await;
                    self.run_jobs(self.clock.utc().date_naive()).await;
                }
            }
        }
        info!("job runner stopped");
    }

    async fn run_jobs(&self, today: NaiveDate) -> JobRunReport {
        let mut report = JobRunReport {
            date: today,
            succeeded: Vec::new(),
            failed: Vec::new(),
        };
        for job in &self.jobs {
            match job.run(today).await {
                Ok(()) => report.succeeded.push(job.name()),
                Err(err) => {
                    error!(job = job.name(), error = %err, "scheduled job failed");
                    report.failed.push(err);
                }
            }
        }
        info!(
            date = %today,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "scheduled run finished"
        );
        report
    }
}
