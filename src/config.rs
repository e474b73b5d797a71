//! Layered daemon configuration.
//!
//! Sources, lowest priority first:
//!
//! 1. built-in defaults
//! 2. `taskwarden.toml` in the working directory (optional)
//! 3. `TASKWARDEN_*` environment variables, `__` separating sections
//!    (`TASKWARDEN_PUBLISHER__TOPIC` sets `publisher.topic`)
//!
//! `TASKWARDEN_LOG` is reserved for the tracing filter and is not read as
//! configuration.

use chrono::NaiveTime;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::notification::services::RetryPolicy;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "taskwarden.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "TASKWARDEN_";

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Event publisher settings.
    #[serde(default)]
    pub publisher: PublisherConfig,
    /// Fan-out consumer settings.
    #[serde(default)]
    pub fanout: FanOutConfig,
    /// In-process transport settings.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Reminder scheduler settings.
    #[serde(default)]
    pub reminders: ReminderConfig,
    /// Notification store settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// Event publisher settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Topic events are published to.
    pub topic: String,
    /// Publish attempts before an event is deferred.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Pause between outbox drains, in milliseconds.
    pub drain_interval_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            topic: "task-notifications".to_owned(),
            max_attempts: 3,
            retry_base_delay_ms: 50,
            drain_interval_ms: 5_000,
        }
    }
}

impl PublisherConfig {
    /// Returns the publish retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }

    /// Returns the pause between outbox drains.
    #[must_use]
    pub const fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }
}

/// Fan-out consumer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanOutConfig {
    /// Processing attempts before a delivery is dead-lettered.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub retry_base_delay_ms: u64,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_base_delay_ms: 100,
        }
    }
}

impl FanOutConfig {
    /// Returns the processing retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }
}

/// In-process transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Partitions per topic.
    pub partitions: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { partitions: 4 }
    }
}

/// Reminder scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Days ahead of today covered by the start and due scans.
    pub lookahead_days: u32,
    /// UTC wall-clock time of the daily run, `HH:MM`.
    pub run_at: String,
    /// Message templates.
    pub templates: ReminderTemplates,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            lookahead_days: 3,
            run_at: "08:00".to_owned(),
            templates: ReminderTemplates::default(),
        }
    }
}

impl ReminderConfig {
    /// Parses [`ReminderConfig::run_at`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the value is not `HH:MM`.
    pub fn run_at_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(self.run_at.trim(), "%H:%M").map_err(|err| {
            ConfigError::InvalidValue {
                field: "reminders.run_at",
                reason: err.to_string(),
            }
        })
    }
}

/// Minijinja templates for reminder messages.
///
/// Each template sees `title`, `task_id`, `start_date` and `due_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderTemplates {
    /// Task starts within the window.
    pub starting_soon: String,
    /// Task is due within the window.
    pub due_soon: String,
    /// Task is past its due date.
    pub overdue: String,
}

impl Default for ReminderTemplates {
    fn default() -> Self {
        Self {
            starting_soon: "Starting soon: {{ title }} starts on {{ start_date }}".to_owned(),
            due_soon: "Due soon: {{ title }} is due on {{ due_date }}".to_owned(),
            overdue: "Overdue: {{ title }} was due on {{ due_date }}".to_owned(),
        }
    }
}

/// Notification store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL; the in-memory store is used when unset.
    pub url: Option<String>,
    /// Maximum pooled connections.
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: 8,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default `tracing` filter directive.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from defaults, `taskwarden.toml` and the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a source cannot be parsed or a value is
    /// out of range.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment(CONFIG_FILE))
    }

    /// Builds the provider chain with `path` as the file layer.
    #[must_use]
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["log"]))
    }

    /// Extracts and validates configuration from `figment`.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::load`].
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.publisher.topic.trim().is_empty() {
            return Err(ConfigError::invalid("publisher.topic", "must not be empty"));
        }
        if self.publisher.max_attempts == 0 {
            return Err(ConfigError::invalid(
                "publisher.max_attempts",
                "must be at least 1",
            ));
        }
        if self.publisher.drain_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "publisher.drain_interval_ms",
                "must be at least 1",
            ));
        }
        if self.fanout.max_attempts == 0 {
            return Err(ConfigError::invalid("fanout.max_attempts", "must be at least 1"));
        }
        if self.transport.partitions == 0 {
            return Err(ConfigError::invalid(
                "transport.partitions",
                "must be at least 1",
            ));
        }
        self.reminders.run_at_time()?;
        Ok(())
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A provider could not be read or the merged data does not fit.
    #[error("configuration error: {0}")]
    Figment(Box<figment::Error>),

    /// A field holds a value outside its accepted range.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// Dotted path of the field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: &str) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.to_owned(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}
