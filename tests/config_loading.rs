//! Layered configuration loading through `figment`.

use std::time::Duration;

use figment::Jail;
use taskwarden::config::{AppConfig, CONFIG_FILE, ConfigError};

fn load() -> Result<AppConfig, ConfigError> {
    AppConfig::from_figment(&AppConfig::figment(CONFIG_FILE))
}

fn jail_error(err: &ConfigError) -> figment::Error {
    figment::Error::from(err.to_string())
}

#[test]
fn defaults_apply_without_sources() {
    Jail::expect_with(|_jail| {
        let config = load().map_err(|err| jail_error(&err))?;
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.publisher.topic, "task-notifications");
        assert_eq!(config.reminders.lookahead_days, 3);
        assert_eq!(config.transport.partitions, 4);
        Ok(())
    });
}

#[test]
fn file_overrides_defaults_and_environment_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            CONFIG_FILE,
            r#"
            [publisher]
            topic = "from-file"
            max_attempts = 7

            [reminders]
            lookahead_days = 5
            run_at = "06:30"

            [reminders.templates]
            overdue = "Late: {{ title }}"
            "#,
        )?;
        jail.set_env("TASKWARDEN_PUBLISHER__TOPIC", "from-env");
        jail.set_env("TASKWARDEN_TRANSPORT__PARTITIONS", "2");

        let config = load().map_err(|err| jail_error(&err))?;

        assert_eq!(config.publisher.topic, "from-env");
        assert_eq!(config.publisher.max_attempts, 7);
        assert_eq!(config.transport.partitions, 2);
        assert_eq!(config.reminders.lookahead_days, 5);
        assert_eq!(config.reminders.templates.overdue, "Late: {{ title }}");
        assert_eq!(
            config.reminders.templates.due_soon,
            "Due soon: {{ title }} is due on {{ due_date }}"
        );
        Ok(())
    });
}

#[test]
fn log_filter_variable_is_not_configuration() {
    Jail::expect_with(|jail| {
        jail.set_env("TASKWARDEN_LOG", "debug");
        let config = load().map_err(|err| jail_error(&err))?;
        assert_eq!(config.log.filter, "info");
        Ok(())
    });
}

#[test]
fn out_of_range_values_are_rejected() {
    Jail::expect_with(|jail| {
        jail.set_env("TASKWARDEN_TRANSPORT__PARTITIONS", "0");
        let result = load();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                field: "transport.partitions",
                ..
            })
        ));
        Ok(())
    });
}

#[test]
fn outbox_drain_interval_must_be_positive() {
    Jail::expect_with(|jail| {
        jail.set_env("TASKWARDEN_PUBLISHER__DRAIN_INTERVAL_MS", "0");
        let result = load();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                field: "publisher.drain_interval_ms",
                ..
            })
        ));
        Ok(())
    });
}

#[test]
fn malformed_run_time_is_rejected() {
    Jail::expect_with(|jail| {
        jail.set_env("TASKWARDEN_REMINDERS__RUN_AT", "25:99");
        let result = load();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                field: "reminders.run_at",
                ..
            })
        ));
        Ok(())
    });
}

#[test]
fn mistyped_value_is_a_figment_error() {
    Jail::expect_with(|jail| {
        jail.set_env("TASKWARDEN_PUBLISHER__MAX_ATTEMPTS", "many");
        assert!(matches!(load(), Err(ConfigError::Figment(_))));
        Ok(())
    });
}

#[test]
fn retry_policies_follow_configuration() {
    let config = AppConfig::default();
    assert_eq!(config.publisher.retry_policy().max_attempts(), 3);
    assert_eq!(config.fanout.retry_policy().max_attempts(), 5);
    assert_eq!(config.publisher.drain_interval(), Duration::from_secs(5));
}
