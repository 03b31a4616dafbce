//! Validation rules for [`KernelConfig`](crate::types::KernelConfig).

use crate::error::{ConfigError, ConfigResult};
use crate::types::KernelConfig;

/// Validate a fully-merged configuration.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] naming the first invalid field.
pub fn validate(config: &KernelConfig) -> ConfigResult<()> {
    if mozi_core::handler::AdmissionMode::parse(&config.queue.mode).is_err() {
        return Err(ConfigError::ValidationError {
            field: "queue.mode".to_owned(),
            message: format!("unrecognized queue mode '{}'", config.queue.mode),
        });
    }
    if config.queue.poll_interval_ms < 1 {
        return Err(ConfigError::ValidationError {
            field: "queue.poll_interval_ms".to_owned(),
            message: "must be at least 1".to_owned(),
        });
    }
    if let Some(cap) = config.queue.max_backlog {
        if cap < 1 {
            return Err(ConfigError::ValidationError {
                field: "queue.max_backlog".to_owned(),
                message: "must be at least 1 when set".to_owned(),
            });
        }
    }
    if config.retry.max_retries == 0 {
        return Err(ConfigError::ValidationError {
            field: "retry.max_retries".to_owned(),
            message: "must be at least 1".to_owned(),
        });
    }
    if config.reminders.poll_ms < 250 {
        return Err(ConfigError::ValidationError {
            field: "reminders.poll_ms".to_owned(),
            message: "must be at least 250".to_owned(),
        });
    }
    if config.agent.default_agent_id.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "agent.default_agent_id".to_owned(),
            message: "must not be empty".to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&KernelConfig::default()).is_ok());
    }

    #[test]
    fn rejects_unknown_mode() {
        let mut config = KernelConfig::default();
        config.queue.mode = "bogus".to_owned();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_short_reminder_poll() {
        let mut config = KernelConfig::default();
        config.reminders.poll_ms = 10;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_zero_max_backlog() {
        let mut config = KernelConfig::default();
        config.queue.max_backlog = Some(0);
        assert!(validate(&config).is_err());
    }
}
