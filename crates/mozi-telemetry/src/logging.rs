//! `tracing-subscriber` setup: level, format, and per-target directives.

use std::sync::Once;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use crate::error::{TelemetryError, TelemetryResult};

static INIT: Once = Once::new();

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line, human-oriented (development default).
    #[default]
    Pretty,
    /// Single-line, human-oriented.
    Compact,
    /// Newline-delimited JSON, for machine ingestion.
    Json,
}

/// Where log lines are written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogTarget {
    /// Standard error (default).
    #[default]
    Stderr,
    /// A rolling file under the given directory, with the given file-name
    /// prefix.
    RollingFile {
        /// Directory the appender rotates files within.
        directory: String,
        /// File name prefix.
        prefix: String,
    },
}

/// Builder for the global logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    level: String,
    format: LogFormat,
    target: LogTarget,
    directives: Vec<String>,
}

impl LogConfig {
    /// Start a config at the given base level (`"trace"`, `"debug"`,
    /// `"info"`, `"warn"`, `"error"`, or a full `EnvFilter` directive
    /// string).
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::default(),
            target: LogTarget::default(),
            directives: Vec::new(),
        }
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Write to a rolling file instead of stderr.
    #[must_use]
    pub fn with_target(mut self, target: LogTarget) -> Self {
        self.target = target;
        self
    }

    /// Add a per-target filter directive, e.g. `"mozi_kernel=trace"`.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    fn env_filter(&self) -> TelemetryResult<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.level).map_err(|e| TelemetryError::InvalidDirective {
            directive: self.level.clone(),
            message: e.to_string(),
        })?;
        for directive in &self.directives {
            let parsed = directive.parse().map_err(|_| TelemetryError::InvalidDirective {
                directive: directive.clone(),
                message: "could not parse as an EnvFilter directive".to_owned(),
            })?;
            filter = filter.add_directive(parsed);
        }
        Ok(filter)
    }
}

/// Install the global tracing subscriber described by `config`.
///
/// Safe to call more than once per process; only the first call takes
/// effect, matching `tracing`'s own single-global-subscriber model.
///
/// # Errors
///
/// Returns a [`TelemetryError`] if the filter directives are invalid or the
/// configured log file cannot be opened.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.env_filter()?;

    let mut installed_ok = true;
    INIT.call_once(|| {
        let builder = tracing_subscriber::fmt().with_env_filter(filter).with_span_events(FmtSpan::CLOSE);

        let result = match (&config.target, config.format) {
            (LogTarget::Stderr, LogFormat::Json) => builder.json().with_writer(std::io::stderr).try_init(),
            (LogTarget::Stderr, LogFormat::Compact) => builder.compact().with_writer(std::io::stderr).try_init(),
            (LogTarget::Stderr, LogFormat::Pretty) => builder.pretty().with_writer(std::io::stderr).try_init(),
            (LogTarget::RollingFile { directory, prefix }, format) => {
                let appender = tracing_appender::rolling::daily(directory, prefix);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                // Leak the guard: the subscriber is global and process-lifetime,
                // so there is no later point at which it would be dropped anyway.
                std::mem::forget(guard);
                match format {
                    LogFormat::Json => builder.json().with_writer(writer).with_ansi(false).try_init(),
                    LogFormat::Compact => builder.compact().with_writer(writer).with_ansi(false).try_init(),
                    LogFormat::Pretty => builder.pretty().with_writer(writer).with_ansi(false).try_init(),
                }
            },
        };
        installed_ok = result.is_ok();
    });

    if installed_ok { Ok(()) } else { Err(TelemetryError::AlreadyInitialized) }
}

/// Install logging at `info` level with default format, for callers that
/// don't need any customization.
///
/// # Errors
///
/// Returns a [`TelemetryError`] under the same conditions as
/// [`setup_logging`].
pub fn setup_default_logging() -> TelemetryResult<()> {
    setup_logging(&LogConfig::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_directives() {
        let config = LogConfig::new("info").with_directive("mozi_kernel=debug").with_directive("mozi_storage=trace");
        assert_eq!(config.directives.len(), 2);
    }

    #[test]
    fn env_filter_rejects_malformed_directive() {
        let config = LogConfig::new("info").with_directive("not a valid directive!!");
        assert!(config.env_filter().is_err());
    }

    #[test]
    fn env_filter_accepts_well_formed_level() {
        let config = LogConfig::new("debug");
        assert!(config.env_filter().is_ok());
    }
}
