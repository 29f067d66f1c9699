/*!
 * Processing Configuration
 * Job-wide settings read from the environment or assembled with builder methods
 *
 * Environment variables:
 * - EVPROC_PROCESSES: number of worker processes (default: 0, single process)
 * - EVPROC_MAX_EVENTS: stop after this many events (default: 0, unbounded)
 * - EVPROC_WAIT_POLL_MS: poll interval while waiting for children (default: 10)
 * - EVPROC_HANDLE_SIGINT: finish the current event on Ctrl+C (default: true)
 * - EVPROC_LOG_LEVEL / RUST_LOG: default log level (default: info)
 * - EVPROC_TRACE_JSON: JSON log output (default: false)
 */

use crate::core::limits::DEFAULT_WAIT_POLL_INTERVAL;
use crate::monitoring::LogLevel;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for one processing job
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingConfig {
    /// Worker processes to fork; 0 processes everything in the current process
    pub n_processes: usize,
    /// Maximum number of events; 0 means no limit
    pub max_events: u64,
    /// Sleep between checks in `wait_for_all_processes`
    pub wait_poll_interval: Duration,
    /// Install a SIGINT handler that ends processing after the current event
    pub handle_interrupts: bool,
    /// Job default log level, restored after each module callback
    pub log_level: LogLevel,
    /// Emit JSON formatted logs
    pub trace_json: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            n_processes: 0,
            max_events: 0,
            wait_poll_interval: DEFAULT_WAIT_POLL_INTERVAL,
            handle_interrupts: false,
            log_level: LogLevel::Info,
            trace_json: false,
        }
    }
}

impl ProcessingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the configuration from `EVPROC_*` environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            handle_interrupts: true,
            ..Self::default()
        };

        if let Some(value) = lookup("EVPROC_PROCESSES") {
            config.n_processes = parse_number("EVPROC_PROCESSES", &value)?;
        }
        if let Some(value) = lookup("EVPROC_MAX_EVENTS") {
            config.max_events = parse_number("EVPROC_MAX_EVENTS", &value)?;
        }
        if let Some(value) = lookup("EVPROC_WAIT_POLL_MS") {
            let millis: u64 = parse_number("EVPROC_WAIT_POLL_MS", &value)?;
            if millis == 0 {
                return Err(invalid("EVPROC_WAIT_POLL_MS", &value, "must be positive"));
            }
            config.wait_poll_interval = Duration::from_millis(millis);
        }
        if let Some(value) = lookup("EVPROC_HANDLE_SIGINT") {
            config.handle_interrupts = parse_flag("EVPROC_HANDLE_SIGINT", &value)?;
        }
        if let Some(value) = lookup("EVPROC_TRACE_JSON") {
            config.trace_json = parse_flag("EVPROC_TRACE_JSON", &value)?;
        }

        if let Some(value) = lookup("EVPROC_LOG_LEVEL") {
            config.log_level = value.parse().map_err(|_| {
                invalid("EVPROC_LOG_LEVEL", &value, "expected trace, debug, info, warn or error")
            })?;
        } else if let Some(level) = lookup("RUST_LOG").and_then(|v| v.parse().ok()) {
            // Directive lists like "evproc=debug" are left to the EnvFilter
            config.log_level = level;
        }

        Ok(config)
    }

    pub fn with_processes(mut self, n_processes: usize) -> Self {
        self.n_processes = n_processes;
        self
    }

    pub fn with_max_events(mut self, max_events: u64) -> Self {
        self.max_events = max_events;
        self
    }

    pub fn with_wait_poll_interval(mut self, interval: Duration) -> Self {
        self.wait_poll_interval = interval;
        self
    }

    pub fn with_interrupt_handling(mut self, enabled: bool) -> Self {
        self.handle_interrupts = enabled;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Whether worker processes will be forked
    pub fn parallel(&self) -> bool {
        self.n_processes > 0
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(key, value, "expected a non-negative integer"))
}

fn parse_flag(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "expected a boolean")),
    }
}
