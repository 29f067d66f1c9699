/*!
 * Log System
 * Per-module log level overrides applied around each module callback
 */

use super::tracer::{base_directives, filter_handle};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    /// EnvFilter directive for this level
    pub fn directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Trace,
            1 => LogLevel::Debug,
            2 => LogLevel::Info,
            3 => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" | "fatal" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.directive())
    }
}

/// Logging overrides of a single module
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Level used while this module runs; `None` keeps the job default
    pub level: Option<LogLevel>,
    /// Verbosity hint for the module's own debug output
    pub debug_level: u32,
}

impl LogConfig {
    pub fn with_level(level: LogLevel) -> Self {
        Self {
            level: Some(level),
            debug_level: 0,
        }
    }

    pub fn with_debug_level(mut self, debug_level: u32) -> Self {
        self.debug_level = debug_level;
        self
    }
}

/// Replace the default level in `base` with `level`, keeping target directives
pub(crate) fn override_directives(base: &str, level: LogLevel) -> String {
    let mut directives = vec![level.directive()];
    directives.extend(
        base.split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty() && !is_level_directive(d)),
    );
    directives.join(",")
}

fn is_level_directive(directive: &str) -> bool {
    directive.eq_ignore_ascii_case("off") || directive.parse::<LogLevel>().is_ok()
}

/// Switches the process-wide log level when control enters and leaves modules
pub struct LogSystem {
    default_level: LogLevel,
    current: AtomicU8,
    overridden: AtomicU8,
}

impl LogSystem {
    pub fn new(default_level: LogLevel) -> Self {
        Self {
            default_level,
            current: AtomicU8::new(default_level as u8),
            overridden: AtomicU8::new(0),
        }
    }

    pub fn default_level(&self) -> LogLevel {
        self.default_level
    }

    /// Level in effect right now
    pub fn current_level(&self) -> LogLevel {
        LogLevel::from_u8(self.current.load(Ordering::Relaxed))
    }

    /// Apply a module's override before one of its callbacks
    pub fn enter_module(&self, config: &LogConfig) {
        match config.level {
            Some(level) if level != self.current_level() => {
                self.current.store(level as u8, Ordering::Relaxed);
                self.overridden.store(1, Ordering::Relaxed);
                let base = base_directives().unwrap_or(self.default_level.directive());
                self.reload(&override_directives(base, level));
            }
            _ => {}
        }
    }

    /// Restore the job default after a module callback
    pub fn leave_module(&self) {
        if self.overridden.swap(0, Ordering::Relaxed) == 0 {
            return;
        }
        self.current
            .store(self.default_level as u8, Ordering::Relaxed);
        let directives = base_directives().unwrap_or(self.default_level.directive());
        self.reload(directives);
    }

    fn reload(&self, directives: &str) {
        // No-op unless init_tracing installed the reloadable filter
        if let Some(handle) = filter_handle() {
            if let Err(e) = handle.reload(EnvFilter::new(directives)) {
                warn!(error = %e, "Failed to switch log level");
            }
        }
    }
}

impl Default for LogSystem {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}
