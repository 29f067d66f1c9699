/*!
 * Structured Tracing
 * Subscriber setup and job spans using the tracing crate
 *
 * Features:
 * - Reloadable level filter so module log overrides take effect immediately
 * - JSON-formatted logs for structured parsing
 * - Job IDs for correlating the output of forked processes
 */

use super::log_system::LogLevel;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{debug, info, span, Level, Span};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter,
    Registry,
};
use uuid::Uuid;

/// Handle used by the log system to swap the active filter
pub(crate) type FilterHandle = reload::Handle<EnvFilter, Registry>;

static FILTER_HANDLE: OnceLock<FilterHandle> = OnceLock::new();
static BASE_DIRECTIVES: OnceLock<String> = OnceLock::new();

pub(crate) fn filter_handle() -> Option<&'static FilterHandle> {
    FILTER_HANDLE.get()
}

/// Filter directives the job started with (RUST_LOG or the configured level)
pub(crate) fn base_directives() -> Option<&'static str> {
    BASE_DIRECTIVES.get().map(String::as_str)
}

/// Initialize structured tracing
///
/// RUST_LOG directives take precedence over `level`. Returns false when a
/// global subscriber was already installed, in which case per-module level
/// switching stays disabled.
pub fn init_tracing(level: LogLevel, json: bool) -> bool {
    let directives = std::env::var("RUST_LOG")
        .ok()
        .filter(|d| EnvFilter::try_new(d).is_ok())
        .unwrap_or_else(|| level.directive().to_string());

    let (filter, handle) = reload::Layer::new(EnvFilter::new(&directives));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        let _ = FILTER_HANDLE.set(handle);
        let _ = BASE_DIRECTIVES.set(directives);
        info!(json, "Structured tracing initialized");
    }
    installed
}

/// Generate a unique job ID for log correlation
pub fn generate_job_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one processing job in one process
pub struct JobSpan {
    span: Span,
    start: Instant,
    job_id: String,
}

impl JobSpan {
    pub fn new(role: &str) -> Self {
        Self::with_id(generate_job_id(), role)
    }

    /// Reuse a job ID, e.g. one inherited by a forked child
    pub fn with_id(job_id: String, role: &str) -> Self {
        let span = span!(
            Level::INFO,
            "job",
            job_id = %job_id,
            role = role,
            events = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            job_id,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn record_events(&self, events: u64) {
        self.span.record("events", events);
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for JobSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_ms", duration.as_millis() as u64);
        debug!(job_id = %self.job_id, duration_ms = duration.as_millis() as u64, "job finished");
    }
}
