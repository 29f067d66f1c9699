/*!
 * Monitoring
 * Structured tracing setup and per-module log level control
 */

mod log_system;
mod tracer;

pub use log_system::{LogConfig, LogLevel, LogSystem};
pub use tracer::{generate_job_id, init_tracing, JobSpan};
