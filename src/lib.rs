/*!
 * Event Processing Framework Library
 * Module chains, run transitions and multi-process event processing
 */

pub mod config;
pub mod core;
pub mod datastore;
pub mod module;
pub mod modules;
pub mod monitoring;
pub mod path;
pub mod processor;
pub mod topology;

// Re-exports
pub use config::{ConfigError, ProcessingConfig};
pub use core::errors::FrameworkError;
pub use core::types::{FrameworkResult, Stage};
pub use datastore::{DataStore, Durability, EventMetaData};
pub use module::{
    AfterConditionPath, Module, ModuleCondition, ModuleError, ModuleInfo, ModuleProperties,
    ModuleResult, ProcessRecordType,
};
pub use monitoring::{generate_job_id, init_tracing, JobSpan, LogConfig, LogLevel};
pub use path::{split_path, ModuleId, PathGraph, PathId};
pub use processor::{
    EventBridge, EventProcessor, ParallelProcessor, ProcessOutcome, ProcessSummary, StopReason,
};
#[cfg(unix)]
pub use topology::{OsProcessControl, OsTopology};
pub use topology::{ProcessControl, ProcessRole, ProcessTopology};
