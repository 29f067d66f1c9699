/*!
 * Module Types
 * Capability flags, process record types and module errors
 */

use crate::datastore::StoreError;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Module operation result
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Module errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModuleError {
    /// Unrecoverable failure; aborts the whole process
    #[error("Fatal: {0}")]
    Fatal(String),

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Required parameters not set: {}", .0.join(", "))]
    MissingParameters(Vec<String>),

    #[error("Invalid condition expression '{0}'")]
    InvalidCondition(String),

    #[error("Data store: {0}")]
    Store(#[from] StoreError),
}

impl ModuleError {
    pub fn fatal(message: impl Into<String>) -> Self {
        ModuleError::Fatal(message.into())
    }
}

bitflags! {
    /// Capabilities a module declares to the framework
    ///
    /// Checked by the processor with plain set membership.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModuleProperties: u32 {
        /// Safe to run in several worker processes at once
        const PARALLEL_PROCESSING_CERTIFIED = 1 << 0;
        /// May request run boundaries (BeginRun / EndRun)
        const TRIGGERS_NEW_RUN = 1 << 1;
        /// May request the end of processing (EndOfData)
        const TRIGGERS_END_OF_DATA = 1 << 2;
        /// Reads events from outside the path
        const INPUT = 1 << 3;
        /// Writes events out of the path
        const OUTPUT = 1 << 4;
        /// Owns histogram output; needed in every process
        const HISTOGRAM_MANAGER = 1 << 5;
        /// terminate() also runs in forked children
        const TERMINATE_IN_ALL_PROCESSES = 1 << 6;
        /// Excluded from module statistics
        const DONT_COLLECT_STATISTICS = 1 << 7;
    }
}

/// Outcome a module reports for one `event()` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessRecordType {
    /// Normal event, keep going
    #[default]
    Event,
    /// Start a new run before processing further
    BeginRun,
    /// Close the current run
    EndRun,
    /// No more events
    EndOfData,
}

impl ProcessRecordType {
    /// Capability a module must carry for the request to be honored
    pub fn required_property(&self) -> Option<ModuleProperties> {
        match self {
            ProcessRecordType::Event => None,
            ProcessRecordType::BeginRun | ProcessRecordType::EndRun => {
                Some(ModuleProperties::TRIGGERS_NEW_RUN)
            }
            ProcessRecordType::EndOfData => Some(ModuleProperties::TRIGGERS_END_OF_DATA),
        }
    }

    /// Whether a module with `properties` may make this request
    pub fn authorized_for(&self, properties: ModuleProperties) -> bool {
        self.required_property()
            .map_or(true, |required| properties.contains(required))
    }
}

/// Lifecycle state of a registered module within one process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    /// Registered, not yet initialized
    Registered,
    /// initialize() succeeded
    Initialized,
    /// Left out because of a configuration error
    Skipped,
    /// terminate() has run
    Terminated,
}

impl ModuleState {
    /// Whether the module takes part in run and event callbacks
    pub fn is_active(&self) -> bool {
        matches!(self, ModuleState::Initialized)
    }
}
