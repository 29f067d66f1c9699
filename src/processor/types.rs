/*!
 * Processor Types
 * Loop state, stop reasons and the job summary
 */

use crate::core::types::ProcId;
use crate::datastore::EventMetaData;
use crate::module::ModuleStatistics;
use crate::topology::ProcessRole;
use serde::{Deserialize, Serialize};

/// State of the event loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorState {
    #[default]
    Running,
    AwaitingBeginRun,
    AwaitingEndRun,
    Terminated,
}

/// Why the event loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A module with `TRIGGERS_END_OF_DATA` requested it
    EndOfData,
    /// The configured event limit was reached
    MaxEvents,
    /// SIGINT was received
    Interrupted,
}

/// Outcome of one traversal of the start path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Traversal {
    Completed,
    EndOfData,
    BeginRun,
    EndRun,
}

/// What a process did during one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub role: ProcessRole,
    pub proc_id: ProcId,
    pub events_processed: u64,
    pub runs: u64,
    pub stop_reason: Option<StopReason>,
    pub last_event: EventMetaData,
    pub modules: Vec<ModuleStatistics>,
    /// Sum over all modules
    pub total: ModuleStatistics,
}

/// Result of `ParallelProcessor::process`
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// The calling process ran the job to the end
    Completed(ProcessSummary),
    /// A forked child finished its role; the caller must exit with `exit_code`
    ChildFinished { role: ProcessRole, exit_code: i32 },
}
