/*!
 * Core Types
 * Common types used across the framework
 */

/// OS process ID as returned by fork/waitpid
pub type Pid = i32;

/// Framework-level process identifier (see `topology` for the numbering)
pub type ProcId = i32;

/// Experiment number
pub type Experiment = u32;

/// Run number
pub type RunNumber = u32;

/// Event number within a run
pub type EventNumber = u64;

/// Common result type for framework operations
pub type FrameworkResult<T> = Result<T, super::errors::FrameworkError>;

/// Callback stage of the module lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initialize,
    BeginRun,
    Event,
    EndRun,
    Terminate,
}

impl Stage {
    /// All stages in lifecycle order
    pub const ALL: [Stage; 5] = [
        Stage::Initialize,
        Stage::BeginRun,
        Stage::Event,
        Stage::EndRun,
        Stage::Terminate,
    ];

    /// Index into per-stage arrays
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initialize => "initialize",
            Stage::BeginRun => "begin_run",
            Stage::Event => "event",
            Stage::EndRun => "end_run",
            Stage::Terminate => "terminate",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
