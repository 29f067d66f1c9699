/*!
 * Topology Types
 * Process roles, slot records, exit reports and topology errors
 */

use crate::core::limits::{
    INIT_PROC_ID, INPUT_PROC_ID, MONITOR_PROC_ID, OUTPUT_PROC_ID, PROXY_PROC_ID,
    WORKER_PROC_ID_BASE,
};
use crate::core::types::{Pid, ProcId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Topology operation result
pub type TopologyResult<T> = Result<T, TopologyError>;

/// Process topology errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Process table already initialized with {slots} slots")]
    AlreadyInitialized { slots: usize },

    #[error("Process table not initialized")]
    NotInitialized,

    #[error("No free process slot (capacity {capacity})")]
    SlotTableFull { capacity: usize },

    #[error("A {0} process has already been started")]
    AlreadyStarted(ProcessRole),

    #[error("Unknown process id {0}")]
    UnknownPid(Pid),

    #[error("fork failed: {0}")]
    ForkFailed(String),

    #[error("Failed to kill process {pid}: {reason}")]
    KillFailed { pid: Pid, reason: String },

    #[error("waitpid failed: {0}")]
    WaitFailed(String),

    #[error("Signal setup failed: {0}")]
    SignalSetup(String),
}

/// Role a process plays in the topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ProcessRole {
    /// No role assigned yet (single-process mode or parent before forking)
    Init = 0,
    Input = 1,
    Worker = 2,
    Output = 3,
    Proxy = 4,
    Monitor = 5,
}

impl ProcessRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessRole::Init => "init",
            ProcessRole::Input => "input",
            ProcessRole::Worker => "worker",
            ProcessRole::Output => "output",
            ProcessRole::Proxy => "proxy",
            ProcessRole::Monitor => "monitor",
        }
    }

    #[inline]
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ProcessRole::Input,
            2 => ProcessRole::Worker,
            3 => ProcessRole::Output,
            4 => ProcessRole::Proxy,
            5 => ProcessRole::Monitor,
            _ => ProcessRole::Init,
        }
    }

    /// Framework process id for this role; `worker` is the worker index
    pub fn proc_id(&self, worker: usize) -> ProcId {
        match self {
            ProcessRole::Init => INIT_PROC_ID,
            ProcessRole::Input => INPUT_PROC_ID,
            ProcessRole::Output => OUTPUT_PROC_ID,
            ProcessRole::Proxy => PROXY_PROC_ID,
            ProcessRole::Monitor => MONITOR_PROC_ID,
            ProcessRole::Worker => {
                WORKER_PROC_ID_BASE.saturating_add(i32::try_from(worker).unwrap_or(i32::MAX))
            }
        }
    }
}

impl std::fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A forked child tracked by the parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedProcess {
    pub pid: Pid,
    pub role: ProcessRole,
}

/// How a child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    Exited(i32),
    Signaled(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Exited(0))
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "exit code {}", code),
            ExitStatus::Signaled(signal) => write!(f, "killed by signal {}", signal),
        }
    }
}

/// A reaped child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    pub pid: Pid,
    pub status: ExitStatus,
}

impl ChildExit {
    pub fn new(pid: Pid, status: ExitStatus) -> Self {
        Self { pid, status }
    }
}

/// Result of a raw fork
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forked {
    Parent { child: Pid },
    Child,
}

/// Result of starting a role
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// Still in the parent; children were forked with these pids
    Parent { pids: Vec<Pid> },
    /// Running in a freshly forked child
    Child { role: ProcessRole, proc_id: ProcId },
    /// The current process took the role without forking
    Tagged { role: ProcessRole, proc_id: ProcId },
}

impl StartOutcome {
    /// Whether the caller should now run the role's work
    pub fn runs_role(&self) -> bool {
        !matches!(self, StartOutcome::Parent { .. })
    }

    pub fn is_child(&self) -> bool {
        matches!(self, StartOutcome::Child { .. })
    }
}
