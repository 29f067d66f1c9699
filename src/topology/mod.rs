/*!
 * Process Topology Subsystem
 * Multi-process roles, child tracking and OS process control
 */

#[cfg(unix)]
pub mod control;
pub mod handler;
#[cfg(unix)]
pub mod signals;
pub mod traits;
pub mod types;

// Re-export public API
#[cfg(unix)]
pub use control::OsProcessControl;
pub use handler::ProcessTopology;
pub use traits::{ChildWatcher, ProcessControl};
pub use types::{
    ChildExit, ExitStatus, Forked, ManagedProcess, ProcessRole, StartOutcome, TopologyError,
    TopologyResult,
};

/// Topology backed by real fork/waitpid
#[cfg(unix)]
pub type OsTopology = ProcessTopology<OsProcessControl>;
