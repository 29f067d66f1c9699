/*!
 * Topology Traits
 * OS process control abstraction
 */

use super::types::{ChildExit, Forked, TopologyResult};
use crate::core::types::Pid;

/// Callback run whenever children may have exited
pub type ChildWatcher = Box<dyn Fn() + Send + 'static>;

/// Operating system process control used by `ProcessTopology`
///
/// The real implementation forks; test doubles record calls and queue exits.
pub trait ProcessControl: Send + Sync {
    /// Fork the calling process
    ///
    /// In the child, SIGCHLD handling is reset and the child is tied to the
    /// parent's lifetime before `Forked::Child` is returned.
    fn fork(&self) -> TopologyResult<Forked>;

    /// Forcefully end a child
    fn kill(&self, pid: Pid) -> TopologyResult<()>;

    /// Reap one exited child without blocking
    fn try_reap(&self) -> TopologyResult<Option<ChildExit>>;

    /// Arrange for `watcher` to run after child exits, replacing any earlier watcher
    fn watch_children(&self, watcher: ChildWatcher) -> TopologyResult<()>;

    /// Stop running the installed watcher; a no-op when none is installed
    fn unwatch_children(&self) -> TopologyResult<()>;
}
