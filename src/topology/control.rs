/*!
 * OS Process Control
 * fork, waitpid and kill through nix
 */

use super::signals;
use super::traits::{ChildWatcher, ProcessControl};
use super::types::{ChildExit, ExitStatus, Forked, TopologyError, TopologyResult};
use crate::core::types::Pid;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, getpid, getppid, ForkResult, Pid as NixPid};
use tracing::{error, warn};

/// Real process control for Unix systems
#[derive(Debug, Default, Clone, Copy)]
pub struct OsProcessControl;

impl OsProcessControl {
    pub fn new() -> Self {
        Self
    }

    /// Tie the child to the parent's lifetime
    fn arm_parent_death_signal(parent: NixPid) {
        #[cfg(target_os = "linux")]
        {
            // SAFETY: PR_SET_PDEATHSIG takes a signal number and has no memory effects
            let rc = unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGHUP as libc::c_ulong) };
            if rc != 0 {
                warn!(error = %Errno::last(), "PR_SET_PDEATHSIG failed");
            }
        }

        // The parent may have exited before prctl took effect
        if getppid() != parent {
            error!(parent = parent.as_raw(), "Parent exited during fork");
            // SAFETY: leave the forked child without running the parent's exit handlers
            unsafe { libc::_exit(1) };
        }
    }
}

impl ProcessControl for OsProcessControl {
    fn fork(&self) -> TopologyResult<Forked> {
        let parent = getpid();
        // SAFETY: the child only resets signals, closes the reaper pipe and sets
        // atomics before returning. The reaper thread is started after the last
        // fork (`ProcessTopology::install_reaper`), so no framework thread can
        // hold a lock the child inherits.
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => Ok(Forked::Parent {
                child: child.as_raw(),
            }),
            Ok(ForkResult::Child) => {
                signals::reset_child_signals()?;
                Self::arm_parent_death_signal(parent);
                Ok(Forked::Child)
            }
            Err(e) => Err(TopologyError::ForkFailed(e.to_string())),
        }
    }

    fn kill(&self, pid: Pid) -> TopologyResult<()> {
        match kill(NixPid::from_raw(pid), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(TopologyError::KillFailed {
                pid,
                reason: e.to_string(),
            }),
        }
    }

    fn try_reap(&self) -> TopologyResult<Option<ChildExit>> {
        loop {
            match waitpid(NixPid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(pid, code)) => {
                    return Ok(Some(ChildExit::new(pid.as_raw(), ExitStatus::Exited(code))));
                }
                Ok(WaitStatus::Signaled(pid, signal, _core)) => {
                    let status = ExitStatus::Signaled(signal as i32);
                    return Ok(Some(ChildExit::new(pid.as_raw(), status)));
                }
                Ok(WaitStatus::StillAlive) | Err(Errno::ECHILD) => return Ok(None),
                // Stop/continue notifications are not exits
                Ok(_) | Err(Errno::EINTR) => {}
                Err(e) => return Err(TopologyError::WaitFailed(e.to_string())),
            }
        }
    }

    fn watch_children(&self, watcher: ChildWatcher) -> TopologyResult<()> {
        signals::install_child_watcher(watcher)
    }

    fn unwatch_children(&self) -> TopologyResult<()> {
        signals::remove_child_watcher()
    }
}
