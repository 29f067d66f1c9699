/*!
 * Fake Process Control
 * Records forks and kills; exits are queued by hand or on fork
 */

use evproc::core::types::Pid;
use evproc::topology::{
    ChildExit, ChildWatcher, ExitStatus, Forked, ProcessControl, TopologyError, TopologyResult,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

pub struct FakeControl {
    next_pid: AtomicI32,
    forks: AtomicUsize,
    exit_on_fork: bool,
    child_on_fork: Option<usize>,
    fail_on_fork: Option<usize>,
    exits: Mutex<VecDeque<ChildExit>>,
    killed: Mutex<Vec<Pid>>,
    watcher: Mutex<Option<ChildWatcher>>,
}

impl FakeControl {
    pub fn new() -> Self {
        Self {
            next_pid: AtomicI32::new(1000),
            forks: AtomicUsize::new(0),
            exit_on_fork: false,
            child_on_fork: None,
            fail_on_fork: None,
            exits: Mutex::new(VecDeque::new()),
            killed: Mutex::new(Vec::new()),
            watcher: Mutex::new(None),
        }
    }

    /// Every forked child exits successfully right away
    pub fn exiting_children() -> Self {
        Self {
            exit_on_fork: true,
            ..Self::new()
        }
    }

    /// The `nth` fork (1-based) returns as the child
    pub fn child_on_fork(mut self, nth: usize) -> Self {
        self.child_on_fork = Some(nth);
        self
    }

    /// The `nth` fork (1-based) fails
    pub fn failing_fork(mut self, nth: usize) -> Self {
        self.fail_on_fork = Some(nth);
        self
    }

    pub fn watching(&self) -> bool {
        self.watcher.lock().is_some()
    }

    pub fn forks(&self) -> usize {
        self.forks.load(Ordering::SeqCst)
    }

    pub fn killed(&self) -> Vec<Pid> {
        self.killed.lock().clone()
    }

    pub fn queue_exit(&self, pid: Pid, status: ExitStatus) {
        self.exits.lock().push_back(ChildExit::new(pid, status));
    }

    /// Deliver a simulated SIGCHLD; false when no watcher is installed
    pub fn deliver_sigchld(&self) -> bool {
        match self.watcher.lock().as_ref() {
            Some(watcher) => {
                watcher();
                true
            }
            None => false,
        }
    }
}

impl ProcessControl for FakeControl {
    fn fork(&self) -> TopologyResult<Forked> {
        let nth = self.forks.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_fork == Some(nth) {
            return Err(TopologyError::ForkFailed("no more processes".to_string()));
        }
        if self.child_on_fork == Some(nth) {
            return Ok(Forked::Child);
        }
        let child = self.next_pid.fetch_add(1, Ordering::SeqCst);
        if self.exit_on_fork {
            self.queue_exit(child, ExitStatus::Exited(0));
        }
        Ok(Forked::Parent { child })
    }

    fn kill(&self, pid: Pid) -> TopologyResult<()> {
        self.killed.lock().push(pid);
        Ok(())
    }

    fn try_reap(&self) -> TopologyResult<Option<ChildExit>> {
        Ok(self.exits.lock().pop_front())
    }

    fn watch_children(&self, watcher: ChildWatcher) -> TopologyResult<()> {
        *self.watcher.lock() = Some(watcher);
        Ok(())
    }

    fn unwatch_children(&self) -> TopologyResult<()> {
        *self.watcher.lock() = None;
        Ok(())
    }
}
