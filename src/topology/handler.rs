/*!
 * Process Topology
 * Forks and tracks the input, worker, output, proxy and monitor processes
 *
 * One `ProcessTopology` exists per job and is shared by reference. The slot
 * table is sized once by `initialize` and only the forking parent writes it;
 * a forked child only ever sets its own identity, which lives in atomics.
 * The table lock is held across `fork()` so that a child exiting right away
 * cannot be reaped before its pid is recorded.
 */

use super::traits::ProcessControl;
use super::types::{
    ChildExit, Forked, ManagedProcess, ProcessRole, StartOutcome, TopologyError, TopologyResult,
};
use crate::core::limits::{DEFAULT_WAIT_POLL_INTERVAL, INIT_PROC_ID, NON_WORKER_SLOTS};
use crate::core::types::{Pid, ProcId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Parent-owned bookkeeping of forked children
#[derive(Debug, Default)]
struct SlotTable {
    slots: Vec<Option<ManagedProcess>>,
    roles: HashMap<Pid, ProcessRole>,
    workers_started: usize,
    output_started: bool,
}

impl SlotTable {
    fn free_slot(&self) -> TopologyResult<usize> {
        if self.slots.is_empty() {
            return Err(TopologyError::NotInitialized);
        }
        self.slots
            .iter()
            .position(Option::is_none)
            .ok_or(TopologyError::SlotTableFull {
                capacity: self.slots.len(),
            })
    }
}

/// Process topology manager
pub struct ProcessTopology<C: ProcessControl> {
    control: C,
    table: Mutex<SlotTable>,
    role: AtomicU8,
    proc_id: AtomicI32,
    poll_interval: Duration,
}

impl<C: ProcessControl> ProcessTopology<C> {
    pub fn new(control: C) -> Self {
        Self {
            control,
            table: Mutex::new(SlotTable::default()),
            role: AtomicU8::new(ProcessRole::Init as u8),
            proc_id: AtomicI32::new(INIT_PROC_ID),
            poll_interval: DEFAULT_WAIT_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Size the slot table for `n_workers` workers plus input, output and proxy
    ///
    /// Must be called exactly once, before the first fork.
    pub fn initialize(&self, n_workers: usize) -> TopologyResult<()> {
        let mut table = self.table.lock();
        if !table.slots.is_empty() {
            return Err(TopologyError::AlreadyInitialized {
                slots: table.slots.len(),
            });
        }
        table.slots = vec![None; n_workers + NON_WORKER_SLOTS];
        info!(n_workers, slots = table.slots.len(), "Process topology initialized");
        Ok(())
    }

    /// Run `reap_children` whenever the OS reports a child exit
    ///
    /// Call after the last fork: the reaper thread logs, and a child forked
    /// while it holds an output lock would inherit that lock. Children that
    /// exited before the reaper was installed are reaped right away.
    pub fn install_reaper(self: &Arc<Self>) -> TopologyResult<()>
    where
        C: 'static,
    {
        let topology = Arc::downgrade(self);
        self.control.watch_children(Box::new(move || {
            if let Some(topology) = topology.upgrade() {
                if let Err(e) = topology.reap_children() {
                    warn!(error = %e, "Reaping children failed");
                }
            }
        }))?;
        self.reap_children()?;
        Ok(())
    }

    /// Stop reacting to child exits; `wait_for_all_processes` still polls
    pub fn remove_reaper(&self) -> TopologyResult<()> {
        self.control.unwatch_children()
    }

    pub fn start_input_process(&self) -> TopologyResult<StartOutcome> {
        self.start_process(ProcessRole::Input)
    }

    /// Fork `n` workers; a worker returns right after its own fork
    pub fn start_worker_processes(&self, n: usize) -> TopologyResult<StartOutcome> {
        let mut pids = Vec::with_capacity(n);
        for _ in 0..n {
            match self.start_process(ProcessRole::Worker)? {
                StartOutcome::Parent { pids: started } => pids.extend(started),
                outcome => return Ok(outcome),
            }
        }
        Ok(StartOutcome::Parent { pids })
    }

    /// Start the output role; with `local` the current process becomes the output
    pub fn start_output_process(&self, local: bool) -> TopologyResult<StartOutcome> {
        if !local {
            return self.start_process(ProcessRole::Output);
        }

        let mut table = self.table.lock();
        if table.output_started {
            return Err(TopologyError::AlreadyStarted(ProcessRole::Output));
        }
        table.output_started = true;
        drop(table);
        let proc_id = self.tag(ProcessRole::Output, 0);
        Ok(StartOutcome::Tagged {
            role: ProcessRole::Output,
            proc_id,
        })
    }

    pub fn start_proxy_process(&self) -> TopologyResult<StartOutcome> {
        self.start_process(ProcessRole::Proxy)
    }

    /// Tag the current process as the monitor; nothing is forked
    pub fn start_monitoring_process(&self) -> TopologyResult<StartOutcome> {
        let proc_id = self.tag(ProcessRole::Monitor, 0);
        Ok(StartOutcome::Tagged {
            role: ProcessRole::Monitor,
            proc_id,
        })
    }

    fn start_process(&self, role: ProcessRole) -> TopologyResult<StartOutcome> {
        let mut table = self.table.lock();
        if role == ProcessRole::Output && table.output_started {
            return Err(TopologyError::AlreadyStarted(ProcessRole::Output));
        }
        let slot = table.free_slot()?;
        let worker = table.workers_started;

        match self.control.fork()? {
            Forked::Child => {
                // The table copy belongs to the parent
                drop(table);
                let proc_id = self.tag(role, worker);
                Ok(StartOutcome::Child { role, proc_id })
            }
            Forked::Parent { child } => {
                table.slots[slot] = Some(ManagedProcess { pid: child, role });
                table.roles.insert(child, role);
                match role {
                    ProcessRole::Worker => table.workers_started += 1,
                    ProcessRole::Output => table.output_started = true,
                    _ => {}
                }
                info!(pid = child, %role, proc_id = role.proc_id(worker), "Started process");
                Ok(StartOutcome::Parent { pids: vec![child] })
            }
        }
    }

    fn tag(&self, role: ProcessRole, worker: usize) -> ProcId {
        let proc_id = role.proc_id(worker);
        self.proc_id.store(proc_id, Ordering::Release);
        self.role.store(role as u8, Ordering::Release);
        debug!(%role, proc_id, "Process role assigned");
        proc_id
    }

    /// Record the exit of a child; unknown pids are ignored
    pub fn on_child_exit(&self, exit: ChildExit) -> Option<ProcessRole> {
        let mut table = self.table.lock();
        let Some(role) = table.roles.remove(&exit.pid) else {
            debug!(pid = exit.pid, "Ignoring exit of untracked child");
            return None;
        };
        if let Some(slot) = table
            .slots
            .iter_mut()
            .find(|slot| matches!(slot, Some(p) if p.pid == exit.pid))
        {
            *slot = None;
        }
        drop(table);

        if exit.status.success() {
            debug!(pid = exit.pid, %role, "Child process finished");
        } else {
            error!(pid = exit.pid, %role, status = %exit.status, "Child process terminated abnormally");
        }
        Some(role)
    }

    /// Reap every exited child; returns how many were reaped
    pub fn reap_children(&self) -> TopologyResult<usize> {
        let mut reaped = 0;
        while let Some(exit) = self.control.try_reap()? {
            self.on_child_exit(exit);
            reaped += 1;
        }
        Ok(reaped)
    }

    /// Block until every tracked child has exited
    pub fn wait_for_all_processes(&self) -> TopologyResult<()> {
        loop {
            self.reap_children()?;
            if self.pid_list_empty() {
                info!("All child processes finished");
                return Ok(());
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    /// SIGKILL every tracked child and clear the table
    ///
    /// All slots are cleared even if a kill fails; the first failure is returned.
    pub fn kill_all_processes(&self) -> TopologyResult<()> {
        let mut table = self.table.lock();
        let mut first_error = None;
        let mut killed = 0usize;

        for slot in table.slots.iter_mut() {
            if let Some(process) = slot.take() {
                match self.control.kill(process.pid) {
                    Ok(()) => killed += 1,
                    Err(e) => {
                        warn!(pid = process.pid, role = %process.role, error = %e, "Kill failed");
                        first_error.get_or_insert(e);
                    }
                }
            }
        }
        table.roles.clear();
        drop(table);

        warn!(killed, "Killed all child processes");
        first_error.map_or(Ok(()), Err)
    }

    pub fn role(&self) -> ProcessRole {
        ProcessRole::from_u8(self.role.load(Ordering::Acquire))
    }

    pub fn is_worker_process(&self) -> bool {
        self.role() == ProcessRole::Worker
    }

    pub fn is_input_process(&self) -> bool {
        self.role() == ProcessRole::Input
    }

    pub fn is_output_process(&self) -> bool {
        self.role() == ProcessRole::Output
    }

    pub fn is_proxy_process(&self) -> bool {
        self.role() == ProcessRole::Proxy
    }

    pub fn is_monitor_process(&self) -> bool {
        self.role() == ProcessRole::Monitor
    }

    /// Framework process id of the calling process
    pub fn evt_proc_id(&self) -> ProcId {
        self.proc_id.load(Ordering::Acquire)
    }

    /// Role of a tracked child
    pub fn get_proc_type(&self, pid: Pid) -> TopologyResult<ProcessRole> {
        self.table
            .lock()
            .roles
            .get(&pid)
            .copied()
            .ok_or(TopologyError::UnknownPid(pid))
    }

    /// Whether the calling process has been given a role
    pub fn parallel_processing_used(&self) -> bool {
        self.role() != ProcessRole::Init
    }

    /// Pid per slot; 0 marks a free slot
    pub fn pid_list(&self) -> Vec<Pid> {
        self.table
            .lock()
            .slots
            .iter()
            .map(|slot| slot.map_or(0, |p| p.pid))
            .collect()
    }

    pub fn pid_list_empty(&self) -> bool {
        self.table.lock().slots.iter().all(Option::is_none)
    }

    /// Children currently tracked
    pub fn processes(&self) -> Vec<ManagedProcess> {
        self.table.lock().slots.iter().flatten().copied().collect()
    }

    pub fn slot_count(&self) -> usize {
        self.table.lock().slots.len()
    }

    /// Human readable name of the calling process, e.g. `worker 3`
    pub fn process_name(&self) -> String {
        match self.role() {
            ProcessRole::Worker => format!("worker {}", self.evt_proc_id()),
            role => role.to_string(),
        }
    }
}

impl<C: ProcessControl> std::fmt::Debug for ProcessTopology<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessTopology")
            .field("role", &self.role())
            .field("proc_id", &self.evt_proc_id())
            .field("slots", &self.pid_list())
            .finish()
    }
}
