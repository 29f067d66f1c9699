/*!
 * Process Topology Tests
 * Slot table bookkeeping, role tagging and shutdown paths
 */

use super::fake::FakeControl;
use evproc::core::types::Pid;
use evproc::topology::{
    ChildExit, ChildWatcher, ExitStatus, Forked, ProcessControl, ProcessRole, ProcessTopology,
    StartOutcome, TopologyError, TopologyResult,
};
use mockall::mock;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Control {}

    impl ProcessControl for Control {
        fn fork(&self) -> TopologyResult<Forked>;
        fn kill(&self, pid: Pid) -> TopologyResult<()>;
        fn try_reap(&self) -> TopologyResult<Option<ChildExit>>;
        fn watch_children(&self, watcher: ChildWatcher) -> TopologyResult<()>;
        fn unwatch_children(&self) -> TopologyResult<()>;
    }
}

fn parent_pids(outcome: StartOutcome) -> Vec<Pid> {
    match outcome {
        StartOutcome::Parent { pids } => pids,
        other => panic!("expected to stay in the parent, got {:?}", other),
    }
}

#[test]
fn test_worker_slots_and_sigchld() {
    let topology = Arc::new(ProcessTopology::new(FakeControl::new()));
    topology.initialize(3).unwrap();
    topology.install_reaper().unwrap();

    let pids = parent_pids(topology.start_worker_processes(3).unwrap());
    assert_eq!(pids.len(), 3);

    let list = topology.pid_list();
    assert_eq!(list.len(), 6);
    assert_eq!(list.iter().filter(|&&pid| pid != 0).count(), 3);
    assert_eq!(list.iter().filter(|&&pid| pid == 0).count(), 3);
    for &pid in &pids {
        assert_eq!(topology.get_proc_type(pid).unwrap(), ProcessRole::Worker);
    }

    topology.control().queue_exit(pids[1], ExitStatus::Exited(0));
    assert!(topology.control().deliver_sigchld());

    let list = topology.pid_list();
    assert_eq!(list.iter().filter(|&&pid| pid != 0).count(), 2);
    assert!(!list.contains(&pids[1]));
    assert!(!topology.pid_list_empty());
    assert_eq!(
        topology.get_proc_type(pids[1]),
        Err(TopologyError::UnknownPid(pids[1]))
    );

    for &pid in [pids[0], pids[2]].iter() {
        topology.control().queue_exit(pid, ExitStatus::Exited(0));
    }
    assert_eq!(topology.reap_children().unwrap(), 2);
    assert!(topology.pid_list_empty());
}

#[test]
fn test_reaper_installed_after_forks_reaps_early_exits() {
    let topology = Arc::new(ProcessTopology::new(FakeControl::exiting_children()));
    topology.initialize(2).unwrap();
    parent_pids(topology.start_input_process().unwrap());
    parent_pids(topology.start_worker_processes(2).unwrap());
    assert!(!topology.pid_list_empty());

    topology.install_reaper().unwrap();
    assert!(topology.pid_list_empty());
    assert!(topology.control().watching());

    topology.remove_reaper().unwrap();
    assert!(!topology.control().watching());
    assert!(!topology.control().deliver_sigchld());
}

#[test]
fn test_initialize_once() {
    let topology = ProcessTopology::new(FakeControl::new());
    assert_eq!(
        topology.start_input_process(),
        Err(TopologyError::NotInitialized)
    );

    topology.initialize(2).unwrap();
    assert_eq!(topology.slot_count(), 5);
    assert_eq!(
        topology.initialize(4),
        Err(TopologyError::AlreadyInitialized { slots: 5 })
    );
    assert_eq!(topology.slot_count(), 5);
}

#[test]
fn test_slot_table_is_never_resized() {
    let topology = ProcessTopology::new(FakeControl::new());
    topology.initialize(0).unwrap();

    parent_pids(topology.start_input_process().unwrap());
    parent_pids(topology.start_proxy_process().unwrap());
    parent_pids(topology.start_output_process(false).unwrap());

    assert_eq!(
        topology.start_worker_processes(1),
        Err(TopologyError::SlotTableFull { capacity: 3 })
    );
    assert_eq!(topology.slot_count(), 3);
    assert_eq!(topology.control().forks(), 3);
}

#[test]
fn test_local_output_tags_current_process() {
    let topology = ProcessTopology::new(FakeControl::new());
    topology.initialize(1).unwrap();
    assert!(!topology.parallel_processing_used());
    assert_eq!(topology.evt_proc_id(), -1);

    let outcome = topology.start_output_process(true).unwrap();
    assert_eq!(
        outcome,
        StartOutcome::Tagged {
            role: ProcessRole::Output,
            proc_id: 20_000
        }
    );
    assert!(topology.is_output_process());
    assert!(!topology.is_worker_process());
    assert!(topology.parallel_processing_used());
    assert_eq!(topology.evt_proc_id(), 20_000);
    assert_eq!(topology.control().forks(), 0);
    assert!(topology.pid_list_empty());

    assert_eq!(
        topology.start_output_process(false),
        Err(TopologyError::AlreadyStarted(ProcessRole::Output))
    );
}

#[test]
fn test_monitor_does_not_fork() {
    let topology = ProcessTopology::new(FakeControl::new());
    topology.initialize(1).unwrap();

    let outcome = topology.start_monitoring_process().unwrap();
    assert!(outcome.runs_role());
    assert!(!outcome.is_child());
    assert!(topology.is_monitor_process());
    assert_eq!(topology.evt_proc_id(), 40_000);
    assert_eq!(topology.control().forks(), 0);
}

#[test]
fn test_unknown_and_abnormal_exits() {
    let topology = ProcessTopology::new(FakeControl::new());
    topology.initialize(1).unwrap();
    let input = parent_pids(topology.start_input_process().unwrap())[0];
    assert_eq!(topology.get_proc_type(input).unwrap(), ProcessRole::Input);

    assert_eq!(
        topology.on_child_exit(ChildExit::new(4242, ExitStatus::Exited(1))),
        None
    );
    assert!(topology.pid_list().contains(&input));

    assert_eq!(
        topology.on_child_exit(ChildExit::new(input, ExitStatus::Signaled(9))),
        Some(ProcessRole::Input)
    );
    assert!(topology.pid_list_empty());
}

#[test]
fn test_wait_for_all_processes() {
    let topology = ProcessTopology::new(FakeControl::exiting_children())
        .with_poll_interval(Duration::from_millis(1));
    topology.initialize(4).unwrap();
    parent_pids(topology.start_input_process().unwrap());
    parent_pids(topology.start_worker_processes(4).unwrap());

    topology.wait_for_all_processes().unwrap();
    assert!(topology.pid_list_empty());
    assert!(topology.processes().is_empty());
}

#[test]
fn test_kill_all_processes() {
    let mut control = MockControl::new();
    let mut next: Pid = 100;
    control.expect_fork().times(2).returning(move || {
        next += 1;
        Ok(Forked::Parent { child: next })
    });
    control
        .expect_kill()
        .withf(|pid| *pid == 101 || *pid == 102)
        .times(2)
        .returning(|_| Ok(()));

    let topology = ProcessTopology::new(control);
    topology.initialize(2).unwrap();
    let pids = parent_pids(topology.start_worker_processes(2).unwrap());
    assert_eq!(pids, vec![101, 102]);

    topology.kill_all_processes().unwrap();
    assert!(topology.pid_list_empty());
    assert!(topology.get_proc_type(101).is_err());
}

#[test]
fn test_kill_failure_still_clears_slots() {
    let mut control = MockControl::new();
    let mut next: Pid = 200;
    control.expect_fork().times(2).returning(move || {
        next += 1;
        Ok(Forked::Parent { child: next })
    });
    control.expect_kill().times(2).returning(|pid| {
        if pid == 201 {
            Err(TopologyError::KillFailed {
                pid,
                reason: "EPERM".to_string(),
            })
        } else {
            Ok(())
        }
    });

    let topology = ProcessTopology::new(control);
    topology.initialize(1).unwrap();
    parent_pids(topology.start_input_process().unwrap());
    parent_pids(topology.start_worker_processes(1).unwrap());

    assert!(matches!(
        topology.kill_all_processes(),
        Err(TopologyError::KillFailed { pid: 201, .. })
    ));
    assert!(topology.pid_list_empty());
}

#[test]
fn test_forked_worker_takes_its_identity() {
    let mut control = MockControl::new();
    control
        .expect_fork()
        .times(1)
        .returning(|| Ok(Forked::Child));

    let topology = ProcessTopology::new(control);
    topology.initialize(3).unwrap();

    let outcome = topology.start_worker_processes(3).unwrap();
    assert_eq!(
        outcome,
        StartOutcome::Child {
            role: ProcessRole::Worker,
            proc_id: 1
        }
    );
    assert!(topology.is_worker_process());
    assert_eq!(topology.process_name(), "worker 1");
    // The child never records anything in the table
    assert!(topology.pid_list_empty());
}

#[test]
fn test_fork_failure_is_reported() {
    let mut control = MockControl::new();
    control
        .expect_fork()
        .returning(|| Err(TopologyError::ForkFailed("EAGAIN".to_string())));

    let topology = ProcessTopology::new(control);
    topology.initialize(1).unwrap();
    assert_eq!(
        topology.start_input_process(),
        Err(TopologyError::ForkFailed("EAGAIN".to_string()))
    );
    assert!(topology.pid_list_empty());
    assert!(!topology.parallel_processing_used());
}
