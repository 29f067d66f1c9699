/*!
 * Real Fork Tests
 * Children leave through _exit so the test harness never runs twice
 */

use evproc::topology::{OsProcessControl, OsTopology, ProcessRole, StartOutcome};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid as NixPid;
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn topology() -> OsTopology {
    OsTopology::new(OsProcessControl::new()).with_poll_interval(Duration::from_millis(5))
}

fn exit_child(code: i32) -> ! {
    // SAFETY: ends the forked copy of the test process without unwinding
    unsafe { libc::_exit(code) }
}

#[test]
#[serial]
fn test_forked_children_are_waited_for() {
    let topology = topology();
    topology.initialize(2).unwrap();

    match topology.start_input_process().unwrap() {
        StartOutcome::Child { role, .. } => exit_child(if role == ProcessRole::Input { 0 } else { 3 }),
        StartOutcome::Parent { pids } => assert_eq!(pids.len(), 1),
        StartOutcome::Tagged { .. } => unreachable!(),
    }
    match topology.start_worker_processes(2).unwrap() {
        StartOutcome::Child { .. } => exit_child(0),
        StartOutcome::Parent { pids } => assert_eq!(pids.len(), 2),
        StartOutcome::Tagged { .. } => unreachable!(),
    }
    assert_eq!(topology.role(), ProcessRole::Init);

    topology.wait_for_all_processes().unwrap();
    assert!(topology.pid_list_empty());
}

#[test]
#[serial]
fn test_failed_child_frees_its_slot() {
    let topology = topology();
    topology.initialize(1).unwrap();

    let pid = match topology.start_worker_processes(1).unwrap() {
        StartOutcome::Child { .. } => exit_child(7),
        StartOutcome::Parent { pids } => pids[0],
        StartOutcome::Tagged { .. } => unreachable!(),
    };
    assert_eq!(topology.get_proc_type(pid).unwrap(), ProcessRole::Worker);

    topology.wait_for_all_processes().unwrap();
    assert!(topology.get_proc_type(pid).is_err());
    assert!(topology.pid_list().iter().all(|&slot| slot == 0));
}

#[test]
#[serial]
fn test_kill_all_stops_sleeping_child() {
    let topology = topology();
    topology.initialize(1).unwrap();

    let pid = match topology.start_proxy_process().unwrap() {
        StartOutcome::Child { .. } => loop {
            // SAFETY: pause only waits for a signal
            unsafe { libc::pause() };
        },
        StartOutcome::Parent { pids } => pids[0],
        StartOutcome::Tagged { .. } => unreachable!(),
    };

    topology.kill_all_processes().unwrap();
    assert!(topology.pid_list_empty());

    let status = waitpid(NixPid::from_raw(pid), None).unwrap();
    assert!(matches!(
        status,
        WaitStatus::Signaled(_, nix::sys::signal::Signal::SIGKILL, _)
    ));
}

#[test]
#[serial]
fn test_reaper_frees_slot_of_exited_child() {
    let topology = Arc::new(topology());
    topology.initialize(1).unwrap();

    let pid = match topology.start_worker_processes(1).unwrap() {
        StartOutcome::Child { .. } => {
            std::thread::sleep(Duration::from_millis(50));
            exit_child(0)
        }
        StartOutcome::Parent { pids } => pids[0],
        StartOutcome::Tagged { .. } => unreachable!(),
    };
    topology.install_reaper().unwrap();

    // The child outlives install_reaper, so its exit reaches the reaper thread
    let deadline = Instant::now() + Duration::from_secs(5);
    while !topology.pid_list_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(topology.pid_list_empty());
    assert!(topology.get_proc_type(pid).is_err());

    topology.remove_reaper().unwrap();
    // A second job in the same process installs its own reaper
    let next = Arc::new(OsTopology::new(OsProcessControl::new()));
    next.initialize(0).unwrap();
    next.install_reaper().unwrap();
    next.remove_reaper().unwrap();
}
