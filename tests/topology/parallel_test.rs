/*!
 * Parallel Processor Tests
 * Parent-side orchestration with a fake process control
 */

use super::fake::FakeControl;
use evproc::processor::{EventBridge, ParallelProcessor, ProcessOutcome};
use evproc::topology::{ProcessRole, ProcessTopology, TopologyError};
use evproc::{
    DataStore, EventProcessor, FrameworkError, Module, ModuleError, ModuleInfo, ModuleProperties,
    ModuleResult, PathGraph, ProcessRecordType, ProcessingConfig,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

type Log = Arc<Mutex<Vec<String>>>;

/// Logs callbacks; requests end of data on call `end_after` when set
struct Stage {
    info: ModuleInfo,
    log: Log,
    calls: u64,
    end_after: Option<u64>,
    failing: bool,
}

impl Stage {
    fn boxed(name: &str, properties: ModuleProperties, log: &Log, end_after: Option<u64>) -> Box<dyn Module> {
        Box::new(Self {
            info: ModuleInfo::new(name).with_properties(properties),
            log: Arc::clone(log),
            calls: 0,
            end_after,
            failing: false,
        })
    }

    fn failing(name: &str, log: &Log) -> Box<dyn Module> {
        Box::new(Self {
            info: ModuleInfo::new(name).with_properties(ModuleProperties::PARALLEL_PROCESSING_CERTIFIED),
            log: Arc::clone(log),
            calls: 0,
            end_after: None,
            failing: true,
        })
    }

    fn push(&self, what: &str) {
        self.log.lock().push(format!("{}:{}", self.info.name(), what));
    }
}

impl Module for Stage {
    fn info(&self) -> &ModuleInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut ModuleInfo {
        &mut self.info
    }

    fn initialize(&mut self, _store: &mut DataStore) -> ModuleResult<()> {
        self.push("initialize");
        Ok(())
    }

    fn event(&mut self, _store: &mut DataStore) -> ModuleResult<ProcessRecordType> {
        self.calls += 1;
        self.push("event");
        if self.failing {
            return Err(ModuleError::Fatal("detector geometry missing".to_string()));
        }
        Ok(match self.end_after {
            Some(n) if self.calls >= n => ProcessRecordType::EndOfData,
            _ => ProcessRecordType::Event,
        })
    }

    fn terminate(&mut self, _store: &mut DataStore) -> ModuleResult<()> {
        self.push("terminate");
        Ok(())
    }
}

struct TestBridge {
    log: Log,
    events: u64,
    worker_events: u64,
}

impl TestBridge {
    fn new(log: &Log, events: u64) -> Box<dyn EventBridge> {
        Box::new(Self {
            log: Arc::clone(log),
            events,
            worker_events: 1,
        })
    }

    fn with_worker_events(log: &Log, worker_events: u64) -> Box<dyn EventBridge> {
        Box::new(Self {
            log: Arc::clone(log),
            events: 1,
            worker_events,
        })
    }
}

impl EventBridge for TestBridge {
    fn input_sender(&mut self) -> Box<dyn Module> {
        Stage::boxed(
            "InputSender",
            ModuleProperties::TERMINATE_IN_ALL_PROCESSES,
            &self.log,
            None,
        )
    }

    fn worker_receiver(&mut self) -> Box<dyn Module> {
        Stage::boxed(
            "WorkerReceiver",
            ModuleProperties::TRIGGERS_END_OF_DATA,
            &self.log,
            Some(self.worker_events),
        )
    }

    fn worker_sender(&mut self) -> Box<dyn Module> {
        Stage::boxed(
            "WorkerSender",
            ModuleProperties::TERMINATE_IN_ALL_PROCESSES,
            &self.log,
            None,
        )
    }

    fn output_receiver(&mut self) -> Box<dyn Module> {
        Stage::boxed(
            "OutputReceiver",
            ModuleProperties::TRIGGERS_END_OF_DATA,
            &self.log,
            Some(self.events),
        )
    }
}

fn entries(log: &Log, what: &str) -> Vec<String> {
    let suffix = format!(":{}", what);
    log.lock()
        .iter()
        .filter_map(|e| e.strip_suffix(suffix.as_str()).map(str::to_string))
        .collect()
}

fn build(log: &Log, reco_properties: ModuleProperties) -> (PathGraph, evproc::PathId) {
    build_with_reco(log, Stage::boxed("Reco", reco_properties, log, None))
}

fn build_with_reco(log: &Log, reco: Box<dyn Module>) -> (PathGraph, evproc::PathId) {
    let mut graph = PathGraph::new();
    let main = graph.create_path("main");
    let input = graph.add_module(Stage::boxed(
        "Input",
        ModuleProperties::INPUT | ModuleProperties::TRIGGERS_END_OF_DATA,
        log,
        Some(3),
    ));
    let reco = graph.add_module(reco);
    let writer = graph.add_module(Stage::boxed("Writer", ModuleProperties::OUTPUT, log, None));
    for id in [input, reco, writer] {
        graph.append(main, id).unwrap();
    }
    (graph, main)
}

fn certified(log: &Log) -> (PathGraph, evproc::PathId) {
    build(log, ModuleProperties::PARALLEL_PROCESSING_CERTIFIED)
}

const ALL_IN_REVERSE: [&str; 7] = [
    "Writer",
    "OutputReceiver",
    "WorkerSender",
    "Reco",
    "WorkerReceiver",
    "InputSender",
    "Input",
];

#[test]
fn test_parent_runs_output_and_terminates_everything() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let (mut graph, main) = certified(&log);

    let topology = Arc::new(
        ProcessTopology::new(FakeControl::exiting_children())
            .with_poll_interval(Duration::from_millis(1)),
    );
    let mut parallel = ParallelProcessor::new(
        EventProcessor::new(),
        Arc::clone(&topology),
        2,
        TestBridge::new(&log, 3),
    );

    let summary = match parallel.process(&mut graph, main).unwrap() {
        ProcessOutcome::Completed(summary) => summary,
        other => panic!("parent must complete the job, got {:?}", other),
    };

    assert_eq!(summary.role, ProcessRole::Output);
    assert_eq!(summary.proc_id, 20_000);
    assert_eq!(summary.events_processed, 3);
    assert_eq!(topology.control().forks(), 3);
    assert!(topology.pid_list_empty());

    assert_eq!(
        entries(&log, "initialize"),
        [
            "Input",
            "InputSender",
            "WorkerReceiver",
            "Reco",
            "WorkerSender",
            "OutputReceiver",
            "Writer"
        ]
    );
    assert_eq!(
        entries(&log, "event"),
        ["OutputReceiver", "Writer", "OutputReceiver", "Writer", "OutputReceiver", "Writer"]
    );
    assert_eq!(entries(&log, "terminate"), ALL_IN_REVERSE);
    assert!(!topology.control().watching());
}

#[test]
fn test_uncertified_path_falls_back_to_single_process() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let (mut graph, main) = build(&log, ModuleProperties::empty());

    let topology = Arc::new(ProcessTopology::new(FakeControl::new()));
    let mut parallel = ParallelProcessor::new(
        EventProcessor::new(),
        Arc::clone(&topology),
        4,
        TestBridge::new(&log, 1),
    );

    let summary = match parallel.process(&mut graph, main).unwrap() {
        ProcessOutcome::Completed(summary) => summary,
        other => panic!("unexpected outcome {:?}", other),
    };

    assert_eq!(summary.role, ProcessRole::Init);
    assert_eq!(summary.events_processed, 3);
    assert_eq!(topology.control().forks(), 0);
    assert_eq!(topology.slot_count(), 0);
    assert_eq!(entries(&log, "terminate"), ["Writer", "Reco", "Input"]);
}

#[test]
fn test_failed_fork_kills_started_children() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let (mut graph, main) = certified(&log);

    // Input and the first worker start, the second worker cannot be forked
    let topology = Arc::new(ProcessTopology::new(FakeControl::new().failing_fork(3)));
    let mut parallel = ParallelProcessor::new(
        EventProcessor::new(),
        Arc::clone(&topology),
        2,
        TestBridge::new(&log, 3),
    );

    let error = parallel.process(&mut graph, main).unwrap_err();
    assert!(matches!(
        error,
        FrameworkError::Topology(TopologyError::ForkFailed(_))
    ));
    assert_eq!(topology.control().killed(), vec![1000, 1001]);
    assert!(topology.pid_list_empty());
    assert!(entries(&log, "event").is_empty());
    assert_eq!(entries(&log, "terminate"), ALL_IN_REVERSE);
}

#[test]
fn test_input_child_runs_input_segment() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let (mut graph, main) = certified(&log);

    let topology = Arc::new(ProcessTopology::new(FakeControl::new().child_on_fork(1)));
    let mut parallel = ParallelProcessor::new(
        EventProcessor::new(),
        Arc::clone(&topology),
        2,
        TestBridge::new(&log, 3),
    );

    let outcome = parallel.process(&mut graph, main).unwrap();
    assert_eq!(
        outcome,
        ProcessOutcome::ChildFinished {
            role: ProcessRole::Input,
            exit_code: 0
        }
    );
    assert_eq!(topology.evt_proc_id(), 10_000);
    assert_eq!(topology.control().forks(), 1);
    assert!(!topology.control().watching());

    assert_eq!(
        entries(&log, "event"),
        ["Input", "InputSender", "Input", "InputSender", "Input", "InputSender"]
    );
    // Children only terminate modules that ask for it
    assert_eq!(entries(&log, "terminate"), ["InputSender"]);
}

#[test]
fn test_worker_child_ignores_event_limit() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let (mut graph, main) = certified(&log);

    // Fork 1 is the input, fork 3 the second worker
    let topology = Arc::new(ProcessTopology::new(FakeControl::new().child_on_fork(3)));
    let mut parallel = ParallelProcessor::new(
        EventProcessor::new().with_max_events(1),
        Arc::clone(&topology),
        2,
        TestBridge::with_worker_events(&log, 2),
    );

    let outcome = parallel.process(&mut graph, main).unwrap();
    assert_eq!(
        outcome,
        ProcessOutcome::ChildFinished {
            role: ProcessRole::Worker,
            exit_code: 0
        }
    );
    assert_eq!(topology.evt_proc_id(), 2);
    assert_eq!(topology.process_name(), "worker 2");
    assert_eq!(parallel.processor().events_processed(), 2);

    assert_eq!(
        entries(&log, "event"),
        [
            "WorkerReceiver",
            "Reco",
            "WorkerSender",
            "WorkerReceiver",
            "Reco",
            "WorkerSender"
        ]
    );
    assert_eq!(entries(&log, "terminate"), ["WorkerSender"]);
}

#[test]
fn test_failing_worker_exits_with_error() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let (mut graph, main) = build_with_reco(&log, Stage::failing("Reco", &log));

    let topology = Arc::new(ProcessTopology::new(FakeControl::new().child_on_fork(2)));
    let mut parallel = ParallelProcessor::new(
        EventProcessor::new(),
        Arc::clone(&topology),
        1,
        TestBridge::new(&log, 1),
    );

    let outcome = parallel.process(&mut graph, main).unwrap();
    assert_eq!(
        outcome,
        ProcessOutcome::ChildFinished {
            role: ProcessRole::Worker,
            exit_code: 1
        }
    );
    assert_eq!(entries(&log, "event"), ["WorkerReceiver", "Reco"]);
    assert!(entries(&log, "terminate").is_empty());
}

#[test]
fn test_from_config_applies_poll_interval() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let config = ProcessingConfig::new()
        .with_processes(3)
        .with_max_events(50)
        .with_wait_poll_interval(Duration::from_millis(7));

    let parallel =
        ParallelProcessor::from_config(&config, FakeControl::new(), TestBridge::new(&log, 1));

    assert_eq!(parallel.topology().poll_interval(), Duration::from_millis(7));
    assert_eq!(parallel.processor().max_events(), 50);
}
