/*!
 * Parallel Processor
 * Runs a split path across input, worker and output processes
 *
 * All modules are initialized in the parent so children inherit them through
 * fork. The parent becomes the output process, waits for its children and is
 * the only process that terminates every module.
 */

use super::event_processor::EventProcessor;
use super::types::{ProcessOutcome, ProcessSummary};
use crate::config::ProcessingConfig;
use crate::core::types::FrameworkResult;
use crate::module::{Module, ModuleProperties};
use crate::path::{split_path, ModuleId, PathGraph, PathId, PathSplit};
use crate::topology::{ProcessControl, ProcessRole, ProcessTopology, StartOutcome};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Moves events between the processes of a parallel job
///
/// Each method returns a module that is appended or prepended to one
/// segment. Receivers that end their process must declare
/// `TRIGGERS_END_OF_DATA`; receivers that forward run boundaries must
/// declare `TRIGGERS_NEW_RUN`.
pub trait EventBridge {
    /// Appended to the input segment
    fn input_sender(&mut self) -> Box<dyn Module>;

    /// Prepended to the worker segment
    fn worker_receiver(&mut self) -> Box<dyn Module>;

    /// Appended to the worker segment
    fn worker_sender(&mut self) -> Box<dyn Module>;

    /// Prepended to the output segment
    fn output_receiver(&mut self) -> Box<dyn Module>;
}

/// Paths built from a split
struct SegmentPaths {
    input: PathId,
    worker: PathId,
    output: PathId,
}

/// Multi-process driver on top of `EventProcessor`
pub struct ParallelProcessor<C: ProcessControl + 'static> {
    processor: EventProcessor,
    topology: Arc<ProcessTopology<C>>,
    n_processes: usize,
    bridge: Box<dyn EventBridge>,
}

impl<C: ProcessControl + 'static> ParallelProcessor<C> {
    pub fn new(
        processor: EventProcessor,
        topology: Arc<ProcessTopology<C>>,
        n_processes: usize,
        bridge: Box<dyn EventBridge>,
    ) -> Self {
        Self {
            processor,
            topology,
            n_processes,
            bridge,
        }
    }

    pub fn topology(&self) -> &Arc<ProcessTopology<C>> {
        &self.topology
    }

    pub fn processor(&self) -> &EventProcessor {
        &self.processor
    }

    /// Parallel processor with topology and event limits taken from `config`
    pub fn from_config(config: &ProcessingConfig, control: C, bridge: Box<dyn EventBridge>) -> Self {
        let topology = ProcessTopology::new(control).with_poll_interval(config.wait_poll_interval);
        Self::new(
            EventProcessor::from_config(config),
            Arc::new(topology),
            config.n_processes,
            bridge,
        )
    }

    /// Process `start`, forking when the path can be split
    ///
    /// Falls back to single-process execution when no worker processes are
    /// configured or no part of the path is parallel certified.
    pub fn process(&mut self, graph: &mut PathGraph, start: PathId) -> FrameworkResult<ProcessOutcome> {
        graph.validate(start, self.processor.max_events())?;

        let split = if self.n_processes == 0 {
            None
        } else {
            split_path(graph, start)?
        };
        let Some(split) = split else {
            if self.n_processes > 0 {
                warn!("Path cannot be split, processing in a single process");
            }
            return self.processor.process(graph, start).map(ProcessOutcome::Completed);
        };

        self.topology.initialize(self.n_processes)?;
        let paths = self.build_segments(graph, &split)?;
        let mut modules = Vec::new();
        for path in [paths.input, paths.worker, paths.output] {
            for id in graph.flatten(path)? {
                if !modules.contains(&id) {
                    modules.push(id);
                }
            }
        }

        self.processor.initialize_modules(graph, &modules)?;

        match self.start_processes(graph, &paths) {
            Ok(Some(child)) => return Ok(child),
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "Starting processes failed, killing all child processes");
                self.stop_children();
                if let Err(terminate_error) = self.processor.terminate_modules(graph, &modules) {
                    warn!(error = %terminate_error, "Could not terminate modules");
                }
                return Err(e);
            }
        }

        let output_modules = graph.flatten(paths.output)?;
        if let Err(e) = self
            .processor
            .run_event_loop(graph, paths.output, &output_modules)
        {
            error!(error = %e, "Output process failed, killing all child processes");
            self.stop_children();
            return Err(e);
        }

        self.topology.wait_for_all_processes()?;
        if let Err(e) = self.topology.remove_reaper() {
            warn!(error = %e, "Could not remove the child reaper");
        }
        self.processor.terminate_modules(graph, &modules)?;
        info!(
            events = self.processor.events_processed(),
            "Parallel processing finished"
        );
        Ok(ProcessOutcome::Completed(self.summary(graph, &modules)))
    }

    /// Fork input and workers, then make this process the output
    ///
    /// Returns the outcome of a forked child once its segment is done, or
    /// `None` in the parent.
    fn start_processes(
        &mut self,
        graph: &mut PathGraph,
        paths: &SegmentPaths,
    ) -> FrameworkResult<Option<ProcessOutcome>> {
        if let StartOutcome::Child { role, .. } = self.topology.start_input_process()? {
            return Ok(Some(self.run_child(graph, paths.input, role)));
        }
        if let StartOutcome::Child { role, .. } =
            self.topology.start_worker_processes(self.n_processes)?
        {
            // Only the input process honors the event limit
            self.processor.set_max_events(0);
            return Ok(Some(self.run_child(graph, paths.worker, role)));
        }
        self.topology.start_output_process(true)?;
        self.topology.install_reaper()?;
        self.processor.set_max_events(0);
        Ok(None)
    }

    fn stop_children(&self) {
        if let Err(e) = self.topology.kill_all_processes() {
            warn!(error = %e, "Could not kill all child processes");
        }
        if let Err(e) = self.topology.remove_reaper() {
            warn!(error = %e, "Could not remove the child reaper");
        }
    }

    fn build_segments(&mut self, graph: &mut PathGraph, split: &PathSplit) -> FrameworkResult<SegmentPaths> {
        let input = graph.create_path("input");
        for &id in &split.input {
            graph.append(input, id)?;
        }
        let sender = graph.add_module(self.bridge.input_sender());
        graph.append(input, sender)?;

        let worker = graph.create_path("worker");
        let receiver = graph.add_module(self.bridge.worker_receiver());
        graph.append(worker, receiver)?;
        for &id in &split.main {
            graph.append(worker, id)?;
        }
        let sender = graph.add_module(self.bridge.worker_sender());
        graph.append(worker, sender)?;

        let output = graph.create_path("output");
        let receiver = graph.add_module(self.bridge.output_receiver());
        graph.append(output, receiver)?;
        for &id in &split.output {
            graph.append(output, id)?;
        }

        Ok(SegmentPaths {
            input,
            worker,
            output,
        })
    }

    /// Run one segment in a forked child; returns the exit code to use
    fn run_child(&mut self, graph: &mut PathGraph, path: PathId, role: ProcessRole) -> ProcessOutcome {
        let process = self.topology.process_name();
        info!(process = %process, "Child process started");

        let exit_code = match self.run_child_segment(graph, path) {
            Ok(()) => 0,
            Err(e) => {
                error!(process = %process, error = %e, "Child process failed");
                1
            }
        };
        ProcessOutcome::ChildFinished { role, exit_code }
    }

    fn run_child_segment(&mut self, graph: &mut PathGraph, path: PathId) -> FrameworkResult<()> {
        let modules: Vec<ModuleId> = graph.flatten(path)?;
        self.processor.run_event_loop(graph, path, &modules)?;
        self.processor.terminate_modules_with(
            graph,
            &modules,
            ModuleProperties::TERMINATE_IN_ALL_PROCESSES,
        )
    }

    fn summary(&self, graph: &PathGraph, modules: &[ModuleId]) -> ProcessSummary {
        ProcessSummary {
            role: self.topology.role(),
            proc_id: self.topology.evt_proc_id(),
            ..self.processor.summary(graph, modules)
        }
    }
}
