/*!
 * Event Processor
 * Single-process driver of the module lifecycle
 *
 * Traversal state is an explicit (path, index) cursor plus a bounded stack of
 * resume points for conditions that continue after their path. Run
 * transitions end the traversal and restart it at the top of the start path.
 */

use super::types::{ProcessSummary, ProcessorState, StopReason, Traversal};
use crate::config::ProcessingConfig;
use crate::core::errors::FrameworkError;
use crate::core::limits::{EVENT_META_DATA_NAME, MAX_CONDITION_DEPTH};
use crate::core::types::{FrameworkResult, Stage};
use crate::datastore::{DataStore, Durability, EventMetaData};
use crate::module::{
    AfterConditionPath, Module, ModuleProperties, ModuleResult, ModuleState, ModuleStatistics,
    ProcessRecordType,
};
use crate::monitoring::{LogLevel, LogSystem};
use crate::path::{ModuleId, PathGraph, PathId};
use crate::topology::ProcessRole;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Drives one process through initialize, the event loop and terminate
pub struct EventProcessor {
    max_events: u64,
    handle_interrupts: bool,
    log_system: LogSystem,
    store: DataStore,
    state: ProcessorState,
    current: EventMetaData,
    run_open: bool,
    events_processed: u64,
    runs: u64,
    stop_reason: Option<StopReason>,
    total: ModuleStatistics,
}

impl Default for EventProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl EventProcessor {
    pub fn new() -> Self {
        Self {
            max_events: 0,
            handle_interrupts: false,
            log_system: LogSystem::default(),
            store: DataStore::new(),
            state: ProcessorState::Running,
            current: EventMetaData::default(),
            run_open: false,
            events_processed: 0,
            runs: 0,
            stop_reason: None,
            total: ModuleStatistics::new("Total"),
        }
    }

    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self::new()
            .with_max_events(config.max_events)
            .with_interrupt_handling(config.handle_interrupts)
            .with_log_level(config.log_level)
    }

    /// Stop after `max_events` events; 0 means no limit
    #[must_use]
    pub fn with_max_events(mut self, max_events: u64) -> Self {
        self.max_events = max_events;
        self
    }

    #[must_use]
    pub fn with_interrupt_handling(mut self, enabled: bool) -> Self {
        self.handle_interrupts = enabled;
        self
    }

    #[must_use]
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_system = LogSystem::new(level);
        self
    }

    pub fn max_events(&self) -> u64 {
        self.max_events
    }

    pub(crate) fn set_max_events(&mut self, max_events: u64) {
        self.max_events = max_events;
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut DataStore {
        &mut self.store
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    pub fn runs(&self) -> u64 {
        self.runs
    }

    /// Meta data of the last processed event
    pub fn current_event(&self) -> EventMetaData {
        self.current
    }

    /// Job-wide totals over all modules
    pub fn total_statistics(&self) -> &ModuleStatistics {
        &self.total
    }

    /// Validate, initialize, loop and terminate
    pub fn process(&mut self, graph: &mut PathGraph, start: PathId) -> FrameworkResult<ProcessSummary> {
        graph.validate(start, self.max_events)?;
        let modules = graph.flatten(start)?;

        self.initialize_modules(graph, &modules)?;
        let reason = self.run_event_loop(graph, start, &modules)?;
        self.terminate_modules(graph, &modules)?;

        info!(
            events = self.events_processed,
            runs = self.runs,
            reason = ?reason,
            "Processing finished"
        );
        Ok(self.summary(graph, &modules))
    }

    /// Call `initialize` on every registered module, in order
    ///
    /// Modules with unset required parameters are skipped for the rest of the job.
    pub fn initialize_modules(&mut self, graph: &mut PathGraph, modules: &[ModuleId]) -> FrameworkResult<()> {
        self.store
            .register::<EventMetaData>(EVENT_META_DATA_NAME, Durability::Event)?;

        #[cfg(unix)]
        if self.handle_interrupts {
            crate::topology::signals::install_interrupt_handler()?;
        }

        for &id in modules {
            let entry = graph.entry_mut(id)?;
            if entry.state != ModuleState::Registered {
                continue;
            }

            let missing = entry.module.info().params().missing_required();
            if !missing.is_empty() {
                error!(
                    module = %entry.module.name(),
                    missing = %missing.join(", "),
                    "Required parameters not set, module will be skipped"
                );
                entry.state = ModuleState::Skipped;
                continue;
            }

            self.call(graph, id, Stage::Initialize, |module, store| module.initialize(store))?;
            graph.entry_mut(id)?.state = ModuleState::Initialized;
        }
        Ok(())
    }

    /// Run events until end of data, the event limit or an interrupt
    pub fn run_event_loop(
        &mut self,
        graph: &mut PathGraph,
        start: PathId,
        modules: &[ModuleId],
    ) -> FrameworkResult<StopReason> {
        self.state = ProcessorState::Running;

        let can_start_runs = modules.iter().any(|&id| {
            graph
                .module(id)
                .map_or(false, |m| m.has_properties(ModuleProperties::TRIGGERS_NEW_RUN))
        });
        if !can_start_runs && !self.run_open {
            self.begin_run(graph, modules, self.current)?;
        }

        let reason = loop {
            if self.max_events > 0 && self.events_processed >= self.max_events {
                info!(max_events = self.max_events, "Event limit reached");
                break StopReason::MaxEvents;
            }
            if self.interrupted() {
                warn!("Interrupted, stopping after the current event");
                break StopReason::Interrupted;
            }

            let prepared = EventMetaData {
                event: self.current.event + 1,
                ..self.current
            };
            self.store
                .put(EVENT_META_DATA_NAME, Durability::Event, prepared)?;

            let traversal = self.process_event(graph, start)?;
            let observed = self
                .store
                .get::<EventMetaData>(EVENT_META_DATA_NAME, Durability::Event)
                .copied()
                .unwrap_or(prepared);
            self.store.clear_maps(Durability::Event);

            match traversal {
                Traversal::Completed => {
                    self.current = observed;
                    self.events_processed += 1;
                }
                Traversal::EndOfData => {
                    self.current = observed;
                    self.events_processed += 1;
                    info!("End of data requested");
                    break StopReason::EndOfData;
                }
                Traversal::BeginRun => {
                    // Modules that announce a run set its numbers themselves
                    let next = if observed == prepared {
                        EventMetaData::new(
                            self.current.experiment,
                            self.current.run.saturating_add(1),
                            0,
                        )
                    } else {
                        EventMetaData { event: 0, ..observed }
                    };
                    self.begin_run(graph, modules, next)?;
                }
                Traversal::EndRun => self.end_run(graph, modules)?,
            }
        };

        if self.run_open {
            self.end_run(graph, modules)?;
        }
        self.stop_reason = Some(reason);
        Ok(reason)
    }

    /// Call `terminate` on every initialized module in reverse order
    pub fn terminate_modules(&mut self, graph: &mut PathGraph, modules: &[ModuleId]) -> FrameworkResult<()> {
        self.terminate_matching(graph, modules, ModuleProperties::empty())
    }

    /// Terminate only modules that declare `flags`; used in forked children
    pub fn terminate_modules_with(
        &mut self,
        graph: &mut PathGraph,
        modules: &[ModuleId],
        flags: ModuleProperties,
    ) -> FrameworkResult<()> {
        self.terminate_matching(graph, modules, flags)
    }

    fn terminate_matching(
        &mut self,
        graph: &mut PathGraph,
        modules: &[ModuleId],
        flags: ModuleProperties,
    ) -> FrameworkResult<()> {
        for &id in modules.iter().rev() {
            let entry = graph.entry(id)?;
            if !entry.state.is_active() || !entry.module.has_properties(flags) {
                continue;
            }
            self.call(graph, id, Stage::Terminate, |module, store| module.terminate(store))?;
            graph.entry_mut(id)?.state = ModuleState::Terminated;
        }

        self.store.clear_maps(Durability::Run);
        self.store.clear_maps(Durability::Persistent);
        self.state = ProcessorState::Terminated;
        Ok(())
    }

    /// One traversal starting at the top of `start`
    fn process_event(&mut self, graph: &mut PathGraph, start: PathId) -> FrameworkResult<Traversal> {
        let mut path = start;
        let mut index = 0usize;
        let mut resume: Vec<(PathId, usize)> = Vec::new();
        let mut end_of_data = false;

        loop {
            let Some(&id) = graph.path(path)?.modules().get(index) else {
                match resume.pop() {
                    Some((caller, next)) => {
                        path = caller;
                        index = next;
                        continue;
                    }
                    None => break,
                }
            };
            index += 1;

            if !graph.module_state(id)?.is_active() {
                continue;
            }

            graph.entry_mut(id)?.module.info_mut().clear_return_value();
            let record = self.call(graph, id, Stage::Event, |module, store| module.event(store))?;

            let module = graph.module(id)?;
            match record {
                ProcessRecordType::Event => {}
                request if !request.authorized_for(module.info().properties()) => {
                    warn!(
                        module = %module.name(),
                        request = ?request,
                        "Module lacks the property for this request, ignoring it"
                    );
                }
                ProcessRecordType::EndOfData => end_of_data = true,
                request if end_of_data => {
                    debug!(module = %module.name(), request = ?request, "Ignoring run transition after end of data");
                }
                ProcessRecordType::BeginRun => return Ok(Traversal::BeginRun),
                ProcessRecordType::EndRun => return Ok(Traversal::EndRun),
            }

            if !module.info().has_condition() {
                continue;
            }
            let Some(&condition) = module.info().eval_condition() else {
                if module.info().return_value().is_none() {
                    warn!(module = %module.name(), "Module has conditions but set no return value");
                }
                continue;
            };

            trace!(module = %module.name(), %condition, "Taking condition path");
            match condition.after {
                AfterConditionPath::End => resume.clear(),
                AfterConditionPath::Continue => {
                    if resume.len() >= MAX_CONDITION_DEPTH {
                        return Err(FrameworkError::ConditionDepthExceeded {
                            module: module.name().to_string(),
                            depth: MAX_CONDITION_DEPTH,
                        });
                    }
                    resume.push((path, index));
                }
            }
            path = condition.path;
            index = 0;
        }

        Ok(if end_of_data {
            Traversal::EndOfData
        } else {
            Traversal::Completed
        })
    }

    fn begin_run(
        &mut self,
        graph: &mut PathGraph,
        modules: &[ModuleId],
        run: EventMetaData,
    ) -> FrameworkResult<()> {
        if self.run_open {
            self.end_run(graph, modules)?;
        }
        self.current = run;

        self.state = ProcessorState::AwaitingBeginRun;
        info!(
            experiment = self.current.experiment,
            run = self.current.run,
            "Begin run"
        );
        self.store
            .put(EVENT_META_DATA_NAME, Durability::Event, self.current)?;
        for &id in modules {
            if graph.module_state(id)?.is_active() {
                self.call(graph, id, Stage::BeginRun, |module, store| module.begin_run(store))?;
            }
        }
        self.store.clear_maps(Durability::Event);

        self.run_open = true;
        self.runs += 1;
        self.state = ProcessorState::Running;
        Ok(())
    }

    fn end_run(&mut self, graph: &mut PathGraph, modules: &[ModuleId]) -> FrameworkResult<()> {
        if !self.run_open {
            warn!("End of run requested but no run is open");
            return Ok(());
        }

        self.state = ProcessorState::AwaitingEndRun;
        self.store
            .put(EVENT_META_DATA_NAME, Durability::Event, self.current)?;
        for &id in modules {
            if graph.module_state(id)?.is_active() {
                self.call(graph, id, Stage::EndRun, |module, store| module.end_run(store))?;
            }
        }
        self.store.clear_maps(Durability::Event);
        self.store.clear_maps(Durability::Run);
        info!(
            experiment = self.current.experiment,
            run = self.current.run,
            "End run"
        );

        self.run_open = false;
        self.state = ProcessorState::Running;
        Ok(())
    }

    /// Invoke one callback with the module's log level and record its time
    fn call<T>(
        &mut self,
        graph: &mut PathGraph,
        id: ModuleId,
        stage: Stage,
        callback: impl FnOnce(&mut dyn Module, &mut DataStore) -> ModuleResult<T>,
    ) -> FrameworkResult<T> {
        let entry = graph.entry_mut(id)?;
        self.log_system.enter_module(entry.module.info().log_config());
        let started = Instant::now();
        let result = callback(entry.module.as_mut(), &mut self.store);
        let elapsed = started.elapsed();
        self.log_system.leave_module();

        if !entry
            .module
            .has_properties(ModuleProperties::DONT_COLLECT_STATISTICS)
        {
            entry.stats.record(stage, elapsed);
            self.total.record(stage, elapsed);
        }

        result.map_err(|source| {
            let module = entry.module.name().to_string();
            error!(%module, %stage, error = %source, "Module failed, aborting");
            FrameworkError::ModuleFailed {
                module,
                stage,
                source,
            }
        })
    }

    fn interrupted(&self) -> bool {
        #[cfg(unix)]
        {
            self.handle_interrupts && crate::topology::signals::interrupted()
        }
        #[cfg(not(unix))]
        {
            false
        }
    }

    /// Summary of this process, statistics in module order
    pub fn summary(&self, graph: &PathGraph, modules: &[ModuleId]) -> ProcessSummary {
        ProcessSummary {
            role: ProcessRole::Init,
            proc_id: crate::core::limits::INIT_PROC_ID,
            events_processed: self.events_processed,
            runs: self.runs,
            stop_reason: self.stop_reason,
            last_event: self.current,
            modules: modules
                .iter()
                .filter_map(|&id| graph.statistics(id).ok().cloned())
                .collect(),
            total: self.total.clone(),
        }
    }
}

impl std::fmt::Debug for EventProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventProcessor")
            .field("state", &self.state)
            .field("max_events", &self.max_events)
            .field("events_processed", &self.events_processed)
            .field("current", &self.current)
            .finish()
    }
}
