/*!
 * Event Info Setter
 * Generates empty events for a list of experiments and runs
 */

use crate::core::limits::EVENT_META_DATA_NAME;
use crate::core::types::{EventNumber, Experiment, RunNumber};
use crate::datastore::{DataStore, Durability, EventMetaData};
use crate::module::{Module, ModuleError, ModuleInfo, ModuleProperties, ModuleResult, ProcessRecordType};
use tracing::{debug, warn};

/// Input module producing `evt_num_list[i]` events for run `run_list[i]`
/// of experiment `exp_list[i]`
///
/// Announces every run with `BeginRun` and reports `EndOfData` together with
/// the last event.
pub struct EventInfoSetter {
    info: ModuleInfo,
    runs: Vec<(Experiment, RunNumber, EventNumber)>,
    run_index: usize,
    event_in_run: EventNumber,
    run_announced: bool,
}

impl Default for EventInfoSetter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventInfoSetter {
    pub fn new() -> Self {
        let mut info = ModuleInfo::new("EventInfoSetter")
            .with_description("Sets the event meta data for generated events")
            .with_properties(
                ModuleProperties::INPUT
                    | ModuleProperties::TRIGGERS_NEW_RUN
                    | ModuleProperties::TRIGGERS_END_OF_DATA,
            );
        info.params_mut()
            .add("exp_list", "Experiment numbers", vec![0u32])
            .add("run_list", "Run numbers", vec![0u32])
            .add("evt_num_list", "Number of events per run", vec![1u64]);

        Self {
            info,
            runs: Vec::new(),
            run_index: 0,
            event_in_run: 0,
            run_announced: false,
        }
    }

    /// Configure all three lists from `(experiment, run, events)` triples
    pub fn with_runs(mut self, runs: &[(Experiment, RunNumber, EventNumber)]) -> ModuleResult<Self> {
        let params = self.info.params_mut();
        params.set("exp_list", runs.iter().map(|r| r.0).collect::<Vec<_>>())?;
        params.set("run_list", runs.iter().map(|r| r.1).collect::<Vec<_>>())?;
        params.set("evt_num_list", runs.iter().map(|r| r.2).collect::<Vec<_>>())?;
        Ok(self)
    }

    fn set_meta(store: &mut DataStore, meta: EventMetaData) -> ModuleResult<()> {
        store.put(EVENT_META_DATA_NAME, Durability::Event, meta)?;
        Ok(())
    }
}

impl Module for EventInfoSetter {
    fn info(&self) -> &ModuleInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut ModuleInfo {
        &mut self.info
    }

    fn initialize(&mut self, store: &mut DataStore) -> ModuleResult<()> {
        store.require(EVENT_META_DATA_NAME, Durability::Event)?;

        let params = self.info.params();
        let experiments: Vec<Experiment> = params.get("exp_list")?;
        let runs: Vec<RunNumber> = params.get("run_list")?;
        let events: Vec<EventNumber> = params.get("evt_num_list")?;
        if experiments.len() != runs.len() || runs.len() != events.len() {
            return Err(ModuleError::InvalidParameter {
                name: "exp_list".to_string(),
                reason: format!(
                    "exp_list, run_list and evt_num_list differ in length ({}, {}, {})",
                    experiments.len(),
                    runs.len(),
                    events.len()
                ),
            });
        }

        self.runs = experiments
            .into_iter()
            .zip(runs)
            .zip(events)
            .map(|((exp, run), n)| (exp, run, n))
            .filter(|&(exp, run, n)| {
                if n == 0 {
                    warn!(experiment = exp, run, "Run without events, skipping it");
                }
                n > 0
            })
            .collect();
        if self.runs.is_empty() {
            return Err(ModuleError::InvalidParameter {
                name: "evt_num_list".to_string(),
                reason: "no run has any events".to_string(),
            });
        }
        debug!(runs = self.runs.len(), "Event generation configured");
        Ok(())
    }

    fn event(&mut self, store: &mut DataStore) -> ModuleResult<ProcessRecordType> {
        let Some(&(experiment, run, n_events)) = self.runs.get(self.run_index) else {
            return Ok(ProcessRecordType::EndOfData);
        };

        if !self.run_announced {
            Self::set_meta(store, EventMetaData::new(experiment, run, 0))?;
            self.run_announced = true;
            self.event_in_run = 0;
            return Ok(ProcessRecordType::BeginRun);
        }

        self.event_in_run += 1;
        Self::set_meta(store, EventMetaData::new(experiment, run, self.event_in_run))?;

        if self.event_in_run < n_events {
            return Ok(ProcessRecordType::Event);
        }
        self.run_index += 1;
        self.run_announced = false;
        if self.run_index == self.runs.len() {
            Ok(ProcessRecordType::EndOfData)
        } else {
            Ok(ProcessRecordType::Event)
        }
    }
}
