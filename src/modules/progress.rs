/*!
 * Progress
 * Logs the number of processed events at decade intervals
 */

use crate::core::limits::EVENT_META_DATA_NAME;
use crate::datastore::{DataStore, Durability, EventMetaData};
use crate::module::{Module, ModuleInfo, ModuleProperties, ModuleResult, ProcessRecordType};
use tracing::info;

/// Whether `count` is 1..9, 10, 20..90, 100, 200..
fn is_decade_step(count: u64) -> bool {
    if count == 0 {
        return false;
    }
    let mut step = 1;
    while count / step >= 10 {
        step *= 10;
    }
    count % step == 0
}

pub struct Progress {
    info: ModuleInfo,
    events: u64,
    runs: u64,
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress {
    pub fn new() -> Self {
        Self {
            info: ModuleInfo::new("Progress")
                .with_description("Logs the number of processed events")
                .with_properties(ModuleProperties::PARALLEL_PROCESSING_CERTIFIED),
            events: 0,
            runs: 0,
        }
    }

    pub fn events(&self) -> u64 {
        self.events
    }
}

impl Module for Progress {
    fn info(&self) -> &ModuleInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut ModuleInfo {
        &mut self.info
    }

    fn begin_run(&mut self, store: &mut DataStore) -> ModuleResult<()> {
        self.runs += 1;
        if let Some(meta) = store.get::<EventMetaData>(EVENT_META_DATA_NAME, Durability::Event) {
            info!(experiment = meta.experiment, run = meta.run, "Begin of run");
        }
        Ok(())
    }

    fn event(&mut self, store: &mut DataStore) -> ModuleResult<ProcessRecordType> {
        self.events += 1;
        if is_decade_step(self.events) {
            let meta = store
                .get::<EventMetaData>(EVENT_META_DATA_NAME, Durability::Event)
                .copied()
                .unwrap_or_default();
            info!(events = self.events, current = %meta, "Processed events");
        }
        Ok(ProcessRecordType::Event)
    }

    fn terminate(&mut self, _store: &mut DataStore) -> ModuleResult<()> {
        info!(events = self.events, runs = self.runs, "Processing done");
        Ok(())
    }
}
