/*!
 * Prescale
 * Returns true for every n-th event, for use with conditions
 */

use crate::datastore::DataStore;
use crate::module::{Module, ModuleError, ModuleInfo, ModuleProperties, ModuleResult, ProcessRecordType};

pub struct Prescale {
    info: ModuleInfo,
    prescale: u64,
    seen: u64,
}

impl Default for Prescale {
    fn default() -> Self {
        Self::new()
    }
}

impl Prescale {
    pub fn new() -> Self {
        let mut info = ModuleInfo::new("Prescale")
            .with_description("Sets return value 1 on every n-th event and 0 otherwise")
            .with_properties(ModuleProperties::PARALLEL_PROCESSING_CERTIFIED);
        info.params_mut()
            .add("prescale", "Keep one out of this many events", 1u64);
        Self {
            info,
            prescale: 1,
            seen: 0,
        }
    }

    pub fn with_prescale(mut self, prescale: u64) -> ModuleResult<Self> {
        self.info.params_mut().set("prescale", prescale)?;
        Ok(self)
    }
}

impl Module for Prescale {
    fn info(&self) -> &ModuleInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut ModuleInfo {
        &mut self.info
    }

    fn initialize(&mut self, _store: &mut DataStore) -> ModuleResult<()> {
        self.prescale = self.info.params().get("prescale")?;
        if self.prescale == 0 {
            return Err(ModuleError::InvalidParameter {
                name: "prescale".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn event(&mut self, _store: &mut DataStore) -> ModuleResult<ProcessRecordType> {
        self.seen += 1;
        self.info.set_return_bool(self.seen % self.prescale == 0);
        Ok(ProcessRecordType::Event)
    }
}
