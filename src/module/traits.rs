/*!
 * Module Traits
 * The lifecycle contract every unit of work implements
 */

use super::info::ModuleInfo;
use super::types::{ModuleProperties, ModuleResult, ProcessRecordType};
use crate::datastore::DataStore;

/// A unit of work driven by the event processor
///
/// Call order per process: `initialize` once, then for every run `begin_run`,
/// `event` per event and `end_run`, and finally `terminate` once. Returning
/// `Err` from any callback aborts processing; `ModuleError::Fatal` is the
/// module-side way of giving up on the whole job.
pub trait Module: Send {
    fn info(&self) -> &ModuleInfo;

    fn info_mut(&mut self) -> &mut ModuleInfo;

    /// Register store entries and check prerequisites
    fn initialize(&mut self, _store: &mut DataStore) -> ModuleResult<()> {
        Ok(())
    }

    fn begin_run(&mut self, _store: &mut DataStore) -> ModuleResult<()> {
        Ok(())
    }

    /// Process one event; anything but `Event` requests a framework transition
    fn event(&mut self, store: &mut DataStore) -> ModuleResult<ProcessRecordType>;

    fn end_run(&mut self, _store: &mut DataStore) -> ModuleResult<()> {
        Ok(())
    }

    fn terminate(&mut self, _store: &mut DataStore) -> ModuleResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        self.info().name()
    }

    fn has_properties(&self, flags: ModuleProperties) -> bool {
        self.info().has_properties(flags)
    }
}
