/*!
 * Module Subsystem
 * Lifecycle contract, capabilities, parameters, conditions and statistics
 */

mod condition;
mod info;
mod params;
mod stats;
pub mod traits;
pub mod types;

// Re-export public API
pub use condition::{AfterConditionPath, ConditionOperator, ModuleCondition};
pub use info::ModuleInfo;
pub use params::{ModuleParam, ModuleParams};
pub use stats::{ModuleStatistics, StageStatistics};
pub use traits::Module;
pub use types::{ModuleError, ModuleProperties, ModuleResult, ModuleState, ProcessRecordType};
