/*!
 * Framework Limits and Constants
 *
 * Centralized location for process numbering, table sizing and timing values.
 * Organized by subsystem.
 */

use std::time::Duration;

// =============================================================================
// PROCESS TOPOLOGY
// =============================================================================

/// Slots reserved next to the workers: input, output and proxy
pub const NON_WORKER_SLOTS: usize = 3;

/// Process ID of a process that has not been assigned a role
pub const INIT_PROC_ID: i32 = -1;

/// Process ID of the input process
pub const INPUT_PROC_ID: i32 = 10_000;

/// Process ID of the output process
pub const OUTPUT_PROC_ID: i32 = 20_000;

/// Process ID of the proxy process
pub const PROXY_PROC_ID: i32 = 30_000;

/// Process ID of the monitoring process
pub const MONITOR_PROC_ID: i32 = 40_000;

/// Worker process IDs start here (worker index 0 gets this value)
pub const WORKER_PROC_ID_BASE: i32 = 1;

/// Sleep between checks while waiting for all children to exit
pub const DEFAULT_WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

// =============================================================================
// EVENT PROCESSING
// =============================================================================

/// Maximum nesting of condition paths with `AfterConditionPath::Continue`
/// Guards against condition graphs that loop back into a continuing path
pub const MAX_CONDITION_DEPTH: usize = 64;

/// Module types that do not make a parallel section worth forking for
pub const SETUP_ONLY_MODULE_TYPES: &[&str] = &["HistoManager", "Gearbox", "Geometry"];

/// Store name under which the event meta data lives
pub const EVENT_META_DATA_NAME: &str = "EventMetaData";
