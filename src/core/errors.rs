/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 */

use super::types::Stage;
use miette::Diagnostic;
use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::datastore::StoreError;
pub use crate::module::ModuleError;
pub use crate::path::PathError;
pub use crate::topology::TopologyError;

/// Unified framework error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum FrameworkError {
    #[error("Module '{module}' failed in {stage}: {source}")]
    #[diagnostic(
        code(framework::module_failed),
        help("The module aborted processing. Its log output above names the cause.")
    )]
    ModuleFailed {
        module: String,
        stage: Stage,
        source: ModuleError,
    },

    #[error("Condition paths nested deeper than {depth} levels at module '{module}'")]
    #[diagnostic(
        code(framework::condition_depth),
        help("A condition path with AfterConditionPath::Continue loops back into itself.")
    )]
    ConditionDepthExceeded { module: String, depth: usize },

    #[error("Path error: {0}")]
    #[diagnostic(
        code(framework::path),
        help("Fix the path configuration before starting the job.")
    )]
    Path(#[from] PathError),

    #[error("Process topology error: {0}")]
    #[diagnostic(
        code(framework::topology),
        help("Check the number of processes and the system process limits.")
    )]
    Topology(#[from] TopologyError),

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(framework::configuration),
        help("Review the EVPROC_* environment variables.")
    )]
    Config(#[from] ConfigError),

    #[error("Data store error: {0}")]
    #[diagnostic(code(framework::datastore))]
    Store(#[from] StoreError),
}

impl FrameworkError {
    /// Name of the module responsible for the error, if any
    pub fn module(&self) -> Option<&str> {
        match self {
            FrameworkError::ModuleFailed { module, .. }
            | FrameworkError::ConditionDepthExceeded { module, .. } => Some(module),
            _ => None,
        }
    }
}
