/*!
 * Path Types
 * Arena indices, the path record and path errors
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Path operation result
pub type PathResult<T> = Result<T, PathError>;

/// Path configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Unknown path {0}")]
    UnknownPath(PathId),

    #[error("Unknown module {0}")]
    UnknownModule(ModuleId),

    #[error("Path '{0}' has no modules")]
    EmptyPath(String),

    #[error("Path '{0}' never ends: no module may request end of data and no event limit is set")]
    NonTerminating(String),
}

/// Index of a module in its `PathGraph`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(pub usize);

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Module({})", self.0)
    }
}

/// Index of a path in its `PathGraph`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathId(pub usize);

impl std::fmt::Display for PathId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Path({})", self.0)
    }
}

/// Ordered module sequence; order is execution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    pub(crate) name: String,
    pub(crate) modules: Vec<ModuleId>,
}

impl Path {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Front-to-back view of the module sequence
    pub fn modules(&self) -> &[ModuleId] {
        &self.modules
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }
}
