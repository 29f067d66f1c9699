/*!
 * Path Subsystem
 * Module arena, condition graph, validation and parallel splitting
 */

pub mod graph;
pub mod split;
pub mod types;

// Re-export public API
pub use graph::PathGraph;
pub(crate) use graph::ModuleEntry;
pub use split::{split_path, PathSplit};
pub use types::{ModuleId, Path, PathError, PathId, PathResult};
