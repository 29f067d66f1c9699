/*!
 * Path Graph
 * Arena of modules and paths; condition paths are edges between paths
 *
 * Modules are owned by the graph and referenced from paths by `ModuleId`,
 * so one module may appear in several paths. Condition paths may point back
 * to earlier paths; traversal is driven by indices, never by recursion.
 */

use super::types::{ModuleId, Path, PathError, PathId, PathResult};
use crate::module::{Module, ModuleCondition, ModuleProperties, ModuleState, ModuleStatistics};
use std::collections::HashSet;
use tracing::{debug, warn};

/// A registered module with its per-process bookkeeping
pub(crate) struct ModuleEntry {
    pub(crate) module: Box<dyn Module>,
    pub(crate) state: ModuleState,
    pub(crate) stats: ModuleStatistics,
}

/// Modules and paths of one job
#[derive(Default)]
pub struct PathGraph {
    modules: Vec<ModuleEntry>,
    paths: Vec<Path>,
}

impl PathGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a module
    pub fn add_module(&mut self, module: Box<dyn Module>) -> ModuleId {
        let id = ModuleId(self.modules.len());
        debug!(module = %module.name(), id = id.0, "Registered module");
        let stats = ModuleStatistics::new(module.name());
        self.modules.push(ModuleEntry {
            module,
            state: ModuleState::Registered,
            stats,
        });
        id
    }

    /// Convenience wrapper around `add_module`
    pub fn register<M: Module + 'static>(&mut self, module: M) -> ModuleId {
        self.add_module(Box::new(module))
    }

    pub fn create_path(&mut self, name: &str) -> PathId {
        let id = PathId(self.paths.len());
        self.paths.push(Path {
            name: name.to_string(),
            modules: Vec::new(),
        });
        id
    }

    /// Append a module to the end of a path
    pub fn append(&mut self, path: PathId, module: ModuleId) -> PathResult<()> {
        self.check_module(module)?;
        self.path_mut(path)?.modules.push(module);
        Ok(())
    }

    /// Append all modules of `source` to `target`
    pub fn append_path(&mut self, target: PathId, source: PathId) -> PathResult<()> {
        let modules = self.path(source)?.modules.clone();
        self.path_mut(target)?.modules.extend(modules);
        Ok(())
    }

    /// Insert a module at the front of a path
    pub fn prepend(&mut self, path: PathId, module: ModuleId) -> PathResult<()> {
        self.check_module(module)?;
        self.path_mut(path)?.modules.insert(0, module);
        Ok(())
    }

    /// Attach a condition; the target path must already exist
    pub fn add_condition(&mut self, module: ModuleId, condition: ModuleCondition) -> PathResult<()> {
        self.path(condition.path)?;
        let entry = self.entry_mut(module)?;
        debug!(module = %entry.module.name(), %condition, "Added module condition");
        entry.module.info_mut().push_condition(condition);
        Ok(())
    }

    pub fn path(&self, id: PathId) -> PathResult<&Path> {
        self.paths.get(id.0).ok_or(PathError::UnknownPath(id))
    }

    fn path_mut(&mut self, id: PathId) -> PathResult<&mut Path> {
        self.paths.get_mut(id.0).ok_or(PathError::UnknownPath(id))
    }

    pub fn find_path(&self, name: &str) -> Option<PathId> {
        self.paths.iter().position(|p| p.name == name).map(PathId)
    }

    pub fn module(&self, id: ModuleId) -> PathResult<&dyn Module> {
        self.modules
            .get(id.0)
            .map(|entry| entry.module.as_ref())
            .ok_or(PathError::UnknownModule(id))
    }

    pub fn module_mut(&mut self, id: ModuleId) -> PathResult<&mut (dyn Module + 'static)> {
        self.entry_mut(id).map(|entry| entry.module.as_mut())
    }

    pub fn module_state(&self, id: ModuleId) -> PathResult<ModuleState> {
        self.entry(id).map(|entry| entry.state)
    }

    pub fn statistics(&self, id: ModuleId) -> PathResult<&ModuleStatistics> {
        self.entry(id).map(|entry| &entry.stats)
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    pub(crate) fn entry(&self, id: ModuleId) -> PathResult<&ModuleEntry> {
        self.modules.get(id.0).ok_or(PathError::UnknownModule(id))
    }

    pub(crate) fn entry_mut(&mut self, id: ModuleId) -> PathResult<&mut ModuleEntry> {
        self.modules.get_mut(id.0).ok_or(PathError::UnknownModule(id))
    }

    fn check_module(&self, id: ModuleId) -> PathResult<()> {
        self.entry(id).map(|_| ())
    }

    /// Modules reachable from `start`, each once, in registration order
    ///
    /// A module is followed directly by the modules of its condition paths,
    /// matching the order in which they can first execute.
    pub fn flatten(&self, start: PathId) -> PathResult<Vec<ModuleId>> {
        self.path(start)?;

        let mut order = Vec::new();
        let mut seen_modules = HashSet::new();
        let mut seen_paths = HashSet::from([start]);
        let mut stack = vec![(start, 0usize)];

        while let Some((path, index)) = stack.pop() {
            let modules = &self.path(path)?.modules;
            let Some(&module) = modules.get(index) else {
                continue;
            };
            stack.push((path, index + 1));

            if seen_modules.insert(module) {
                order.push(module);
                let conditions = self.module(module)?.info().conditions();
                // Reverse so the first condition path is visited first
                for condition in conditions.iter().rev() {
                    self.path(condition.path)?;
                    if seen_paths.insert(condition.path) {
                        stack.push((condition.path, 0));
                    }
                }
            }
        }

        Ok(order)
    }

    /// Whether every module in `modules` declares `flags`
    pub fn all_modules_have(&self, modules: &[ModuleId], flags: ModuleProperties) -> bool {
        modules
            .iter()
            .all(|&id| self.module(id).map_or(false, |m| m.has_properties(flags)))
    }

    /// Static checks run before any module is scheduled
    pub fn validate(&self, start: PathId, max_events: u64) -> PathResult<()> {
        let path = self.path(start)?;
        if path.is_empty() {
            return Err(PathError::EmptyPath(path.name.clone()));
        }

        let modules = self.flatten(start)?;
        for &id in &modules {
            for condition in self.module(id)?.info().conditions() {
                if self.path(condition.path)?.is_empty() {
                    warn!(
                        module = %self.module(id)?.name(),
                        path = %self.path(condition.path)?.name,
                        "Condition path is empty"
                    );
                }
            }
        }

        let can_end = modules.iter().any(|&id| {
            self.module(id)
                .map_or(false, |m| m.has_properties(ModuleProperties::TRIGGERS_END_OF_DATA))
        });
        if max_events == 0 && !can_end {
            return Err(PathError::NonTerminating(path.name.clone()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for PathGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathGraph")
            .field("modules", &self.modules.len())
            .field("paths", &self.paths)
            .finish()
    }
}
