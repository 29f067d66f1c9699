/*!
 * Parallel Path Splitting
 * Cut a start path into input, parallel and output segments
 */

use super::graph::PathGraph;
use super::types::{ModuleId, PathId, PathResult};
use crate::core::limits::SETUP_ONLY_MODULE_TYPES;
use crate::module::ModuleProperties;
use tracing::{debug, warn};

/// Segments of a start path for multi-process execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSplit {
    /// Runs once, in the input process
    pub input: Vec<ModuleId>,
    /// Runs in every worker
    pub main: Vec<ModuleId>,
    /// Runs once, in the output process
    pub output: Vec<ModuleId>,
}

impl PathSplit {
    /// Every module of all segments, each once
    pub fn all_modules(&self) -> Vec<ModuleId> {
        let mut modules = Vec::with_capacity(self.input.len() + self.main.len() + self.output.len());
        for &id in self.input.iter().chain(&self.main).chain(&self.output) {
            if !modules.contains(&id) {
                modules.push(id);
            }
        }
        modules
    }
}

/// Whether a module and everything reachable through its conditions may run in workers
fn is_certified(graph: &PathGraph, id: ModuleId) -> PathResult<bool> {
    let module = graph.module(id)?;
    if !module.has_properties(ModuleProperties::PARALLEL_PROCESSING_CERTIFIED) {
        return Ok(false);
    }
    for condition in module.info().conditions() {
        let reachable = graph.flatten(condition.path)?;
        if !graph.all_modules_have(&reachable, ModuleProperties::PARALLEL_PROCESSING_CERTIFIED) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn is_setup_only(graph: &PathGraph, id: ModuleId) -> PathResult<bool> {
    let module = graph.module(id)?;
    Ok(module.has_properties(ModuleProperties::HISTOGRAM_MANAGER)
        || SETUP_ONLY_MODULE_TYPES.contains(&module.info().type_name()))
}

/// Split `start` for parallel processing
///
/// Returns `None` when no segment worth running in parallel exists; the
/// caller then falls back to single-process execution.
pub fn split_path(graph: &PathGraph, start: PathId) -> PathResult<Option<PathSplit>> {
    let modules = graph.path(start)?.modules().to_vec();

    let mut certified = Vec::with_capacity(modules.len());
    for &id in &modules {
        certified.push(is_certified(graph, id)?);
    }

    let mut search_from = 0;
    let (first, end) = loop {
        let Some(first) = (search_from..modules.len()).find(|&i| certified[i]) else {
            warn!(
                path = %graph.path(start)?.name(),
                "No parallel certified modules found, falling back to single process"
            );
            return Ok(None);
        };
        let end = (first..modules.len())
            .find(|&i| !certified[i])
            .unwrap_or(modules.len());

        let mut setup_only = true;
        for &id in &modules[first..end] {
            setup_only &= is_setup_only(graph, id)?;
        }
        if !setup_only {
            break (first, end);
        }

        debug!(first, end, "Parallel section only holds setup modules, moving it to input");
        search_from = end;
    };

    let input = modules[..first].to_vec();
    let mut main = modules[first..end].to_vec();
    let mut output = modules[end..].to_vec();

    // Histogram managers must exist in every process that fills histograms
    let mut managers = Vec::new();
    for &id in &input {
        if graph.module(id)?.has_properties(ModuleProperties::HISTOGRAM_MANAGER) {
            managers.push(id);
        }
    }
    for &id in managers.iter().rev() {
        main.insert(0, id);
        output.insert(0, id);
    }

    debug!(
        input = input.len(),
        main = main.len(),
        output = output.len(),
        "Split path for parallel processing"
    );
    Ok(Some(PathSplit { input, main, output }))
}
