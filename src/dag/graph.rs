// src/dag/graph.rs

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::config::model::ConfigFile;
use crate::dag::task_info::TaskSpec;
use crate::engine::TaskName;
use crate::errors::{AssetdagError, Result};

/// DFS colouring used by [`TaskGraph::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

/// Immutable task graph keyed by task name.
///
/// Edges point from a prerequisite to the task that needs it. Construction
/// rejects unknown prerequisites and cycles, so a `TaskGraph` value is always
/// a DAG.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    specs: HashMap<TaskName, TaskSpec>,
    /// Task names in declaration order.
    names: Vec<TaskName>,
}

impl TaskGraph {
    /// Build a graph from task specs, failing fast on configuration errors.
    pub fn new(specs: Vec<TaskSpec>) -> Result<Self> {
        let mut known = HashSet::with_capacity(specs.len());
        let mut names = Vec::with_capacity(specs.len());

        for spec in &specs {
            if !known.insert(spec.name.as_str()) {
                return Err(AssetdagError::ConfigError(format!(
                    "task '{}' is defined more than once",
                    spec.name
                )));
            }
            names.push(spec.name.clone());
        }

        for spec in &specs {
            if let Some(dep) = spec
                .prerequisites
                .iter()
                .find(|dep| !known.contains(dep.as_str()))
            {
                return Err(AssetdagError::ConfigError(format!(
                    "task '{}' has unknown prerequisite '{}'",
                    spec.name, dep
                )));
            }
        }

        let edges = specs
            .iter()
            .map(|s| (s.name.as_str(), s.prerequisites.as_slice()));
        if let Some(cycle) = find_cycle(edges) {
            return Err(AssetdagError::CyclicDependency { cycle });
        }

        let specs = specs.into_iter().map(|s| (s.name.clone(), s)).collect();

        Ok(Self { specs, names })
    }

    /// Build the graph from a validated [`ConfigFile`].
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let env = cfg.environment();
        let specs = cfg
            .tasks()
            .iter()
            .map(|(name, tc)| TaskSpec::from_config(name, tc, env))
            .collect();
        Self::new(specs)
    }

    pub fn get(&self, name: &str) -> Option<&TaskSpec> {
        self.specs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All task names in declaration order.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Immediate prerequisites of a task (its `after` list).
    pub fn prerequisites_of(&self, name: &str) -> &[TaskName] {
        self.specs
            .get(name)
            .map(|s| s.prerequisites.as_slice())
            .unwrap_or(&[])
    }

    /// Order in which `requested` tasks and their prerequisite closure run.
    ///
    /// Depth-first from each requested name in the given order, prerequisites
    /// first. A task reached from several branches appears once, at its
    /// first position. Unknown names fail with `TaskNotFound`.
    pub fn resolve<S: AsRef<str>>(&self, requested: &[S]) -> Result<Vec<TaskName>> {
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut path: Vec<&str> = Vec::new();
        let mut order: Vec<TaskName> = Vec::new();

        for name in requested {
            self.visit(name.as_ref(), &mut marks, &mut path, &mut order)?;
        }

        debug!(?order, "resolved run order");
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        name: &str,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
        order: &mut Vec<TaskName>,
    ) -> Result<()> {
        let Some((key, spec)) = self.specs.get_key_value(name) else {
            return Err(AssetdagError::TaskNotFound(name.to_string()));
        };
        let key = key.as_str();

        match marks.get(key) {
            Some(Mark::Visited) => return Ok(()),
            Some(Mark::Visiting) => {
                // `path` runs dependent -> prerequisite; report it in run order.
                let start = path.iter().position(|n| *n == key).unwrap_or(0);
                let mut cycle: Vec<TaskName> =
                    path[start..].iter().map(|n| n.to_string()).collect();
                cycle.reverse();
                return Err(AssetdagError::CyclicDependency { cycle });
            }
            None => {}
        }

        marks.insert(key, Mark::Visiting);
        path.push(key);

        for dep in &spec.prerequisites {
            self.visit(dep, marks, path, order)?;
        }

        path.pop();
        marks.insert(key, Mark::Visited);
        order.push(key.to_string());
        Ok(())
    }

    /// A full topological order of every task.
    pub fn topological_order(&self) -> Vec<TaskName> {
        // Always succeeds: construction rejected cycles.
        self.resolve(&self.names).unwrap_or_default()
    }
}

/// Look for a dependency cycle among `(task, prerequisites)` pairs.
///
/// Returns the tasks on one cycle in run order (each one is a prerequisite of
/// the next, and the last is a prerequisite of the first), or `None` for a DAG.
/// Unknown prerequisites are ignored here.
pub fn find_cycle<'a>(
    edges: impl IntoIterator<Item = (&'a str, &'a [TaskName])>,
) -> Option<Vec<TaskName>> {
    // Edge direction: prerequisite -> task.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    let edges: Vec<(&str, &[TaskName])> = edges.into_iter().collect();

    for &(name, _) in &edges {
        graph.add_node(name);
    }
    for &(name, deps) in &edges {
        for dep in deps {
            if graph.contains_node(dep.as_str()) {
                graph.add_edge(dep.as_str(), name, ());
            }
        }
    }

    let start = match toposort(&graph, None) {
        Ok(_) => return None,
        Err(cycle) => cycle.node_id(),
    };

    // The reported node is on (or leads into) a cycle; walk from it until a
    // node repeats on the current path.
    let mut on_path: Vec<&str> = Vec::new();
    let mut done: HashSet<&str> = HashSet::new();
    walk_for_cycle(&graph, start, &mut on_path, &mut done)
}

fn walk_for_cycle<'a>(
    graph: &DiGraphMap<&'a str, ()>,
    node: &'a str,
    on_path: &mut Vec<&'a str>,
    done: &mut HashSet<&'a str>,
) -> Option<Vec<TaskName>> {
    if let Some(pos) = on_path.iter().position(|n| *n == node) {
        return Some(on_path[pos..].iter().map(|n| n.to_string()).collect());
    }
    if done.contains(node) {
        return None;
    }

    on_path.push(node);
    for next in graph.neighbors(node) {
        if let Some(cycle) = walk_for_cycle(graph, next, on_path, done) {
            return Some(cycle);
        }
    }
    on_path.pop();
    done.insert(node);
    None
}
