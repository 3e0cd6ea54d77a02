// src/graph/plan.rs

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::errors::{BuildpipeError, Result};
use crate::registry::{TaskName, TaskRegistry};

/// Validated execution plan for one run invocation.
///
/// Holds the transitive dependency closure of the requested task in
/// topological order, plus adjacency in both directions. Resolution fails
/// with [`BuildpipeError::UnknownTask`] or [`BuildpipeError::DependencyCycle`]
/// before any task body executes.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub requested: TaskName,
    /// Topological order over the closure: dependencies before dependents.
    pub order: Vec<TaskName>,
    deps: HashMap<TaskName, Vec<TaskName>>,
    dependents: HashMap<TaskName, Vec<TaskName>>,
}

impl ExecutionPlan {
    /// Resolve the requested task against the registry.
    pub fn resolve(registry: &TaskRegistry, requested: &str) -> Result<Self> {
        if !registry.contains(requested) {
            return Err(BuildpipeError::UnknownTask(requested.to_string()));
        }

        // Transitive closure via BFS; a visited set keeps this terminating
        // even on cyclic declarations, which toposort rejects below.
        let mut closure: HashSet<TaskName> = HashSet::new();
        let mut queue: VecDeque<TaskName> = VecDeque::new();
        queue.push_back(requested.to_string());

        while let Some(name) = queue.pop_front() {
            if !closure.insert(name.clone()) {
                continue;
            }
            for dep in registry.deps_of(&name) {
                if !registry.contains(dep) {
                    return Err(BuildpipeError::UnknownTask(format!(
                        "{dep}' (referenced as a dependency of '{name}'"
                    )));
                }
                queue.push_back(dep.clone());
            }
        }

        // Edge direction: dep -> task, so toposort yields deps first.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in &closure {
            graph.add_node(name.as_str());
        }
        for name in &closure {
            for dep in registry.deps_of(name) {
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }

        let order: Vec<TaskName> = match toposort(&graph, None) {
            Ok(order) => order.into_iter().map(|s| s.to_string()).collect(),
            Err(cycle) => {
                let node = cycle.node_id();
                return Err(BuildpipeError::DependencyCycle(format!(
                    "cycle involving task '{node}'"
                )));
            }
        };

        let mut deps: HashMap<TaskName, Vec<TaskName>> = HashMap::new();
        let mut dependents: HashMap<TaskName, Vec<TaskName>> = HashMap::new();
        for name in &order {
            let direct = registry.deps_of(name).to_vec();
            for dep in &direct {
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(name.clone());
            }
            deps.insert(name.clone(), direct);
        }

        debug!(requested, ?order, "resolved execution plan");

        Ok(Self {
            requested: requested.to_string(),
            order,
            deps,
            dependents,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.deps.contains_key(name)
    }

    /// Direct dependencies of a task within this plan.
    pub fn deps_of(&self, name: &str) -> &[TaskName] {
        self.deps.get(name).map(|d| d.as_slice()).unwrap_or(&[])
    }

    /// Direct dependents of a task within this plan.
    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.dependents
            .get(name)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
