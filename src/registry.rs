// src/registry.rs

//! The task registry: named units of build work.
//!
//! Tasks are registered in code at process startup and the registry is
//! immutable afterwards. A task holds an ordered dependency list and an
//! optional executable body; bodiless tasks are pure grouping nodes.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::TaskContext;
use crate::errors::{BuildpipeError, Result};

/// Canonical task name type.
pub type TaskName = String;

/// Future returned by a task body.
pub type BoxTaskFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// A task body: an async closure over the shared context.
///
/// `Arc` so the executor can clone it onto a spawned runtime task.
pub type TaskBody = Arc<dyn Fn(Arc<TaskContext>) -> BoxTaskFuture + Send + Sync>;

/// A named unit of build work.
#[derive(Clone)]
pub struct Task {
    pub name: TaskName,
    /// Tasks that must complete successfully before this one starts.
    pub deps: Vec<TaskName>,
    /// Absent for grouping tasks.
    pub body: Option<TaskBody>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("deps", &self.deps)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Mapping from task name to task, filled once at startup.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<TaskName, Task>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
        }
    }

    /// Register a task with a body.
    ///
    /// The closure is stored as-is; it runs only when the graph executor
    /// dispatches the task.
    pub fn register<F, Fut>(
        &mut self,
        name: impl Into<TaskName>,
        deps: &[&str],
        body: F,
    ) -> Result<()>
    where
        F: Fn(Arc<TaskContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let body: TaskBody = Arc::new(move |cx| Box::pin(body(cx)));
        self.insert(name.into(), deps, Some(body))
    }

    /// Register a bodiless grouping task: it completes as soon as its
    /// dependencies have.
    pub fn register_group(&mut self, name: impl Into<TaskName>, deps: &[&str]) -> Result<()> {
        self.insert(name.into(), deps, None)
    }

    fn insert(&mut self, name: TaskName, deps: &[&str], body: Option<TaskBody>) -> Result<()> {
        if self.tasks.contains_key(&name) {
            return Err(BuildpipeError::ConfigError(format!(
                "task '{name}' registered twice"
            )));
        }
        let task = Task {
            name: name.clone(),
            deps: deps.iter().map(|d| d.to_string()).collect(),
            body,
        };
        self.tasks.insert(name, task);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// All task names, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|s| s.as_str())
    }

    /// Direct dependencies of a task, empty for unknown names.
    pub fn deps_of(&self, name: &str) -> &[TaskName] {
        self.tasks
            .get(name)
            .map(|t| t.deps.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
