// src/graph/executor.rs

//! Async execution shell around the [`RunCoordinator`].
//!
//! The executor dispatches ready tasks to a [`RunnerBackend`] and consumes
//! completion events from an mpsc channel. Production code uses
//! [`RegistryRunner`], which spawns the registered task bodies onto the
//! runtime; tests can substitute a backend that completes tasks without
//! running anything.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::context::TaskContext;
use crate::errors::{BuildpipeError, Result};
use crate::graph::coordinator::RunCoordinator;
use crate::graph::plan::ExecutionPlan;
use crate::registry::{TaskName, TaskRegistry};

/// Events flowing from the runner back into the executor.
#[derive(Debug)]
pub enum ExecEvent {
    TaskFinished {
        task: TaskName,
        result: Result<()>,
    },
}

/// Trait abstracting how ready tasks are executed.
pub trait RunnerBackend: Send {
    /// Dispatch the given tasks for execution.
    ///
    /// The implementation is free to:
    /// - spawn the registered bodies on the runtime (production)
    /// - record the names and emit synthetic completions (tests)
    fn dispatch(
        &mut self,
        tasks: Vec<TaskName>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production runner: spawns registered task bodies as tokio tasks.
///
/// A bodiless (grouping) task completes successfully without spawning
/// anything beyond the completion event.
pub struct RegistryRunner {
    registry: Arc<TaskRegistry>,
    cx: Arc<TaskContext>,
    events_tx: mpsc::Sender<ExecEvent>,
}

impl RegistryRunner {
    pub fn new(
        registry: Arc<TaskRegistry>,
        cx: Arc<TaskContext>,
        events_tx: mpsc::Sender<ExecEvent>,
    ) -> Self {
        Self {
            registry,
            cx,
            events_tx,
        }
    }
}

impl RunnerBackend for RegistryRunner {
    fn dispatch(
        &mut self,
        tasks: Vec<TaskName>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.events_tx.clone();
        let cx = Arc::clone(&self.cx);
        let bodies: Vec<(TaskName, Option<crate::registry::TaskBody>)> = tasks
            .into_iter()
            .map(|name| {
                let body = self.registry.get(&name).and_then(|t| t.body.clone());
                (name, body)
            })
            .collect();

        Box::pin(async move {
            for (name, body) in bodies {
                let tx = tx.clone();
                let cx = Arc::clone(&cx);
                tokio::spawn(async move {
                    info!(task = %name, "starting task");
                    let result = match body {
                        Some(body) => body(cx).await.map_err(|e| match e {
                            // Keep already-specific errors unmasked.
                            e @ (BuildpipeError::StageError { .. }
                            | BuildpipeError::TaskFailed { .. }
                            | BuildpipeError::TestsFailed(_)) => e,
                            other => BuildpipeError::TaskFailed {
                                task: name.clone(),
                                source: other.into(),
                            },
                        }),
                        None => Ok(()),
                    };
                    match &result {
                        Ok(()) => info!(task = %name, "task finished"),
                        Err(err) => info!(task = %name, error = %err, "task failed"),
                    }
                    let _ = tx.send(ExecEvent::TaskFinished { task: name, result }).await;
                });
            }
            Ok(())
        })
    }
}

/// Drives one run invocation to completion.
pub struct GraphExecutor<B: RunnerBackend> {
    coordinator: RunCoordinator,
    events_rx: mpsc::Receiver<ExecEvent>,
    backend: B,
}

impl<B: RunnerBackend> fmt::Debug for GraphExecutor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphExecutor")
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl<B: RunnerBackend> GraphExecutor<B> {
    pub fn new(plan: ExecutionPlan, events_rx: mpsc::Receiver<ExecEvent>, backend: B) -> Self {
        Self {
            coordinator: RunCoordinator::new(plan),
            events_rx,
            backend,
        }
    }

    /// Run the plan to completion.
    ///
    /// Returns the originating error of the first failed task, unmasked.
    /// In-flight tasks are always awaited before returning.
    pub async fn run(mut self) -> Result<()> {
        let ready = self.coordinator.initial_ready();
        debug!(?ready, "dispatching initial ready set");
        self.backend.dispatch(ready).await?;

        while let Some(event) = self.events_rx.recv().await {
            let ExecEvent::TaskFinished { task, result } = event;
            let step = self.coordinator.on_finished(&task, result);

            if !step.newly_ready.is_empty() {
                debug!(ready = ?step.newly_ready, "dispatching newly ready tasks");
                self.backend.dispatch(step.newly_ready).await?;
            }

            if step.run_finished {
                break;
            }
        }

        match self.coordinator.take_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Resolve and execute a task against the registry with the production
/// runner. This is the entry point used by the CLI and the dev loop.
pub async fn execute_task(
    registry: &Arc<TaskRegistry>,
    cx: &Arc<TaskContext>,
    name: &str,
) -> Result<()> {
    let plan = ExecutionPlan::resolve(registry, name)?;
    info!(task = name, steps = plan.len(), "executing task");

    let (events_tx, events_rx) = mpsc::channel::<ExecEvent>(64);
    let runner = RegistryRunner::new(Arc::clone(registry), Arc::clone(cx), events_tx);
    let executor = GraphExecutor::new(plan, events_rx, runner);
    executor.run().await
}
