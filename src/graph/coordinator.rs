// src/graph/coordinator.rs

//! Pure per-run state machine.
//!
//! The coordinator consumes task completion results and decides which tasks
//! become ready. It has no channels, no tokio types, and performs no IO, so
//! it can be unit tested deterministically; the async shell lives in
//! [`crate::graph::executor`].

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::errors::BuildpipeError;
use crate::graph::plan::ExecutionPlan;
use crate::registry::TaskName;

/// Per-run state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting on dependencies.
    Pending,
    /// Dispatched to the runner.
    Running,
    DoneSuccess,
    DoneFailed,
    /// Withheld because an upstream task failed, or because the run halted
    /// before this task became ready. Never started.
    Skipped,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskState::Pending | TaskState::Running)
    }
}

/// What changed as a result of one completion.
#[derive(Debug, Default)]
pub struct StepResult {
    /// Tasks that became ready and were marked Running.
    pub newly_ready: Vec<TaskName>,
    /// Tasks newly withheld because of an upstream failure.
    pub newly_skipped: Vec<TaskName>,
    /// Whether the run is now finished (no task Pending or Running).
    pub run_finished: bool,
}

/// Tracks one run invocation over an [`ExecutionPlan`].
///
/// Failure policy: on the first failure the coordinator stops releasing new
/// tasks, marks transitive dependents of the failed task as `Skipped`, and
/// retains the originating error. Already-running tasks are awaited by the
/// shell, never killed.
#[derive(Debug)]
pub struct RunCoordinator {
    plan: ExecutionPlan,
    states: HashMap<TaskName, TaskState>,
    first_error: Option<BuildpipeError>,
    halted: bool,
}

impl RunCoordinator {
    pub fn new(plan: ExecutionPlan) -> Self {
        let states = plan
            .order
            .iter()
            .map(|name| (name.clone(), TaskState::Pending))
            .collect();
        Self {
            plan,
            states,
            first_error: None,
            halted: false,
        }
    }

    pub fn state_of(&self, name: &str) -> Option<TaskState> {
        self.states.get(name).copied()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Tasks ready at the start of the run (no dependencies, or all
    /// dependencies outside... there are none outside the plan, so: no
    /// dependencies). Marks them Running.
    pub fn initial_ready(&mut self) -> Vec<TaskName> {
        self.collect_ready()
    }

    /// Record a completion and compute the resulting step.
    pub fn on_finished(
        &mut self,
        task: &str,
        result: Result<(), BuildpipeError>,
    ) -> StepResult {
        let mut step = StepResult::default();

        match self.states.get_mut(task) {
            Some(state @ TaskState::Running) => match result {
                Ok(()) => {
                    *state = TaskState::DoneSuccess;
                    debug!(task, "task completed successfully");
                }
                Err(err) => {
                    *state = TaskState::DoneFailed;
                    warn!(task, error = %err, "task failed; halting new dispatches");
                    if self.first_error.is_none() {
                        self.first_error = Some(err);
                    }
                    self.halted = true;
                    step.newly_skipped = self.skip_dependents(task);
                }
            },
            Some(state) => {
                warn!(task, ?state, "completion for task not marked Running; ignoring");
                return step;
            }
            None => {
                warn!(task, "completion for task outside the plan; ignoring");
                return step;
            }
        }

        if !self.halted {
            step.newly_ready = self.collect_ready();
        }

        step.run_finished = self.maybe_finish();
        step
    }

    /// Take the originating error, if any. Call after the run finished.
    pub fn take_error(&mut self) -> Option<BuildpipeError> {
        self.first_error.take()
    }

    /// Whether every task reached a terminal state.
    pub fn all_terminal(&self) -> bool {
        self.states.values().all(|s| s.is_terminal())
    }

    /// Pending tasks whose dependencies are all DoneSuccess, marked Running.
    fn collect_ready(&mut self) -> Vec<TaskName> {
        let candidates: Vec<TaskName> = self
            .plan
            .order
            .iter()
            .filter(|name| {
                matches!(self.states.get(name.as_str()), Some(TaskState::Pending))
                    && self.deps_satisfied(name)
            })
            .cloned()
            .collect();

        for name in &candidates {
            debug!(task = %name, "dependencies satisfied; marking Running");
            self.states.insert(name.clone(), TaskState::Running);
        }

        candidates
    }

    fn deps_satisfied(&self, name: &str) -> bool {
        self.plan
            .deps_of(name)
            .iter()
            .all(|dep| matches!(self.states.get(dep.as_str()), Some(TaskState::DoneSuccess)))
    }

    /// Mark all pending/running-free transitive dependents of a failed task
    /// as Skipped. Only Pending tasks can be withheld; Running ones are
    /// awaited.
    fn skip_dependents(&mut self, failed: &str) -> Vec<TaskName> {
        let mut stack: Vec<TaskName> = self.plan.dependents_of(failed).to_vec();
        let mut skipped = Vec::new();

        while let Some(name) = stack.pop() {
            if let Some(state @ TaskState::Pending) = self.states.get_mut(&name) {
                *state = TaskState::Skipped;
                debug!(task = %name, "skipping dependent of failed task");
                skipped.push(name.clone());
                stack.extend(self.plan.dependents_of(&name).iter().cloned());
            }
        }

        skipped
    }

    /// If nothing is Running and either the run halted or everything is
    /// terminal, finish the run. On a halted finish, remaining Pending tasks
    /// (cancelled, never started) become Skipped.
    fn maybe_finish(&mut self) -> bool {
        let running = self
            .states
            .values()
            .filter(|s| matches!(s, TaskState::Running))
            .count();

        if running > 0 {
            return false;
        }

        if self.halted {
            for state in self.states.values_mut() {
                if matches!(state, TaskState::Pending) {
                    *state = TaskState::Skipped;
                }
            }
            return true;
        }

        self.all_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::plan::ExecutionPlan;
    use crate::registry::TaskRegistry;

    fn plan(edges: &[(&str, &[&str])], requested: &str) -> ExecutionPlan {
        let mut reg = TaskRegistry::new();
        for (name, deps) in edges {
            reg.register_group(*name, deps).unwrap();
        }
        ExecutionPlan::resolve(&reg, requested).unwrap()
    }

    fn fail() -> Result<(), BuildpipeError> {
        Err(BuildpipeError::TaskFailed {
            task: "x".to_string(),
            source: anyhow::anyhow!("boom"),
        })
    }

    #[test]
    fn body_waits_for_both_dependencies() {
        // c depends on [a, b]
        let mut coord = RunCoordinator::new(plan(
            &[("a", &[]), ("b", &[]), ("c", &["a", "b"])],
            "c",
        ));

        let ready = coord.initial_ready();
        assert_eq!(sorted(ready), vec!["a", "b"]);

        let step = coord.on_finished("a", Ok(()));
        assert!(step.newly_ready.is_empty(), "c must wait for b as well");

        let step = coord.on_finished("b", Ok(()));
        assert_eq!(step.newly_ready, vec!["c".to_string()]);

        let step = coord.on_finished("c", Ok(()));
        assert!(step.run_finished);
        assert!(coord.take_error().is_none());
    }

    #[test]
    fn failure_skips_transitive_dependents() {
        let mut coord = RunCoordinator::new(plan(
            &[("a", &[]), ("b", &["a"]), ("c", &["b"])],
            "c",
        ));

        assert_eq!(coord.initial_ready(), vec!["a".to_string()]);
        let step = coord.on_finished("a", fail());

        assert_eq!(sorted(step.newly_skipped), vec!["b", "c"]);
        assert!(step.run_finished);
        assert_eq!(coord.state_of("b"), Some(TaskState::Skipped));
        assert_eq!(coord.state_of("c"), Some(TaskState::Skipped));
        assert!(coord.take_error().is_some());
    }

    #[test]
    fn failure_awaits_running_sibling_and_withholds_pending_ones() {
        // diamond: d depends on b and c; b and c depend on a
        let mut coord = RunCoordinator::new(plan(
            &[("a", &[]), ("b", &["a"]), ("c", &["a"]), ("d", &["b", "c"])],
            "d",
        ));

        coord.initial_ready();
        let step = coord.on_finished("a", Ok(()));
        assert_eq!(sorted(step.newly_ready), vec!["b", "c"]);

        // b fails while c is still running: run must not finish yet.
        let step = coord.on_finished("b", fail());
        assert!(!step.run_finished);
        assert_eq!(step.newly_skipped, vec!["d".to_string()]);

        // c completes; nothing new is released, run finishes.
        let step = coord.on_finished("c", Ok(()));
        assert!(step.newly_ready.is_empty());
        assert!(step.run_finished);
        assert_eq!(coord.state_of("c"), Some(TaskState::DoneSuccess));
        assert!(coord.take_error().is_some());
    }

    #[test]
    fn independent_tasks_are_released_together() {
        let mut coord = RunCoordinator::new(plan(
            &[("a", &[]), ("b", &[]), ("all", &["a", "b"])],
            "all",
        ));

        // Both roots released in the same batch: no ordering between them.
        let ready = coord.initial_ready();
        assert_eq!(sorted(ready), vec!["a", "b"]);
    }

    fn sorted(mut v: Vec<TaskName>) -> Vec<TaskName> {
        v.sort();
        v
    }
}
