// src/devloop/mod.rs

//! The development loop: watch sources, re-run a task on change, then tell
//! connected browsers to reload.
//!
//! Task failures are logged and swallowed; the loop never dies because a
//! rebuild failed. State transitions are pure so they can be tested without
//! a real watcher.

pub mod reload;
pub mod watcher;

pub use reload::ReloadHub;
pub use watcher::{WatchHandle, spawn_watcher};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::context::TaskContext;
use crate::errors::Result;
use crate::graph::execute_task;
use crate::registry::{TaskName, TaskRegistry};

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Watching,
    RunningTask,
    Notifying,
}

impl LoopState {
    /// Only a watching loop reacts to change events; events arriving in any
    /// other state are coalesced into the next run.
    pub fn accepts_changes(self) -> bool {
        matches!(self, LoopState::Watching)
    }

    pub fn on_change(self) -> LoopState {
        match self {
            LoopState::Watching => LoopState::RunningTask,
            other => other,
        }
    }

    pub fn on_task_done(self, success: bool) -> LoopState {
        match self {
            LoopState::RunningTask if success => LoopState::Notifying,
            LoopState::RunningTask => LoopState::Watching,
            other => other,
        }
    }

    pub fn on_notified(self) -> LoopState {
        match self {
            LoopState::Notifying => LoopState::Watching,
            other => other,
        }
    }
}

/// Drives watch → rebuild → reload until the process exits.
pub struct DevLoop {
    registry: Arc<TaskRegistry>,
    cx: Arc<TaskContext>,
    task: TaskName,
    reload: ReloadHub,
    state: LoopState,
    changes_rx: mpsc::Receiver<PathBuf>,
    _watcher: WatchHandle,
}

impl DevLoop {
    pub fn new(
        registry: Arc<TaskRegistry>,
        cx: Arc<TaskContext>,
        task: impl Into<TaskName>,
        patterns: &[String],
        reload: ReloadHub,
    ) -> Result<Self> {
        let (changes_tx, changes_rx) = mpsc::channel(64);
        let watcher = spawn_watcher(cx.root.clone(), patterns, changes_tx)?;
        Ok(Self {
            registry,
            cx,
            task: task.into(),
            reload,
            state: LoopState::Idle,
            changes_rx,
            _watcher: watcher,
        })
    }

    /// Run the loop forever (until the change channel closes).
    pub async fn run(mut self) -> Result<()> {
        self.state = LoopState::Watching;
        info!(task = %self.task, "dev loop watching for changes");

        while let Some(changed) = self.changes_rx.recv().await {
            // Coalesce the burst of events a single save produces.
            while self.changes_rx.try_recv().is_ok() {}

            debug_assert!(self.state.accepts_changes());
            self.state = self.state.on_change();
            info!(changed = ?changed, task = %self.task, "change detected, re-running task");

            let success = match execute_task(&self.registry, &self.cx, &self.task).await {
                Ok(()) => true,
                Err(err) => {
                    // Keep watching; the next save gets another chance.
                    warn!(error = %err, task = %self.task, "task failed, still watching");
                    false
                }
            };
            self.state = self.state.on_task_done(success);

            if self.state == LoopState::Notifying {
                tokio::time::sleep(Duration::from_millis(self.cx.config.reload.delay_ms)).await;
                self.reload.broadcast();
                self.state = self.state.on_notified();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_run_passes_through_notifying() {
        let s = LoopState::Watching;
        let s = s.on_change();
        assert_eq!(s, LoopState::RunningTask);
        let s = s.on_task_done(true);
        assert_eq!(s, LoopState::Notifying);
        assert!(!s.accepts_changes());
        assert_eq!(s.on_notified(), LoopState::Watching);
    }

    #[test]
    fn failed_run_skips_notification() {
        let s = LoopState::Watching.on_change().on_task_done(false);
        assert_eq!(s, LoopState::Watching);
        assert!(s.accepts_changes());
    }

    #[test]
    fn idle_loop_ignores_events() {
        assert_eq!(LoopState::Idle.on_change(), LoopState::Idle);
        assert_eq!(LoopState::Idle.on_task_done(true), LoopState::Idle);
        assert!(!LoopState::Idle.accepts_changes());
    }
}
