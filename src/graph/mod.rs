// src/graph/mod.rs

//! Task graph resolution and execution.
//!
//! - [`plan`] resolves a requested task name into a validated execution plan
//!   (transitive closure, topological order, cycle and unresolved-reference
//!   checks) before anything runs.
//! - [`coordinator`] is the pure per-run state machine deciding which tasks
//!   are ready and how failure propagates to dependents.
//! - [`executor`] is the async shell that dispatches ready tasks to a
//!   [`executor::RunnerBackend`] and feeds completion events back into the
//!   coordinator.

pub mod coordinator;
pub mod executor;
pub mod plan;

pub use coordinator::{RunCoordinator, StepResult, TaskState};
pub use executor::{ExecEvent, GraphExecutor, RegistryRunner, RunnerBackend, execute_task};
pub use plan::ExecutionPlan;
