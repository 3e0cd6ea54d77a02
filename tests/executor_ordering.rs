// tests/executor_ordering.rs

//! Execution semantics over the task graph: dependency ordering, concurrent
//! release of independent tasks, and the failure policy.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use buildpipe::BuildpipeError;
use buildpipe::graph::{ExecutionPlan, GraphExecutor, execute_task};
use buildpipe_test_utils::builders::{RecordingRegistry, default_context};
use buildpipe_test_utils::fake_runner::FakeRunner;
use common::{init_tracing, with_timeout};
use tokio::sync::mpsc;

#[tokio::test]
async fn dependencies_run_before_dependents() {
    init_tracing();
    let (registry, started) = RecordingRegistry::new()
        .task("clean", &[])
        .task("styles", &["clean"])
        .task("inject", &["styles"])
        .build();
    let cx = default_context();

    with_timeout(execute_task(&registry, &cx, "inject"))
        .await
        .unwrap();

    let order = started.lock().unwrap().clone();
    assert_eq!(order, vec!["clean", "styles", "inject"]);
}

#[tokio::test]
async fn independent_tasks_both_complete() {
    init_tracing();
    let (registry, started) = RecordingRegistry::new()
        .task_with_delay("images", &[], Duration::from_millis(20))
        .task("fonts", &[])
        .group("assets", &["images", "fonts"])
        .build();
    let cx = default_context();

    with_timeout(execute_task(&registry, &cx, "assets"))
        .await
        .unwrap();

    let mut order = started.lock().unwrap().clone();
    order.sort();
    assert_eq!(order, vec!["fonts", "images"]);
}

#[tokio::test]
async fn failed_dependency_skips_dependents() {
    init_tracing();
    let (registry, started) = RecordingRegistry::new()
        .failing_task("vet", &[])
        .task("test", &["vet"])
        .task("optimize", &["test"])
        .build();
    let cx = default_context();

    let err = with_timeout(execute_task(&registry, &cx, "optimize"))
        .await
        .unwrap_err();

    assert!(matches!(err, BuildpipeError::TaskFailed { ref task, .. } if task == "vet"));
    let order = started.lock().unwrap().clone();
    assert_eq!(order, vec!["vet"], "dependents of a failed task must not start");
}

#[tokio::test]
async fn failure_still_awaits_running_sibling() {
    init_tracing();
    // Diamond: the slow sibling is already running when the failure lands.
    let (registry, started) = RecordingRegistry::new()
        .task("base", &[])
        .failing_task("bad", &["base"])
        .task_with_delay("slow", &["base"], Duration::from_millis(50))
        .group("top", &["bad", "slow"])
        .build();
    let cx = default_context();

    let err = with_timeout(execute_task(&registry, &cx, "top"))
        .await
        .unwrap_err();

    assert!(matches!(err, BuildpipeError::TaskFailed { ref task, .. } if task == "bad"));
    let mut order = started.lock().unwrap().clone();
    order.sort();
    // The sibling ran to completion; only "top" was withheld.
    assert_eq!(order, vec!["bad", "base", "slow"]);
}

#[tokio::test]
async fn fake_runner_sees_deps_dispatched_first() {
    init_tracing();
    let (registry, _) = RecordingRegistry::new()
        .task("a", &[])
        .task("b", &["a"])
        .task("c", &["a", "b"])
        .build();
    let plan = ExecutionPlan::resolve(&registry, "c").unwrap();

    let dispatched = Arc::new(Mutex::new(Vec::new()));
    let (events_tx, events_rx) = mpsc::channel(64);
    let runner = FakeRunner::new(events_tx, Arc::clone(&dispatched));

    with_timeout(GraphExecutor::new(plan, events_rx, runner).run())
        .await
        .unwrap();

    let order = dispatched.lock().unwrap().clone();
    let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
    assert!(pos("a") < pos("b"));
    assert!(pos("b") < pos("c"));
}

#[tokio::test]
async fn fake_runner_failure_is_surfaced() {
    init_tracing();
    let (registry, _) = RecordingRegistry::new()
        .task("a", &[])
        .task("b", &["a"])
        .build();
    let plan = ExecutionPlan::resolve(&registry, "b").unwrap();

    let dispatched = Arc::new(Mutex::new(Vec::new()));
    let (events_tx, events_rx) = mpsc::channel(64);
    let runner = FakeRunner::new(events_tx, Arc::clone(&dispatched)).failing("a");

    let err = with_timeout(GraphExecutor::new(plan, events_rx, runner).run())
        .await
        .unwrap_err();

    assert!(matches!(err, BuildpipeError::TaskFailed { ref task, .. } if task == "a"));
    let order = dispatched.lock().unwrap().clone();
    assert_eq!(order, vec!["a"]);
}
