// tests/testrun_lifecycle.rs

//! Test-run orchestration with real child processes.

#![cfg(unix)]

mod common;

use std::sync::Arc;

use buildpipe::BuildpipeError;
use buildpipe::context::{RunFlags, TaskContext};
use buildpipe::testrun::run_tests;
use buildpipe_test_utils::builders::ConfigBuilder;
use common::{init_tracing, with_timeout};

fn context(config: buildpipe::config::Config, flags: RunFlags) -> Arc<TaskContext> {
    Arc::new(TaskContext::new(Arc::new(config), flags, "."))
}

#[tokio::test]
async fn missing_runner_is_a_noop() {
    init_tracing();
    let cx = context(ConfigBuilder::new().build(), RunFlags::default());
    with_timeout(run_tests(&cx, true)).await.unwrap();
}

#[tokio::test]
async fn runner_exit_code_is_reported() {
    init_tracing();
    let cx = context(
        ConfigBuilder::new().test_runner("exit 3").build(),
        RunFlags::default(),
    );

    let err = with_timeout(run_tests(&cx, true)).await.unwrap_err();
    assert!(matches!(err, BuildpipeError::TestsFailed(3)));
}

#[tokio::test]
async fn server_specs_are_excluded_without_a_server() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let args_file = dir.path().join("runner-args");

    // The runner records the arguments appended to it.
    let runner = format!(
        "record() {{ echo \"$@\" > {}; }}; record",
        args_file.display()
    );
    let cx = context(
        ConfigBuilder::new()
            .test_runner(&runner)
            .server_specs("spec/server/**/*.js")
            .build(),
        RunFlags::default(),
    );

    with_timeout(run_tests(&cx, true)).await.unwrap();

    let recorded = std::fs::read_to_string(&args_file).unwrap();
    assert!(recorded.contains("--single-run"));
    assert!(recorded.contains("--exclude spec/server/**/*.js"));
}

#[tokio::test]
async fn exclude_globs_with_spaces_stay_single_arguments() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let args_file = dir.path().join("runner-args");

    // One argument per line, so any shell word-splitting shows up.
    let runner = format!(
        "record() {{ printf '%s\\n' \"$@\" > {}; }}; record",
        args_file.display()
    );
    let cx = context(
        ConfigBuilder::new()
            .test_runner(&runner)
            .server_specs("spec/server tests/**/*.js")
            .build(),
        RunFlags::default(),
    );

    with_timeout(run_tests(&cx, true)).await.unwrap();

    let recorded = std::fs::read_to_string(&args_file).unwrap();
    let args: Vec<&str> = recorded.lines().collect();
    assert!(
        args.contains(&"spec/server tests/**/*.js"),
        "glob must reach the runner as one argument, got {args:?}"
    );
}

#[tokio::test]
async fn watch_mode_omits_the_single_run_flag() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let args_file = dir.path().join("runner-args");

    let runner = format!(
        "record() {{ echo \"x $@\" > {}; }}; record",
        args_file.display()
    );
    let cx = context(
        ConfigBuilder::new().test_runner(&runner).build(),
        RunFlags::default(),
    );

    with_timeout(run_tests(&cx, false)).await.unwrap();

    let recorded = std::fs::read_to_string(&args_file).unwrap();
    assert!(!recorded.contains("--single-run"));
}

#[tokio::test]
async fn aux_server_is_started_and_stopped_even_when_tests_fail() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("server-started");

    // A long-lived fake server; the 5s test timeout proves it was killed
    // rather than awaited.
    let server = format!("touch {} && sleep 30", marker.display());
    let cx = context(
        ConfigBuilder::new()
            .server_command(&server)
            .test_runner("sleep 0.2; exit 7")
            .build(),
        RunFlags {
            start_server: true,
            ..RunFlags::default()
        },
    );

    let err = with_timeout(run_tests(&cx, true)).await.unwrap_err();
    assert!(matches!(err, BuildpipeError::TestsFailed(7)));
    assert!(marker.exists(), "server must have been spawned");
}

#[tokio::test]
async fn unstartable_server_falls_back_to_excluding_server_specs() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let args_file = dir.path().join("runner-args");

    let runner = format!(
        "record() {{ echo \"$@\" > {}; }}; record",
        args_file.display()
    );
    // No [server] command configured, but --start-server was requested.
    let cx = context(
        ConfigBuilder::new()
            .test_runner(&runner)
            .server_specs("spec/server/**/*.js")
            .build(),
        RunFlags {
            start_server: true,
            ..RunFlags::default()
        },
    );

    with_timeout(run_tests(&cx, true)).await.unwrap();

    let recorded = std::fs::read_to_string(&args_file).unwrap();
    assert!(recorded.contains("--exclude spec/server/**/*.js"));
}
