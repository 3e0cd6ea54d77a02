// tests/devloop_resilience.rs

//! The dev loop survives failing rebuilds: a broken edit is logged and the
//! loop keeps reacting to later changes.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use buildpipe::context::{RunFlags, TaskContext};
use buildpipe::devloop::{DevLoop, ReloadHub};
use buildpipe_test_utils::builders::{ConfigBuilder, RecordingRegistry};
use common::{init_tracing, with_timeout};

async fn wait_for_runs(started: &Arc<Mutex<Vec<String>>>, count: usize) {
    while started.lock().unwrap().len() < count {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn failing_rebuild_keeps_the_loop_alive() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let (registry, started) = RecordingRegistry::new()
        .failing_task("rebuild", &[])
        .build();
    let config = Arc::new(ConfigBuilder::new().build());
    let cx = Arc::new(TaskContext::new(config, RunFlags::default(), dir.path()));

    let devloop = DevLoop::new(
        registry,
        cx,
        "rebuild",
        &["**/*.css".to_string()],
        ReloadHub::disabled(),
    )
    .unwrap();
    tokio::spawn(devloop.run());

    // Let the watcher arm before the first write.
    tokio::time::sleep(Duration::from_millis(200)).await;

    std::fs::write(dir.path().join("style.css"), "body{}").unwrap();
    with_timeout(wait_for_runs(&started, 1)).await;

    // The first run failed; a later save must still trigger a rebuild.
    std::fs::write(dir.path().join("style.css"), "body{color:red}").unwrap();
    with_timeout(wait_for_runs(&started, 2)).await;
}
