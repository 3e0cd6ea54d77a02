// src/testrun/mod.rs

//! Test runner orchestration.
//!
//! A test run optionally spawns the app server on a dedicated port, runs the
//! configured test runner with any excluded spec globs, then kills the
//! server no matter how the runner finished. Without `--start-server` the
//! server-integration specs are excluded instead of starting a server.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::context::TaskContext;
use crate::errors::{BuildpipeError, Result};

/// Run the configured test runner once (`single_run`) or in watch mode.
pub async fn run_tests(cx: &TaskContext, single_run: bool) -> Result<()> {
    let Some(runner) = &cx.config.test.runner else {
        info!("no test runner configured; skipping tests");
        return Ok(());
    };

    let mut excludes: Vec<String> = Vec::new();
    let mut server: Option<Child> = None;

    if cx.flags.start_server {
        match spawn_aux_server(cx) {
            Ok(child) => server = Some(child),
            Err(err) => {
                // A missing server shouldn't sink the whole run; the specs
                // that need it are excluded instead.
                warn!(error = %err, "could not start app server for tests");
                excludes.extend(cx.config.assets.server_specs.iter().cloned());
            }
        }
    } else {
        excludes.extend(cx.config.assets.server_specs.iter().cloned());
    }

    let result = run_runner(cx, runner, single_run, &excludes).await;

    if let Some(mut child) = server {
        // Unconditional: the server dies whether the runner passed, failed
        // or errored out.
        let _ = child.kill().await;
        debug!("app server stopped after test run");
    }

    result
}

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    }
}

/// Spawn the app server with its environment pointed at the test port.
fn spawn_aux_server(cx: &TaskContext) -> Result<Child> {
    let command = cx.config.server.command.as_deref().ok_or_else(|| {
        BuildpipeError::ConfigError(
            "--start-server requires a [server] command in the config".to_string(),
        )
    })?;

    let mut cmd = shell_command(command);
    cmd.env("PORT", cx.config.test.server_port.to_string())
        .env("NODE_ENV", "dev")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(BuildpipeError::IoError)?;
    drain_stderr(&mut child, "app-server");
    info!(port = cx.config.test.server_port, "app server started for tests");
    Ok(child)
}

async fn run_runner(
    cx: &TaskContext,
    runner: &str,
    single_run: bool,
    excludes: &[String],
) -> Result<()> {
    let mut command = runner.to_string();
    if single_run {
        command.push(' ');
        command.push_str(&cx.config.test.single_run_flag);
    }
    for exclude in excludes {
        command.push(' ');
        command.push_str(&cx.config.test.exclude_flag);
        command.push(' ');
        // Quoted so the shell neither splits the glob on spaces nor
        // expands it against the working directory.
        command.push_str(&quote_glob(exclude));
    }

    info!(command = %command, "starting test runner");
    let mut cmd = shell_command(&command);
    cmd.stdin(Stdio::null()).kill_on_drop(true);

    let status = cmd
        .status()
        .await
        .map_err(BuildpipeError::IoError)?;

    if status.success() {
        info!("test runner finished cleanly");
        Ok(())
    } else {
        Err(BuildpipeError::TestsFailed(status.code().unwrap_or(-1)))
    }
}

fn quote_glob(value: &str) -> String {
    if cfg!(windows) {
        format!("\"{value}\"")
    } else {
        format!("'{}'", value.replace('\'', "'\\''"))
    }
}

/// Forward a child's stderr to our logs at debug level.
pub(crate) fn drain_stderr(child: &mut Child, label: &'static str) {
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(process = label, "{line}");
            }
        });
    }
}
