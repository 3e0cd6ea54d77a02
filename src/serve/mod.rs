// src/serve/mod.rs

//! Serving: spawn the app server (or a static fallback), watch sources and
//! drive the dev loop.
//!
//! Development mode serves unbuilt sources and recompiles styles on change;
//! build mode serves the optimized output and re-runs the optimize task when
//! code or markup changes. The app server process is restarted when its own
//! sources change.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::context::TaskContext;
use crate::devloop::{DevLoop, ReloadHub, spawn_watcher};
use crate::errors::{BuildpipeError, Result};
use crate::registry::TaskRegistry;
use crate::testrun::drain_stderr;

/// Development vs production serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Dev,
    Build,
}

impl RunMode {
    /// Value passed to the app server as `NODE_ENV`.
    pub fn env_name(self) -> &'static str {
        match self {
            RunMode::Dev => "dev",
            RunMode::Build => "build",
        }
    }
}

/// Serve the app and watch for changes until the process is stopped.
pub async fn serve(cx: Arc<TaskContext>, mode: RunMode) -> Result<()> {
    // The dev loop needs its own registry handle to re-run tasks.
    let mut registry = TaskRegistry::new();
    crate::tasks::register_all(&mut registry)?;
    let registry = Arc::new(registry);

    let reload = if cx.flags.no_reload {
        ReloadHub::disabled()
    } else {
        ReloadHub::start(cx.config.reload.port)?
    };

    let (patterns, rebuild_task) = match mode {
        RunMode::Dev => (cx.config.assets.styles.clone(), "styles"),
        RunMode::Build => {
            let mut patterns = cx.config.assets.styles.clone();
            patterns.extend(cx.config.assets.scripts.iter().cloned());
            patterns.extend(cx.config.assets.html.iter().cloned());
            (patterns, "optimize")
        }
    };

    let devloop = DevLoop::new(
        Arc::clone(&registry),
        Arc::clone(&cx),
        rebuild_task,
        &patterns,
        reload,
    )?;

    tokio::select! {
        res = run_app_server(&cx, mode) => res,
        res = devloop.run() => res,
    }
}

/// Run the configured app server command, restarting it when server sources
/// change or the process dies. Falls back to a static file server when no
/// command is configured.
async fn run_app_server(cx: &TaskContext, mode: RunMode) -> Result<()> {
    let port = cx.server_port();

    let Some(command) = cx.config.server.command.clone() else {
        return serve_static(cx, mode, port).await;
    };

    let (changes_tx, mut changes_rx) = mpsc::channel(16);
    let _watcher = if cx.config.server.watch.is_empty() {
        None
    } else {
        Some(spawn_watcher(
            cx.root.clone(),
            &cx.config.server.watch,
            changes_tx,
        )?)
    };

    loop {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&command);
            c
        };
        cmd.env("PORT", port.to_string())
            .env("NODE_ENV", mode.env_name())
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(BuildpipeError::IoError)?;
        drain_stderr(&mut child, "app-server");
        info!(port, mode = mode.env_name(), "app server started");

        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(BuildpipeError::IoError)?;
                warn!(code = ?status.code(), "app server exited, restarting");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Some(changed) = changes_rx.recv() => {
                info!(changed = ?changed, "server sources changed, restarting app server");
                let _ = child.kill().await;
                while changes_rx.try_recv().is_ok() {}
            }
        }
    }
}

/// Static file server used when no app server command is configured.
///
/// Development serves the project root (sources and temp output keep their
/// injected paths); build mode serves the build directory.
async fn serve_static(cx: &TaskContext, mode: RunMode, port: u16) -> Result<()> {
    let dir = match mode {
        RunMode::Dev => cx.root.clone(),
        RunMode::Build => cx.root.join(&cx.config.paths.build),
    };

    let app = axum::Router::new()
        .fallback_service(tower_http::services::ServeDir::new(&dir));

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .map_err(BuildpipeError::IoError)?;
    info!(port, dir = ?dir, "static file server listening");

    axum::serve(listener, app)
        .await
        .map_err(BuildpipeError::IoError)?;
    Ok(())
}
