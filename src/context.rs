// src/context.rs

//! Shared, immutable per-invocation context handed to task bodies.

use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::{BumpType, CliArgs};
use crate::config::Config;
use crate::fs::{FileSystem, RealFileSystem};

/// Flags that modify task behaviour for one invocation.
///
/// Derived from the CLI once at startup; read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct RunFlags {
    /// Start the auxiliary app server for test runs.
    pub start_server: bool,
    /// Suppress the live-reload channel when serving.
    pub no_reload: bool,
    /// Serve/build for production rather than development.
    pub production: bool,
    /// Port override for the spawned app server.
    pub port: Option<u16>,
    /// Version component for the bump task.
    pub bump_type: Option<BumpType>,
    /// Explicit version for the bump task.
    pub set_version: Option<String>,
}

impl RunFlags {
    pub fn from_cli(args: &CliArgs) -> Self {
        Self {
            start_server: args.start_server,
            no_reload: args.no_reload,
            production: args.production,
            port: args.port,
            bump_type: args.bump_type,
            set_version: args.set_version.clone(),
        }
    }
}

/// Everything a task body needs: configuration, flags and the filesystem.
///
/// Constructed once per invocation and shared via `Arc`; there is no ambient
/// global state to read configuration from.
#[derive(Debug)]
pub struct TaskContext {
    pub config: Arc<Config>,
    pub flags: RunFlags,
    pub fs: Arc<dyn FileSystem>,
    /// Project root all relative globs and paths are resolved against.
    pub root: PathBuf,
}

impl TaskContext {
    pub fn new(config: Arc<Config>, flags: RunFlags, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            flags,
            fs: Arc::new(RealFileSystem),
            root: root.into(),
        }
    }

    /// Same context but backed by a different filesystem (tests).
    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    /// Effective app-server port: `--port` flag, then `PORT` env, then config.
    pub fn server_port(&self) -> u16 {
        if let Some(port) = self.flags.port {
            return port;
        }
        std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(self.config.server.port)
    }
}
