// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `buildpipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "buildpipe",
    version,
    about = "Run named build tasks, watch sources, serve and test a web app.",
    long_about = None
)]
pub struct CliArgs {
    /// Name of the task to run (e.g. "build", "serve-dev", "test").
    ///
    /// If omitted, the registered tasks are listed instead.
    pub task: Option<String>,

    /// Path to the config file (TOML).
    ///
    /// Default: `Buildpipe.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Buildpipe.toml")]
    pub config: String,

    /// List all registered tasks with their dependencies and exit.
    #[arg(long)]
    pub list: bool,

    /// Resolve the execution plan and print it, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Start the auxiliary app server before running tests.
    ///
    /// When not set, server-integration spec files are excluded from the
    /// test run.
    #[arg(long)]
    pub start_server: bool,

    /// Suppress the live-reload channel when serving.
    #[arg(long)]
    pub no_reload: bool,

    /// Serve the production build output instead of development sources.
    #[arg(long)]
    pub production: bool,

    /// Port for the spawned app server (overrides `PORT` env and config).
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Version component to increment for the `bump` task.
    #[arg(long, value_enum, value_name = "TYPE")]
    pub bump_type: Option<BumpType>,

    /// Explicit version to set for the `bump` task (overrides --bump-type).
    #[arg(long, value_name = "VERSION")]
    pub set_version: Option<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Which version component `bump` should increment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum BumpType {
    Major,
    Minor,
    Patch,
    Pre,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
