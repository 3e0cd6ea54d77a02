// src/lib.rs

//! buildpipe: a task-graph build runner for web app assets.
//!
//! Tasks are registered in code, resolved into an execution plan over a
//! dependency graph, and run concurrently where the graph allows. File work
//! happens in pipelines of explicit stages; serving, watching and test
//! orchestration sit on top of the same task graph.

pub mod cli;
pub mod config;
pub mod context;
pub mod devloop;
pub mod errors;
pub mod fs;
pub mod graph;
pub mod logging;
pub mod notify_desktop;
pub mod pipeline;
pub mod registry;
pub mod serve;
pub mod tasks;
pub mod testrun;

pub use errors::{BuildpipeError, Result};

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::cli::CliArgs;
use crate::config::{Config, RawConfig};
use crate::context::{RunFlags, TaskContext};
use crate::graph::{ExecutionPlan, execute_task};
use crate::registry::TaskRegistry;

/// Load configuration for the given CLI arguments.
///
/// A missing file at the default location falls back to built-in defaults;
/// an explicitly given path must exist.
pub fn load_config(args: &CliArgs) -> Result<Config> {
    let path = Path::new(&args.config);
    if !path.exists() {
        let default = config::default_config_path();
        if path == default {
            debug!(path = ?path, "no config file, using defaults");
            return Ok(Config::try_from(RawConfig::default())?);
        }
        return Err(BuildpipeError::ConfigError(format!(
            "config file {:?} does not exist",
            path
        )));
    }
    config::load_and_validate(path)
}

/// Print every registered task with its dependencies.
pub fn print_task_list(registry: &TaskRegistry) {
    for name in registry.names() {
        let deps = registry.deps_of(name);
        if deps.is_empty() {
            println!("{name}");
        } else {
            println!("{name}  [{}]", deps.join(", "));
        }
    }
}

/// Top-level entry: build the registry, then list, plan or execute.
pub async fn run(args: CliArgs) -> Result<()> {
    let config = Arc::new(load_config(&args)?);
    let flags = RunFlags::from_cli(&args);

    let mut registry = TaskRegistry::new();
    tasks::register_all(&mut registry)?;
    let registry = Arc::new(registry);

    let Some(task) = args.task.as_deref() else {
        print_task_list(&registry);
        return Ok(());
    };

    // "serve" picks a variant based on --production.
    let task = match task {
        "serve" if flags.production => "serve-build",
        "serve" => "serve-dev",
        other => other,
    };

    if args.list {
        print_task_list(&registry);
        return Ok(());
    }

    if args.dry_run {
        let plan = ExecutionPlan::resolve(&registry, task)?;
        for name in &plan.order {
            println!("{name}");
        }
        return Ok(());
    }

    let cx = Arc::new(TaskContext::new(config, flags, "."));
    execute_task(&registry, &cx, task).await
}
