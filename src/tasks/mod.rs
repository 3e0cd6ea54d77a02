// src/tasks/mod.rs

//! Built-in task definitions.
//!
//! This is where the task graph is wired up: asset pipelines, the
//! production assembly tasks, version bumping and the serve entry points.
//! Bodies close over nothing; everything they need comes from the shared
//! [`TaskContext`].

pub mod assets;
pub mod bump;
pub mod optimize;

use std::sync::Arc;

use crate::context::TaskContext;
use crate::errors::Result;
use crate::pipeline::StageCx;
use crate::registry::TaskRegistry;

/// Register every built-in task.
pub fn register_all(registry: &mut TaskRegistry) -> Result<()> {
    assets::register(registry)?;
    optimize::register(registry)?;
    bump::register(registry)?;
    Ok(())
}

/// Stage context for a task body.
pub(crate) fn stage_cx(cx: &TaskContext) -> StageCx {
    StageCx::new(Arc::clone(&cx.fs), cx.root.clone())
}
