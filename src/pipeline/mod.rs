// src/pipeline/mod.rs

//! File pipelines: ordered chains of stream-transform stages.
//!
//! A stage consumes a file set and produces a file set; side effects
//! (cleaning stale output, writing to a destination directory) are explicit,
//! named stages. A stage failure aborts the remaining stages and fails the
//! owning task with both the task and the stage named in the error.

pub mod markup;
pub mod rev;
pub mod source;
pub mod stages;

pub use markup::{InjectStage, TemplateCacheStage};
pub use rev::{RevManifest, RevStage};
pub use source::collect_sources;
pub use stages::{CleanStage, CommandStage, ConcatStage, DestStage, FilterStage};

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::errors::{BuildpipeError, Result};
use crate::fs::FileSystem;

/// One file flowing through a pipeline: a path relative to the project root
/// plus its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    /// Contents as UTF-8 text; errors on binary data.
    pub fn text(&self) -> anyhow::Result<&str> {
        std::str::from_utf8(&self.contents)
            .map_err(|_| anyhow::anyhow!("file {:?} is not valid UTF-8", self.path))
    }

    /// File name component, lossy.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// An ordered set of files flowing between stages.
pub type FileSet = Vec<FileRecord>;

/// Context available to every stage: the filesystem and the project root.
#[derive(Debug, Clone)]
pub struct StageCx {
    pub fs: Arc<dyn FileSystem>,
    pub root: PathBuf,
}

impl StageCx {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }
}

/// One transformation step in a task's file-processing chain.
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    fn apply<'a>(
        &'a self,
        files: FileSet,
        cx: &'a StageCx,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<FileSet>> + Send + 'a>>;
}

/// A linear chain of stages owned by one task.
pub struct Pipeline {
    task: String,
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            stages: Vec::new(),
        }
    }

    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Run all stages in order over the initial file set.
    ///
    /// The first stage error aborts the rest and is wrapped with the owning
    /// task and stage names, keeping the source error intact.
    pub async fn run(&self, initial: FileSet, cx: &StageCx) -> Result<FileSet> {
        let mut files = initial;

        for stage in &self.stages {
            debug!(task = %self.task, stage = stage.name(), files = files.len(), "running stage");
            files = stage
                .apply(files, cx)
                .await
                .map_err(|source| BuildpipeError::StageError {
                    task: self.task.clone(),
                    stage: stage.name().to_string(),
                    source,
                })?;
        }

        Ok(files)
    }
}
