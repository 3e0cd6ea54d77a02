// src/pipeline/stages.rs

//! General-purpose pipeline stages.
//!
//! Side effects are explicit stages here: [`CleanStage`] deletes stale
//! output, [`DestStage`] writes the flowing file set to a directory. The
//! delegation boundary to external tools is [`CommandStage`].

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use globset::GlobSet;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::pipeline::source::{build_globset, collect_matching_paths};
use crate::pipeline::{FileRecord, FileSet, Stage, StageCx};

/// Writes every record into a destination directory and passes the set
/// through with updated paths.
///
/// `flat` drops the original directory structure (all files land directly in
/// `dir`); `rebased` keeps the structure below `base`.
pub struct DestStage {
    dir: String,
    base: Option<String>,
}

impl DestStage {
    pub fn flat(dir: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base: None,
        }
    }

    pub fn rebased(dir: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base: Some(base.into()),
        }
    }

    /// Write each record back to the path it already carries.
    pub fn in_place() -> Self {
        Self {
            dir: ".".to_string(),
            base: Some(String::new()),
        }
    }

    fn target_rel_path(&self, record: &FileRecord) -> PathBuf {
        let dir = PathBuf::from(&self.dir);
        match &self.base {
            Some(base) => match record.path.strip_prefix(base) {
                Ok(rest) => dir.join(rest),
                Err(_) => dir.join(record.file_name()),
            },
            None => dir.join(record.file_name()),
        }
    }
}

impl Stage for DestStage {
    fn name(&self) -> &str {
        "dest"
    }

    fn apply<'a>(
        &'a self,
        files: FileSet,
        cx: &'a StageCx,
    ) -> Pin<Box<dyn Future<Output = Result<FileSet>> + Send + 'a>> {
        Box::pin(async move {
            let mut out = Vec::with_capacity(files.len());
            for record in files {
                let rel = self.target_rel_path(&record);
                cx.fs
                    .write(&cx.root.join(&rel), &record.contents)
                    .with_context(|| format!("writing {:?}", rel))?;
                out.push(FileRecord::new(rel, record.contents));
            }
            debug!(dir = %self.dir, files = out.len(), "wrote file set");
            Ok(out)
        })
    }
}

/// Deletes files matching the given globs under the project root.
///
/// The flowing file set passes through unchanged.
pub struct CleanStage {
    patterns: Vec<String>,
}

impl CleanStage {
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }
}

impl Stage for CleanStage {
    fn name(&self) -> &str {
        "clean"
    }

    fn apply<'a>(
        &'a self,
        files: FileSet,
        cx: &'a StageCx,
    ) -> Pin<Box<dyn Future<Output = Result<FileSet>> + Send + 'a>> {
        Box::pin(async move {
            let set = build_globset(&self.patterns)?;
            let stale = collect_matching_paths(cx.fs.as_ref(), &cx.root, &set)?;
            for rel in &stale {
                cx.fs.remove_file(&cx.root.join(rel))?;
            }
            info!(patterns = ?self.patterns, removed = stale.len(), "cleaned stale output");
            Ok(files)
        })
    }
}

/// Retains only the records matching the given globs.
pub struct FilterStage {
    label: String,
    set: GlobSet,
}

impl FilterStage {
    pub fn new(
        label: impl Into<String>,
        patterns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self> {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        Ok(Self {
            label: label.into(),
            set: build_globset(&patterns)?,
        })
    }
}

impl Stage for FilterStage {
    fn name(&self) -> &str {
        &self.label
    }

    fn apply<'a>(
        &'a self,
        files: FileSet,
        _cx: &'a StageCx,
    ) -> Pin<Box<dyn Future<Output = Result<FileSet>> + Send + 'a>> {
        Box::pin(async move {
            let out: FileSet = files
                .into_iter()
                .filter(|r| {
                    let rel = r.path.to_string_lossy().replace('\\', "/");
                    self.set.is_match(rel)
                })
                .collect();
            Ok(out)
        })
    }
}

/// Concatenates every record into a single output record.
pub struct ConcatStage {
    output: String,
}

impl ConcatStage {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
        }
    }
}

impl Stage for ConcatStage {
    fn name(&self) -> &str {
        "concat"
    }

    fn apply<'a>(
        &'a self,
        files: FileSet,
        _cx: &'a StageCx,
    ) -> Pin<Box<dyn Future<Output = Result<FileSet>> + Send + 'a>> {
        Box::pin(async move {
            let mut contents = Vec::new();
            for record in &files {
                contents.extend_from_slice(&record.contents);
                if !record.contents.ends_with(b"\n") {
                    contents.push(b'\n');
                }
            }
            Ok(vec![FileRecord::new(self.output.clone(), contents)])
        })
    }
}

/// Pipes each record through an external shell command (stdin → stdout).
///
/// This is where style compilation, minification and image compression are
/// delegated. An unconfigured command means the stage passes files through
/// untouched, so projects can opt out of individual transforms.
pub struct CommandStage {
    label: String,
    command: Option<String>,
}

impl CommandStage {
    pub fn new(label: impl Into<String>, command: Option<String>) -> Self {
        Self {
            label: label.into(),
            command,
        }
    }
}

impl Stage for CommandStage {
    fn name(&self) -> &str {
        &self.label
    }

    fn apply<'a>(
        &'a self,
        files: FileSet,
        _cx: &'a StageCx,
    ) -> Pin<Box<dyn Future<Output = Result<FileSet>> + Send + 'a>> {
        Box::pin(async move {
            let Some(command) = &self.command else {
                debug!(stage = %self.label, "no command configured; passing files through");
                return Ok(files);
            };

            let mut out = Vec::with_capacity(files.len());
            for record in files {
                let transformed = pipe_through_command(command, &record.contents)
                    .await
                    .with_context(|| {
                        format!("piping {:?} through '{}'", record.path, command)
                    })?;
                out.push(FileRecord::new(record.path, transformed));
            }
            Ok(out)
        })
    }
}

/// Run `input` through a shell command, returning its stdout.
pub async fn pipe_through_command(command: &str, input: &[u8]) -> Result<Vec<u8>> {
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };

    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning '{command}'"))?;

    let mut stdin = child
        .stdin
        .take()
        .context("child process has no stdin handle")?;

    // Feed stdin from a separate task so a chatty command can't deadlock the
    // pipe while we wait on stdout.
    let input = input.to_vec();
    let writer = tokio::spawn(async move {
        let _ = stdin.write_all(&input).await;
    });

    let output = child.wait_with_output().await?;
    let _ = writer.await;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "command '{}' exited with {}: {}",
            command,
            output.status.code().unwrap_or(-1),
            stderr.trim()
        );
    }

    Ok(output.stdout)
}
