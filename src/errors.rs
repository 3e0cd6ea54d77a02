// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildpipeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unknown task: '{0}' is not registered")]
    UnknownTask(String),

    #[error("Cycle detected in task graph: {0}")]
    DependencyCycle(String),

    #[error("Stage '{stage}' failed in task '{task}': {source}")]
    StageError {
        task: String,
        stage: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Task '{task}' failed: {source}")]
    TaskFailed {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Test runner exited with code {0}")]
    TestsFailed(i32),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildpipeError>;
