// src/config/mod.rs

//! Project configuration: paths, asset globs, delegated stage commands and
//! server/reload/test settings.
//!
//! The configuration is loaded once at startup, validated, and passed around
//! as an immutable value. Nothing reads it from ambient state.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    AssetGlobs, Config, Paths, RawConfig, ReloadConfig, ServerConfig, StageCommands,
    TemplateCacheConfig, TestConfig,
};
