// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{Config, RawConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw
/// `RawConfig`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks path and port sanity (see `config::validate`).
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Config> {
    let raw = load_from_path(&path)?;
    let config = Config::try_from(raw)?;
    Ok(config)
}

/// Resolve the default config path.
///
/// Currently this just returns `Buildpipe.toml` in the current working
/// directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Buildpipe.toml")
}
