// src/config/validate.rs

use globset::Glob;

use crate::config::model::{Config, RawConfig};
use crate::errors::{BuildpipeError, Result};

impl TryFrom<RawConfig> for Config {
    type Error = BuildpipeError;

    fn try_from(raw: RawConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(Config::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfig) -> Result<()> {
    validate_paths(cfg)?;
    validate_ports(cfg)?;
    validate_globs(cfg)?;
    Ok(())
}

fn validate_paths(cfg: &RawConfig) -> Result<()> {
    for (field, value) in [
        ("paths.client", &cfg.paths.client),
        ("paths.temp", &cfg.paths.temp),
        ("paths.build", &cfg.paths.build),
        ("paths.index", &cfg.paths.index),
    ] {
        if value.trim().is_empty() {
            return Err(BuildpipeError::ConfigError(format!(
                "{field} must not be empty"
            )));
        }
    }

    // Dependent tasks clean the temp and build dirs independently; the same
    // directory for both would let one task delete the other's output.
    if cfg.paths.temp == cfg.paths.build {
        return Err(BuildpipeError::ConfigError(format!(
            "paths.temp and paths.build must differ (both are '{}')",
            cfg.paths.temp
        )));
    }

    Ok(())
}

fn validate_ports(cfg: &RawConfig) -> Result<()> {
    if cfg.server.port == 0 {
        return Err(BuildpipeError::ConfigError(
            "server.port must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.reload.port == cfg.server.port {
        return Err(BuildpipeError::ConfigError(format!(
            "reload.port and server.port must differ (both are {})",
            cfg.server.port
        )));
    }
    Ok(())
}

/// Reject malformed globs up front so pipelines never fail mid-run on a
/// pattern typo.
fn validate_globs(cfg: &RawConfig) -> Result<()> {
    let glob_sets: [(&str, &Vec<String>); 11] = [
        ("assets.styles", &cfg.assets.styles),
        ("assets.scripts", &cfg.assets.scripts),
        ("assets.vendor_scripts", &cfg.assets.vendor_scripts),
        ("assets.css", &cfg.assets.css),
        ("assets.fonts", &cfg.assets.fonts),
        ("assets.images", &cfg.assets.images),
        ("assets.html", &cfg.assets.html),
        ("assets.html_templates", &cfg.assets.html_templates),
        ("assets.specs", &cfg.assets.specs),
        ("assets.server_specs", &cfg.assets.server_specs),
        ("server.watch", &cfg.server.watch),
    ];

    for (field, patterns) in glob_sets {
        for pat in patterns {
            Glob::new(pat).map_err(|e| {
                BuildpipeError::ConfigError(format!("invalid glob in {field}: '{pat}' ({e})"))
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::RawConfig;

    #[test]
    fn default_raw_config_validates() {
        let raw = RawConfig::default();
        assert!(Config::try_from(raw).is_ok());
    }

    #[test]
    fn same_temp_and_build_dir_is_rejected() {
        let mut raw = RawConfig::default();
        raw.paths.temp = "out".to_string();
        raw.paths.build = "out".to_string();

        match Config::try_from(raw) {
            Err(BuildpipeError::ConfigError(msg)) => {
                assert!(msg.contains("paths.temp"));
            }
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn bad_glob_is_rejected() {
        let mut raw = RawConfig::default();
        raw.assets.styles = vec!["src/{unclosed".to_string()];

        assert!(matches!(
            Config::try_from(raw),
            Err(BuildpipeError::ConfigError(_))
        ));
    }
}
