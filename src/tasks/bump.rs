// src/tasks/bump.rs

//! Version bumping across package manifests.

use std::sync::Arc;

use anyhow::{Context, anyhow};
use tracing::info;

use crate::cli::BumpType;
use crate::context::TaskContext;
use crate::errors::{BuildpipeError, Result};
use crate::pipeline::collect_sources;
use crate::registry::TaskRegistry;

pub fn register(registry: &mut TaskRegistry) -> Result<()> {
    registry.register("bump", &[], bump)?;
    Ok(())
}

/// Rewrite the `version` field of every configured package manifest.
///
/// `--set-version` wins over `--bump-type`; with neither, the patch
/// component is bumped.
async fn bump(cx: Arc<TaskContext>) -> Result<()> {
    let manifests = collect_sources(cx.fs.as_ref(), &cx.root, &cx.config.assets.packages)?;
    if manifests.is_empty() {
        return Err(BuildpipeError::ConfigError(
            "bump: no package manifests configured under [assets] packages".to_string(),
        ));
    }

    for record in manifests {
        let text = record.text().map_err(BuildpipeError::Other)?;
        let mut manifest: serde_json::Value = serde_json::from_str(text)?;

        let current = manifest
            .get("version")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                BuildpipeError::ConfigError(format!(
                    "bump: {:?} has no string 'version' field",
                    record.path
                ))
            })?;

        let next = match &cx.flags.set_version {
            Some(version) => version.clone(),
            None => {
                bump_semver(current, cx.flags.bump_type.unwrap_or(BumpType::Patch))
                    .map_err(BuildpipeError::Other)?
            }
        };

        info!(manifest = ?record.path, from = current, to = %next, "bumping version");
        manifest["version"] = serde_json::Value::String(next);
        let out = serde_json::to_string_pretty(&manifest)? + "\n";
        cx.fs.write(&cx.root.join(&record.path), out.as_bytes())?;
    }
    Ok(())
}

fn bump_semver(version: &str, kind: BumpType) -> anyhow::Result<String> {
    let core = version.split(['-', '+']).next().unwrap_or(version);
    let mut parts = core.split('.');
    let major: u64 = parse_component(parts.next(), version)?;
    let minor: u64 = parse_component(parts.next(), version)?;
    let patch: u64 = parse_component(parts.next(), version)?;

    Ok(match kind {
        BumpType::Major => format!("{}.0.0", major + 1),
        BumpType::Minor => format!("{major}.{}.0", minor + 1),
        BumpType::Patch => format!("{major}.{minor}.{}", patch + 1),
        BumpType::Pre => format!("{major}.{minor}.{patch}-pre.1"),
    })
}

fn parse_component(part: Option<&str>, version: &str) -> anyhow::Result<u64> {
    part.ok_or_else(|| anyhow!("'{version}' is not a semver version"))?
        .parse()
        .with_context(|| format!("'{version}' is not a semver version"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bumps_each_component() {
        assert_eq!(bump_semver("1.2.3", BumpType::Major).unwrap(), "2.0.0");
        assert_eq!(bump_semver("1.2.3", BumpType::Minor).unwrap(), "1.3.0");
        assert_eq!(bump_semver("1.2.3", BumpType::Patch).unwrap(), "1.2.4");
        assert_eq!(bump_semver("1.2.3", BumpType::Pre).unwrap(), "1.2.3-pre.1");
    }

    #[test]
    fn pre_release_suffix_is_dropped_before_bumping() {
        assert_eq!(
            bump_semver("1.2.3-beta.4", BumpType::Patch).unwrap(),
            "1.2.4"
        );
    }

    #[test]
    fn garbage_version_is_rejected() {
        assert!(bump_semver("not-a-version", BumpType::Patch).is_err());
        assert!(bump_semver("1.2", BumpType::Patch).is_err());
    }
}
