// src/pipeline/rev.rs

//! Content-hash revisioning for cache busting.
//!
//! [`RevStage`] renames non-HTML assets to include a short content hash,
//! rewrites references to the renamed files inside text assets, and appends
//! a manifest record mapping original names to hashed names. Persisting the
//! manifest is left to a downstream [`super::DestStage`].

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pipeline::{FileRecord, FileSet, Stage, StageCx};

/// Mapping from original asset file name to its content-hashed name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevManifest {
    entries: BTreeMap<String, String>,
}

impl RevManifest {
    pub fn insert(&mut self, original: impl Into<String>, hashed: impl Into<String>) {
        self.entries.insert(original.into(), hashed.into());
    }

    pub fn get(&self, original: &str) -> Option<&str> {
        self.entries.get(original).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Hex digest prefix length used in hashed file names.
const HASH_LEN: usize = 10;

/// Renames assets to `<stem>-<hash>.<ext>` and fixes up references.
///
/// HTML files are never renamed (they are entry points), but references
/// inside them are rewritten along with references in CSS and JS records.
pub struct RevStage {
    manifest_name: String,
}

impl RevStage {
    pub fn new(manifest_name: impl Into<String>) -> Self {
        Self {
            manifest_name: manifest_name.into(),
        }
    }
}

fn is_entry_point(record: &FileRecord) -> bool {
    matches!(
        record.path.extension().and_then(|e| e.to_str()),
        Some("html") | Some("htm")
    )
}

fn is_text_asset(record: &FileRecord) -> bool {
    matches!(
        record.path.extension().and_then(|e| e.to_str()),
        Some("html") | Some("htm") | Some("css") | Some("js")
    )
}

fn hashed_name(name: &str, contents: &[u8]) -> String {
    let digest = blake3::hash(contents).to_hex();
    let short = &digest.as_str()[..HASH_LEN];
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}-{short}.{ext}"),
        None => format!("{name}-{short}"),
    }
}

impl Stage for RevStage {
    fn name(&self) -> &str {
        "rev"
    }

    fn apply<'a>(
        &'a self,
        files: FileSet,
        _cx: &'a StageCx,
    ) -> Pin<Box<dyn Future<Output = Result<FileSet>> + Send + 'a>> {
        Box::pin(async move {
            let mut manifest = RevManifest::default();
            let mut renames: Vec<(String, String)> = Vec::new();
            let mut out = Vec::with_capacity(files.len() + 1);

            for record in files {
                if is_entry_point(&record) {
                    out.push(record);
                    continue;
                }
                let original = record.file_name();
                let hashed = hashed_name(&original, &record.contents);
                let path = match record.path.parent() {
                    Some(parent) if parent.as_os_str().is_empty() => PathBuf::from(&hashed),
                    Some(parent) => parent.join(&hashed),
                    None => PathBuf::from(&hashed),
                };
                manifest.insert(original.clone(), hashed.clone());
                renames.push((original, hashed));
                out.push(FileRecord::new(path, record.contents));
            }

            // Second pass: rewrite references in text assets. Plain name
            // substitution matches how the assets refer to each other.
            for record in out.iter_mut().filter(|r| is_text_asset(r)) {
                let Ok(text) = std::str::from_utf8(&record.contents) else {
                    continue;
                };
                let mut text = text.to_string();
                for (original, hashed) in &renames {
                    if text.contains(original.as_str()) {
                        text = text.replace(original.as_str(), hashed.as_str());
                    }
                }
                record.contents = text.into_bytes();
            }

            debug!(renamed = manifest.len(), "revisioned assets");
            out.push(FileRecord::new(
                self.manifest_name.clone(),
                manifest.to_json()?,
            ));
            Ok(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use std::sync::Arc;

    fn cx() -> StageCx {
        StageCx::new(Arc::new(MockFileSystem::new()), ".")
    }

    #[tokio::test]
    async fn renames_assets_and_emits_manifest() {
        let stage = RevStage::new("rev-manifest.json");
        let files = vec![
            FileRecord::new("build/app.js", "console.log(1);"),
            FileRecord::new("build/index.html", "<script src=\"app.js\"></script>"),
        ];

        let out = stage.apply(files, &cx()).await.unwrap();

        let js = out
            .iter()
            .find(|r| r.path.extension().is_some_and(|e| e == "js"))
            .unwrap();
        let js_name = js.file_name();
        assert!(js_name.starts_with("app-") && js_name.ends_with(".js"));
        assert_ne!(js_name, "app.js");

        let html = out.iter().find(|r| r.file_name() == "index.html").unwrap();
        assert!(html.text().unwrap().contains(&js_name));

        let manifest_record = out
            .iter()
            .find(|r| r.file_name() == "rev-manifest.json")
            .unwrap();
        let manifest = RevManifest::from_json(manifest_record.text().unwrap()).unwrap();
        assert_eq!(manifest.get("app.js"), Some(js_name.as_str()));
    }

    #[tokio::test]
    async fn same_contents_same_hash() {
        let stage = RevStage::new("rev-manifest.json");
        let a = stage
            .apply(vec![FileRecord::new("a.css", "body{}")], &cx())
            .await
            .unwrap();
        let b = stage
            .apply(vec![FileRecord::new("a.css", "body{}")], &cx())
            .await
            .unwrap();
        assert_eq!(a[0].path, b[0].path);
    }
}
