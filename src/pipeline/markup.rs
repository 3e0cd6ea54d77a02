// src/pipeline/markup.rs

//! HTML-aware stages: tag injection into the index page and template
//! cache bundling.

use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::pipeline::{FileRecord, FileSet, Stage, StageCx};

/// Splices link/script tags for the incoming file set into a marker region
/// of the index page.
///
/// The region is delimited by `<!-- inject:NAME -->` and `<!-- endinject -->`
/// comments; everything between them is replaced on every run, so injection
/// is idempotent. The rewritten index is the stage's only output record.
pub struct InjectStage {
    index: String,
    marker: String,
}

impl InjectStage {
    pub fn new(index: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            marker: marker.into(),
        }
    }

    fn tag_for(path: &str) -> Option<String> {
        let href = format!("/{}", path.trim_start_matches("./").trim_start_matches('/'));
        if path.ends_with(".css") {
            Some(format!("<link rel=\"stylesheet\" href=\"{href}\">"))
        } else if path.ends_with(".js") {
            Some(format!("<script src=\"{href}\"></script>"))
        } else {
            None
        }
    }
}

impl Stage for InjectStage {
    fn name(&self) -> &str {
        "inject"
    }

    fn apply<'a>(
        &'a self,
        files: FileSet,
        cx: &'a StageCx,
    ) -> Pin<Box<dyn Future<Output = Result<FileSet>> + Send + 'a>> {
        Box::pin(async move {
            let index_path = cx.root.join(&self.index);
            let html = cx
                .fs
                .read_to_string(&index_path)
                .with_context(|| format!("reading index page {:?}", index_path))?;

            let open = format!("<!-- inject:{} -->", self.marker);
            let close = "<!-- endinject -->";

            let start = html
                .find(&open)
                .ok_or_else(|| anyhow!("index page has no '{open}' marker"))?;
            let after_open = start + open.len();
            let end = html[after_open..]
                .find(close)
                .map(|i| after_open + i)
                .ok_or_else(|| anyhow!("index page has no '{close}' after '{open}'"))?;

            // Indent injected tags like the opening marker line.
            let indent: String = html[..start]
                .rfind('\n')
                .map(|nl| {
                    html[nl + 1..start]
                        .chars()
                        .take_while(|c| c.is_whitespace())
                        .collect()
                })
                .unwrap_or_default();

            let mut tags = Vec::new();
            for record in &files {
                let rel = record.path.to_string_lossy().replace('\\', "/");
                if let Some(tag) = Self::tag_for(&rel) {
                    tags.push(format!("{indent}{tag}"));
                }
            }

            let mut rewritten = String::with_capacity(html.len());
            rewritten.push_str(&html[..after_open]);
            rewritten.push('\n');
            for tag in &tags {
                rewritten.push_str(tag);
                rewritten.push('\n');
            }
            rewritten.push_str(&indent);
            rewritten.push_str(&html[end..]);

            debug!(marker = %self.marker, tags = tags.len(), "injected tags into index");
            Ok(vec![FileRecord::new(self.index.clone(), rewritten)])
        })
    }
}

/// Bundles HTML template records into a single JS module that pre-loads
/// them into the application's template cache.
pub struct TemplateCacheStage {
    output: String,
    module: String,
}

impl TemplateCacheStage {
    pub fn new(output: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            module: module.into(),
        }
    }
}

fn js_string_literal(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('\'');
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            c => escaped.push(c),
        }
    }
    escaped.push('\'');
    escaped
}

impl Stage for TemplateCacheStage {
    fn name(&self) -> &str {
        "template-cache"
    }

    fn apply<'a>(
        &'a self,
        files: FileSet,
        _cx: &'a StageCx,
    ) -> Pin<Box<dyn Future<Output = Result<FileSet>> + Send + 'a>> {
        Box::pin(async move {
            let mut body = String::new();
            body.push_str(&format!(
                "angular.module({}).run(['$templateCache', function ($templateCache) {{\n",
                js_string_literal(&self.module)
            ));
            for record in &files {
                let id = record.path.to_string_lossy().replace('\\', "/");
                let html = record
                    .text()
                    .with_context(|| format!("template {:?} is not UTF-8", record.path))?;
                body.push_str(&format!(
                    "  $templateCache.put({}, {});\n",
                    js_string_literal(&id),
                    js_string_literal(html)
                ));
            }
            body.push_str("}]);\n");

            debug!(templates = files.len(), output = %self.output, "bundled templates");
            Ok(vec![FileRecord::new(self.output.clone(), body)])
        })
    }
}
