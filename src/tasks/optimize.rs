// src/tasks/optimize.rs

//! Production assembly, test orchestration and the serve entry points.

use std::sync::Arc;

use tracing::info;

use crate::context::TaskContext;
use crate::errors::Result;
use crate::notify_desktop;
use crate::pipeline::{
    CommandStage, ConcatStage, DestStage, FileRecord, FileSet, Pipeline, RevStage,
    collect_sources,
};
use crate::registry::TaskRegistry;
use crate::serve::{self, RunMode};
use crate::tasks::stage_cx;
use crate::testrun;

pub fn register(registry: &mut TaskRegistry) -> Result<()> {
    registry.register("test", &["vet", "template-cache"], test)?;
    registry.register("autotest", &["vet", "template-cache"], autotest)?;
    registry.register("optimize", &["inject", "test"], optimize)?;
    registry.register("build", &["optimize", "images", "fonts"], build)?;
    registry.register("serve-dev", &["inject"], serve_dev)?;
    registry.register("serve-build", &["build"], serve_build)?;
    Ok(())
}

async fn test(cx: Arc<TaskContext>) -> Result<()> {
    testrun::run_tests(&cx, true).await
}

async fn autotest(cx: Arc<TaskContext>) -> Result<()> {
    testrun::run_tests(&cx, false).await
}

/// Assemble the optimized production bundle in the build directory.
///
/// Compiled css and application scripts (including the template cache) are
/// minified and concatenated into single files, revisioned with content
/// hashes, and written out together with the rewritten index page and the
/// revision manifest.
async fn optimize(cx: Arc<TaskContext>) -> Result<()> {
    let scx = stage_cx(&cx);

    let css_sources = collect_sources(cx.fs.as_ref(), &cx.root, &cx.config.assets.css)?;
    let css = Pipeline::new("optimize")
        .stage(CommandStage::new(
            "minify-css",
            cx.config.stages.minify_css.clone(),
        ))
        .stage(ConcatStage::new("styles.css"))
        .run(css_sources, &scx)
        .await?;

    let mut script_globs = cx.config.assets.scripts.clone();
    script_globs.push(format!(
        "{}/{}",
        cx.config.paths.temp, cx.config.template_cache.file
    ));
    let js_sources = collect_sources(cx.fs.as_ref(), &cx.root, &script_globs)?;
    let js = Pipeline::new("optimize")
        .stage(CommandStage::new(
            "minify-js",
            cx.config.stages.minify_js.clone(),
        ))
        .stage(ConcatStage::new("app.js"))
        .run(js_sources, &scx)
        .await?;

    // Point the index page at the concatenated bundles before revisioning
    // rewrites the names.
    let index_path = cx.root.join(&cx.config.paths.index);
    let index_html = cx.fs.read_to_string(&index_path)?;
    let index_html = replace_marker_block(
        &index_html,
        "css",
        "    <link rel=\"stylesheet\" href=\"/styles.css\">",
    );
    let index_html = replace_marker_block(
        &index_html,
        "js",
        "    <script src=\"/app.js\"></script>",
    );
    let index_html = replace_marker_block(&index_html, "vendor", "");

    let mut bundle: FileSet = Vec::new();
    bundle.extend(css);
    bundle.extend(js);
    bundle.push(FileRecord::new("index.html", index_html));

    let out = Pipeline::new("optimize")
        .stage(RevStage::new("rev-manifest.json"))
        .stage(DestStage::flat(cx.config.paths.build.clone()))
        .run(bundle, &scx)
        .await?;

    info!(files = out.len(), build = %cx.config.paths.build, "optimized build assembled");
    Ok(())
}

/// Replace the contents of an inject marker block, leaving the markers in
/// place. Missing markers are left alone; optimize tolerates index pages
/// that never used injection.
fn replace_marker_block(html: &str, marker: &str, replacement: &str) -> String {
    let open = format!("<!-- inject:{marker} -->");
    let close = "<!-- endinject -->";

    let Some(start) = html.find(&open) else {
        return html.to_string();
    };
    let after_open = start + open.len();
    let Some(end) = html[after_open..].find(close).map(|i| after_open + i) else {
        return html.to_string();
    };

    let mut out = String::with_capacity(html.len());
    out.push_str(&html[..after_open]);
    out.push('\n');
    if !replacement.is_empty() {
        out.push_str(replacement);
        out.push('\n');
    }
    out.push_str("    ");
    out.push_str(&html[end..]);
    out
}

/// Full production build: optimized code plus images and fonts, then the
/// temp directory is dropped and a notification announces completion.
async fn build(cx: Arc<TaskContext>) -> Result<()> {
    cx.fs.remove_dir_all(&cx.root.join(&cx.config.paths.temp))?;
    info!(build = %cx.config.paths.build, "build complete");
    notify_desktop::notify("buildpipe", "Deployed code!").await;
    Ok(())
}

async fn serve_dev(cx: Arc<TaskContext>) -> Result<()> {
    serve::serve(cx, RunMode::Dev).await
}

async fn serve_build(cx: Arc<TaskContext>) -> Result<()> {
    serve::serve(cx, RunMode::Build).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_block_replacement_is_idempotent() {
        let html = "<head>\n    <!-- inject:css -->\n    <link href=\"a.css\">\n    <!-- endinject -->\n</head>\n";
        let once = replace_marker_block(html, "css", "    <link href=\"/styles.css\">");
        let twice = replace_marker_block(&once, "css", "    <link href=\"/styles.css\">");
        assert_eq!(once, twice);
        assert!(once.contains("/styles.css"));
        assert!(!once.contains("a.css"));
    }

    #[test]
    fn missing_marker_leaves_html_untouched() {
        let html = "<head></head>";
        assert_eq!(replace_marker_block(html, "css", "x"), html);
    }
}
