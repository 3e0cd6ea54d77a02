// tests/pipeline_stages.rs

//! Pipeline behaviour over the in-memory filesystem: stage sequencing,
//! abort-on-failure, and the built-in asset tasks end to end.

mod common;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use buildpipe::BuildpipeError;
use buildpipe::fs::{FileSystem, MockFileSystem};
use buildpipe::graph::execute_task;
use buildpipe::pipeline::{
    DestStage, FileSet, InjectStage, Pipeline, Stage, StageCx, collect_sources,
};
use buildpipe::registry::TaskRegistry;
use buildpipe_test_utils::builders::{ConfigBuilder, mock_context};
use common::{init_tracing, with_timeout};

struct BoomStage;

impl Stage for BoomStage {
    fn name(&self) -> &str {
        "boom"
    }

    fn apply<'a>(
        &'a self,
        _files: FileSet,
        _cx: &'a StageCx,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<FileSet>> + Send + 'a>> {
        Box::pin(async { Err(anyhow::anyhow!("stage blew up")) })
    }
}

#[tokio::test]
async fn stage_failure_aborts_remaining_stages() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("src/a.css", "body{}");
    let scx = StageCx::new(Arc::new(fs.clone()), ".");

    let sources = collect_sources(&fs, std::path::Path::new("."), &["src/*.css".into()]).unwrap();
    let err = Pipeline::new("styles")
        .stage(BoomStage)
        .stage(DestStage::flat(".tmp"))
        .run(sources, &scx)
        .await
        .unwrap_err();

    match err {
        BuildpipeError::StageError { task, stage, .. } => {
            assert_eq!(task, "styles");
            assert_eq!(stage, "boom");
        }
        other => panic!("expected StageError, got {other:?}"),
    }
    // The dest stage never ran.
    assert!(fs.file_paths().iter().all(|p| !p.starts_with(".tmp")));
}

#[tokio::test]
async fn styles_task_writes_into_temp() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("src/client/styles/app.less", "body { color: red; }");

    let config = ConfigBuilder::new()
        .styles("src/client/styles/**/*.less")
        .build();
    let cx = mock_context(config, fs.clone());

    let mut registry = TaskRegistry::new();
    buildpipe::tasks::register_all(&mut registry).unwrap();
    let registry = Arc::new(registry);

    with_timeout(execute_task(&registry, &cx, "styles"))
        .await
        .unwrap();

    // No external compiler configured, so contents pass through untouched.
    assert_eq!(
        fs.read(std::path::Path::new(".tmp/app.less")).unwrap(),
        b"body { color: red; }"
    );
}

#[tokio::test]
async fn template_cache_task_bundles_templates() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("src/client/app/widget.html", "<p>hi</p>");

    let config = ConfigBuilder::new()
        .html_templates("src/client/app/**/*.html")
        .build();
    let cx = mock_context(config, fs.clone());

    let mut registry = TaskRegistry::new();
    buildpipe::tasks::register_all(&mut registry).unwrap();
    let registry = Arc::new(registry);

    with_timeout(execute_task(&registry, &cx, "template-cache"))
        .await
        .unwrap();

    let js = fs
        .read_to_string(std::path::Path::new(".tmp/templates.js"))
        .unwrap();
    assert!(js.contains("angular.module('app.core')"));
    assert!(js.contains("$templateCache.put('src/client/app/widget.html'"));
}

#[tokio::test]
async fn clean_task_removes_output_directories() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(".tmp/styles.css", "x");
    fs.add_file("build/app.js", "y");
    fs.add_file("src/client/index.html", "keep");

    let cx = mock_context(ConfigBuilder::new().build(), fs.clone());
    let mut registry = TaskRegistry::new();
    buildpipe::tasks::register_all(&mut registry).unwrap();
    let registry = Arc::new(registry);

    with_timeout(execute_task(&registry, &cx, "clean"))
        .await
        .unwrap();

    let remaining = fs.file_paths();
    assert_eq!(remaining, vec![std::path::PathBuf::from("src/client/index.html")]);
}

#[tokio::test]
async fn inject_pipeline_rewrites_the_index_in_place() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(
        "src/client/index.html",
        "<head>\n    <!-- inject:css -->\n    <!-- endinject -->\n</head>\n",
    );
    fs.add_file(".tmp/styles.css", "body{}");
    let scx = StageCx::new(Arc::new(fs.clone()), ".");

    let css = collect_sources(&fs, std::path::Path::new("."), &[".tmp/**/*.css".into()]).unwrap();
    Pipeline::new("inject")
        .stage(InjectStage::new("src/client/index.html", "css"))
        .stage(DestStage::in_place())
        .run(css, &scx)
        .await
        .unwrap();

    let html = fs
        .read_to_string(std::path::Path::new("src/client/index.html"))
        .unwrap();
    assert!(html.contains("<link rel=\"stylesheet\" href=\"/.tmp/styles.css\">"));
}
