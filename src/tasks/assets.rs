// src/tasks/assets.rs

//! Asset pipeline tasks: cleaning, styles, fonts, images, markup injection
//! and the template cache.

use std::sync::Arc;

use tracing::info;

use crate::context::TaskContext;
use crate::errors::Result;
use crate::pipeline::{
    CleanStage, CommandStage, DestStage, InjectStage, Pipeline, TemplateCacheStage,
    collect_sources,
};
use crate::registry::TaskRegistry;
use crate::tasks::stage_cx;

pub fn register(registry: &mut TaskRegistry) -> Result<()> {
    registry.register("clean", &[], clean)?;
    registry.register("clean-styles", &[], clean_styles)?;
    registry.register("clean-fonts", &[], clean_fonts)?;
    registry.register("clean-images", &[], clean_images)?;
    registry.register("clean-code", &[], clean_code)?;
    registry.register("vet", &[], vet)?;
    registry.register("styles", &["clean-styles"], styles)?;
    registry.register("fonts", &["clean-fonts"], fonts)?;
    registry.register("images", &["clean-images"], images)?;
    registry.register("template-cache", &["clean-code"], template_cache)?;
    registry.register("wiredep", &[], wiredep)?;
    registry.register(
        "inject",
        &["wiredep", "styles", "template-cache"],
        inject,
    )?;
    Ok(())
}

/// Delete the temp and build directories outright.
async fn clean(cx: Arc<TaskContext>) -> Result<()> {
    let temp = cx.root.join(&cx.config.paths.temp);
    let build = cx.root.join(&cx.config.paths.build);
    info!(temp = %cx.config.paths.temp, build = %cx.config.paths.build, "cleaning output directories");
    cx.fs.remove_dir_all(&temp)?;
    cx.fs.remove_dir_all(&build)?;
    Ok(())
}

async fn clean_styles(cx: Arc<TaskContext>) -> Result<()> {
    let pattern = format!("{}/**/*.css", cx.config.paths.temp);
    Pipeline::new("clean-styles")
        .stage(CleanStage::new([pattern]))
        .run(Vec::new(), &stage_cx(&cx))
        .await?;
    Ok(())
}

async fn clean_fonts(cx: Arc<TaskContext>) -> Result<()> {
    let pattern = format!("{}/fonts/**/*", cx.config.paths.build);
    Pipeline::new("clean-fonts")
        .stage(CleanStage::new([pattern]))
        .run(Vec::new(), &stage_cx(&cx))
        .await?;
    Ok(())
}

async fn clean_images(cx: Arc<TaskContext>) -> Result<()> {
    let pattern = format!("{}/images/**/*", cx.config.paths.build);
    Pipeline::new("clean-images")
        .stage(CleanStage::new([pattern]))
        .run(Vec::new(), &stage_cx(&cx))
        .await?;
    Ok(())
}

/// Delete generated scripts and markup from both output directories.
async fn clean_code(cx: Arc<TaskContext>) -> Result<()> {
    let patterns = vec![
        format!("{}/**/*.js", cx.config.paths.temp),
        format!("{}/**/*.html", cx.config.paths.temp),
        format!("{}/**/*.js", cx.config.paths.build),
        format!("{}/**/*.html", cx.config.paths.build),
    ];
    Pipeline::new("clean-code")
        .stage(CleanStage::new(patterns))
        .run(Vec::new(), &stage_cx(&cx))
        .await?;
    Ok(())
}

/// Run the configured linter over every application script.
async fn vet(cx: Arc<TaskContext>) -> Result<()> {
    let scx = stage_cx(&cx);
    let sources = collect_sources(cx.fs.as_ref(), &cx.root, &cx.config.assets.scripts)?;
    info!(files = sources.len(), "vetting scripts");
    Pipeline::new("vet")
        .stage(CommandStage::new("lint", cx.config.stages.vet.clone()))
        .run(sources, &scx)
        .await?;
    Ok(())
}

/// Compile style sources into css in the temp directory.
async fn styles(cx: Arc<TaskContext>) -> Result<()> {
    let scx = stage_cx(&cx);
    let sources = collect_sources(cx.fs.as_ref(), &cx.root, &cx.config.assets.styles)?;
    info!(files = sources.len(), "compiling styles");
    Pipeline::new("styles")
        .stage(CommandStage::new(
            "compile-styles",
            cx.config.stages.styles.clone(),
        ))
        .stage(DestStage::flat(cx.config.paths.temp.clone()))
        .run(sources, &scx)
        .await?;
    Ok(())
}

/// Copy fonts into the build output.
async fn fonts(cx: Arc<TaskContext>) -> Result<()> {
    let scx = stage_cx(&cx);
    let sources = collect_sources(cx.fs.as_ref(), &cx.root, &cx.config.assets.fonts)?;
    Pipeline::new("fonts")
        .stage(DestStage::flat(format!("{}/fonts", cx.config.paths.build)))
        .run(sources, &scx)
        .await?;
    Ok(())
}

/// Compress images into the build output.
async fn images(cx: Arc<TaskContext>) -> Result<()> {
    let scx = stage_cx(&cx);
    let sources = collect_sources(cx.fs.as_ref(), &cx.root, &cx.config.assets.images)?;
    Pipeline::new("images")
        .stage(CommandStage::new(
            "compress",
            cx.config.stages.images.clone(),
        ))
        .stage(DestStage::flat(format!("{}/images", cx.config.paths.build)))
        .run(sources, &scx)
        .await?;
    Ok(())
}

/// Bundle markup templates into a single template-cache script in temp.
async fn template_cache(cx: Arc<TaskContext>) -> Result<()> {
    let scx = stage_cx(&cx);
    let sources = collect_sources(
        cx.fs.as_ref(),
        &cx.root,
        &cx.config.assets.html_templates,
    )?;
    info!(templates = sources.len(), "building template cache");
    Pipeline::new("template-cache")
        .stage(CommandStage::new(
            "minify-html",
            cx.config.stages.minify_html.clone(),
        ))
        .stage(TemplateCacheStage::new(
            cx.config.template_cache.file.clone(),
            cx.config.template_cache.module.clone(),
        ))
        .stage(DestStage::flat(cx.config.paths.temp.clone()))
        .run(sources, &scx)
        .await?;
    Ok(())
}

/// Wire vendor and application scripts into the index page.
async fn wiredep(cx: Arc<TaskContext>) -> Result<()> {
    let scx = stage_cx(&cx);
    let index = cx.config.paths.index.clone();

    let vendor = collect_sources(
        cx.fs.as_ref(),
        &cx.root,
        &cx.config.assets.vendor_scripts,
    )?;
    Pipeline::new("wiredep")
        .stage(InjectStage::new(index.clone(), "vendor"))
        .stage(DestStage::in_place())
        .run(vendor, &scx)
        .await?;

    let scripts = collect_sources(cx.fs.as_ref(), &cx.root, &cx.config.assets.scripts)?;
    Pipeline::new("wiredep")
        .stage(InjectStage::new(index, "js"))
        .stage(DestStage::in_place())
        .run(scripts, &scx)
        .await?;
    Ok(())
}

/// Inject compiled css into the index page.
async fn inject(cx: Arc<TaskContext>) -> Result<()> {
    let scx = stage_cx(&cx);
    let css = collect_sources(cx.fs.as_ref(), &cx.root, &cx.config.assets.css)?;
    Pipeline::new("inject")
        .stage(InjectStage::new(cx.config.paths.index.clone(), "css"))
        .stage(DestStage::in_place())
        .run(css, &scx)
        .await?;
    Ok(())
}
