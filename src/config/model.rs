// src/config/model.rs

use serde::Deserialize;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [paths]
/// client = "src/client"
/// temp = ".tmp"
/// build = "build"
/// index = "src/client/index.html"
///
/// [assets]
/// styles = ["src/client/styles/**/*.less"]
/// scripts = ["src/client/app/**/*.js"]
///
/// [server]
/// command = "node src/server/app.js"
/// port = 7203
/// ```
///
/// All sections are optional and have reasonable defaults; validation happens
/// in [`crate::config::validate`].
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfig {
    #[serde(default)]
    pub paths: Paths,

    #[serde(default)]
    pub assets: AssetGlobs,

    /// Delegated external transform commands from `[stages]`.
    #[serde(default)]
    pub stages: StageCommands,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub reload: ReloadConfig,

    #[serde(default)]
    pub test: TestConfig,

    #[serde(default)]
    pub template_cache: TemplateCacheConfig,
}

/// Validated configuration handed to the rest of the application.
///
/// Construct via `Config::try_from(raw)` (see `config::validate`), never
/// directly from unvalidated input.
#[derive(Debug, Clone)]
pub struct Config {
    pub paths: Paths,
    pub assets: AssetGlobs,
    pub stages: StageCommands,
    pub server: ServerConfig,
    pub reload: ReloadConfig,
    pub test: TestConfig,
    pub template_cache: TemplateCacheConfig,
}

impl Config {
    /// Internal constructor used after validation.
    pub(crate) fn new_unchecked(raw: RawConfig) -> Self {
        Self {
            paths: raw.paths,
            assets: raw.assets,
            stages: raw.stages,
            server: raw.server,
            reload: raw.reload,
            test: raw.test,
            template_cache: raw.template_cache,
        }
    }
}

/// `[paths]` section: project directories and the index file.
#[derive(Debug, Clone, Deserialize)]
pub struct Paths {
    /// Client source root.
    #[serde(default = "default_client")]
    pub client: String,

    /// Temp directory for intermediate pipeline output.
    #[serde(default = "default_temp")]
    pub temp: String,

    /// Build output directory.
    #[serde(default = "default_build")]
    pub build: String,

    /// The markup entry point that injection targets.
    #[serde(default = "default_index")]
    pub index: String,
}

fn default_client() -> String {
    "src/client".to_string()
}
fn default_temp() -> String {
    ".tmp".to_string()
}
fn default_build() -> String {
    "build".to_string()
}
fn default_index() -> String {
    "src/client/index.html".to_string()
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            client: default_client(),
            temp: default_temp(),
            build: default_build(),
            index: default_index(),
        }
    }
}

/// `[assets]` section: source glob sets, all relative to the project root.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AssetGlobs {
    /// Style sources (e.g. less/scss files).
    #[serde(default)]
    pub styles: Vec<String>,

    /// Application scripts.
    #[serde(default)]
    pub scripts: Vec<String>,

    /// Third-party scripts wired into markup before app scripts.
    #[serde(default)]
    pub vendor_scripts: Vec<String>,

    /// Compiled css (produced by the styles task into the temp dir).
    #[serde(default)]
    pub css: Vec<String>,

    #[serde(default)]
    pub fonts: Vec<String>,

    #[serde(default)]
    pub images: Vec<String>,

    /// All markup, used by the build watch set.
    #[serde(default)]
    pub html: Vec<String>,

    /// Markup templates bundled by the template-cache task.
    #[serde(default)]
    pub html_templates: Vec<String>,

    /// Test spec files.
    #[serde(default)]
    pub specs: Vec<String>,

    /// Spec files that require a running app server.
    #[serde(default)]
    pub server_specs: Vec<String>,

    /// Package manifests touched by the bump task.
    #[serde(default)]
    pub packages: Vec<String>,
}

/// `[stages]` section: external commands the pipelines delegate to.
///
/// Each command receives file contents on stdin and must write the
/// transformed contents to stdout. A missing command means the corresponding
/// stage passes files through untouched.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StageCommands {
    /// Style compilation (e.g. a less/sass compiler).
    #[serde(default)]
    pub styles: Option<String>,

    /// Script lint for the vet task.
    #[serde(default)]
    pub vet: Option<String>,

    #[serde(default)]
    pub minify_css: Option<String>,

    #[serde(default)]
    pub minify_js: Option<String>,

    /// Image compression.
    #[serde(default)]
    pub images: Option<String>,

    /// Html minification for the template cache.
    #[serde(default)]
    pub minify_html: Option<String>,
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Shell command that starts the app server.
    ///
    /// If `None`, serving falls back to a static file server over the
    /// relevant output directory.
    #[serde(default)]
    pub command: Option<String>,

    /// Default port passed to the server process as `PORT`.
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Server source globs; a change restarts the server process.
    #[serde(default)]
    pub watch: Vec<String>,
}

fn default_server_port() -> u16 {
    7203
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: None,
            port: default_server_port(),
            watch: Vec::new(),
        }
    }
}

/// `[reload]` section: live-reload websocket settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ReloadConfig {
    #[serde(default = "default_reload_port")]
    pub port: u16,

    /// Delay between a completed rebuild and the reload broadcast.
    #[serde(default = "default_reload_delay_ms")]
    pub delay_ms: u64,
}

fn default_reload_port() -> u16 {
    3001
}
fn default_reload_delay_ms() -> u64 {
    1000
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            port: default_reload_port(),
            delay_ms: default_reload_delay_ms(),
        }
    }
}

/// `[test]` section: test runner orchestration.
#[derive(Debug, Clone, Deserialize)]
pub struct TestConfig {
    /// Shell command that starts the test runner.
    #[serde(default)]
    pub runner: Option<String>,

    /// Flag appended for one-shot runs (the `test` task).
    #[serde(default = "default_single_run_flag")]
    pub single_run_flag: String,

    /// Flag used to exclude a spec glob from the run, repeated per glob.
    #[serde(default = "default_exclude_flag")]
    pub exclude_flag: String,

    /// Port the auxiliary server listens on during test runs.
    #[serde(default = "default_test_server_port")]
    pub server_port: u16,
}

fn default_single_run_flag() -> String {
    "--single-run".to_string()
}
fn default_exclude_flag() -> String {
    "--exclude".to_string()
}
fn default_test_server_port() -> u16 {
    8888
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            runner: None,
            single_run_flag: default_single_run_flag(),
            exclude_flag: default_exclude_flag(),
            server_port: default_test_server_port(),
        }
    }
}

/// `[template_cache]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateCacheConfig {
    /// Output filename (written into the temp dir).
    #[serde(default = "default_template_cache_file")]
    pub file: String,

    /// Module name the bundled templates register against.
    #[serde(default = "default_template_cache_module")]
    pub module: String,
}

fn default_template_cache_file() -> String {
    "templates.js".to_string()
}
fn default_template_cache_module() -> String {
    "app.core".to_string()
}

impl Default for TemplateCacheConfig {
    fn default() -> Self {
        Self {
            file: default_template_cache_file(),
            module: default_template_cache_module(),
        }
    }
}
