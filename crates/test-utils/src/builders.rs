#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use buildpipe::config::{Config, RawConfig};
use buildpipe::context::{RunFlags, TaskContext};
use buildpipe::fs::MockFileSystem;
use buildpipe::registry::TaskRegistry;

/// Builder for `Config` to simplify test setup.
pub struct ConfigBuilder {
    raw: RawConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawConfig::default(),
        }
    }

    pub fn temp_dir(mut self, dir: &str) -> Self {
        self.raw.paths.temp = dir.to_string();
        self
    }

    pub fn build_dir(mut self, dir: &str) -> Self {
        self.raw.paths.build = dir.to_string();
        self
    }

    pub fn index(mut self, path: &str) -> Self {
        self.raw.paths.index = path.to_string();
        self
    }

    pub fn styles(mut self, pattern: &str) -> Self {
        self.raw.assets.styles.push(pattern.to_string());
        self
    }

    pub fn scripts(mut self, pattern: &str) -> Self {
        self.raw.assets.scripts.push(pattern.to_string());
        self
    }

    pub fn css(mut self, pattern: &str) -> Self {
        self.raw.assets.css.push(pattern.to_string());
        self
    }

    pub fn html_templates(mut self, pattern: &str) -> Self {
        self.raw.assets.html_templates.push(pattern.to_string());
        self
    }

    pub fn packages(mut self, pattern: &str) -> Self {
        self.raw.assets.packages.push(pattern.to_string());
        self
    }

    pub fn server_specs(mut self, pattern: &str) -> Self {
        self.raw.assets.server_specs.push(pattern.to_string());
        self
    }

    pub fn server_command(mut self, command: &str) -> Self {
        self.raw.server.command = Some(command.to_string());
        self
    }

    pub fn test_runner(mut self, command: &str) -> Self {
        self.raw.test.runner = Some(command.to_string());
        self
    }

    pub fn styles_command(mut self, command: &str) -> Self {
        self.raw.stages.styles = Some(command.to_string());
        self
    }

    pub fn build(self) -> Config {
        Config::try_from(self.raw).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A task context backed by an in-memory filesystem.
pub fn mock_context(config: Config, fs: MockFileSystem) -> Arc<TaskContext> {
    Arc::new(
        TaskContext::new(Arc::new(config), RunFlags::default(), ".").with_fs(Arc::new(fs)),
    )
}

/// A task context with default config and flags, for tests that only care
/// about the registry and executor.
pub fn default_context() -> Arc<TaskContext> {
    mock_context(ConfigBuilder::new().build(), MockFileSystem::new())
}

/// Builds registries whose task bodies record their own start order, so
/// tests can assert on real execution rather than plan shape.
pub struct RecordingRegistry {
    registry: TaskRegistry,
    started: Arc<Mutex<Vec<String>>>,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self {
            registry: TaskRegistry::new(),
            started: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A task that records its start and succeeds.
    pub fn task(self, name: &str, deps: &[&str]) -> Self {
        self.task_with_delay(name, deps, Duration::ZERO)
    }

    /// A task that records its start, sleeps, then succeeds.
    pub fn task_with_delay(mut self, name: &str, deps: &[&str], delay: Duration) -> Self {
        let started = Arc::clone(&self.started);
        let owned = name.to_string();
        self.registry
            .register(name, deps, move |_cx| {
                let started = Arc::clone(&started);
                let owned = owned.clone();
                async move {
                    started.lock().unwrap().push(owned);
                    if delay > Duration::ZERO {
                        tokio::time::sleep(delay).await;
                    }
                    Ok(())
                }
            })
            .expect("duplicate task in test registry");
        self
    }

    /// A task that records its start and fails.
    pub fn failing_task(mut self, name: &str, deps: &[&str]) -> Self {
        let started = Arc::clone(&self.started);
        let owned = name.to_string();
        self.registry
            .register(name, deps, move |_cx| {
                let started = Arc::clone(&started);
                let owned = owned.clone();
                async move {
                    started.lock().unwrap().push(owned.clone());
                    Err(buildpipe::BuildpipeError::TaskFailed {
                        task: owned,
                        source: anyhow::anyhow!("injected failure"),
                    })
                }
            })
            .expect("duplicate task in test registry");
        self
    }

    /// A bodiless grouping task.
    pub fn group(mut self, name: &str, deps: &[&str]) -> Self {
        self.registry
            .register_group(name, deps)
            .expect("duplicate task in test registry");
        self
    }

    pub fn build(self) -> (Arc<TaskRegistry>, Arc<Mutex<Vec<String>>>) {
        (Arc::new(self.registry), self.started)
    }
}

impl Default for RecordingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
