//! Layered configuration loading.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format as _, Json, Serialized, Toml};
use tracing::debug;

use crate::config::{Configuration, PipelineConfig};
use crate::error::{ConfigError, Result};

/// Prefix of environment variables read by the loader.
pub const ENV_PREFIX: &str = "CRAWLPACK_";

/// Files searched for in the working directory, in order.
pub const CONFIG_FILE_NAMES: [&str; 2] = ["crawlpack.toml", "crawlpack.json"];

const ENV_KEYS: [&str; 12] = [
    "file_name",
    "source",
    "dest",
    "watch",
    "compress",
    "minify",
    "gzip",
    "sourcemap",
    "minify_level",
    "concurrency",
    "debounce_ms",
    "log",
];

/// Loads a [`PipelineConfig`] from several sources.
/// Priority: overrides > environment variables > config file.
///
/// Relative paths in any layer are anchored at the loader's working
/// directory.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    cwd: PathBuf,
    file: Option<PathBuf>,
    overrides: PipelineConfig,
    env: bool,
}

impl ConfigLoader {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            file: None,
            overrides: PipelineConfig::default(),
            env: true,
        }
    }

    /// Use this file instead of searching the working directory.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Values that win over every other layer.
    pub fn overrides(mut self, overrides: PipelineConfig) -> Self {
        self.overrides = overrides;
        self
    }

    /// Skip the environment layer.
    pub fn without_env(mut self) -> Self {
        self.env = false;
        self
    }

    /// The config file that will be read, if any.
    pub fn config_file(&self) -> Result<Option<PathBuf>> {
        if let Some(explicit) = &self.file {
            let path = if explicit.is_absolute() {
                explicit.clone()
            } else {
                self.cwd.join(explicit)
            };
            if !path.is_file() {
                return Err(ConfigError::NotFound(path));
            }
            return Ok(Some(path));
        }

        Ok(CONFIG_FILE_NAMES
            .iter()
            .map(|name| self.cwd.join(name))
            .find(|path| path.is_file()))
    }

    pub fn figment(&self) -> Result<Figment> {
        let mut figment = Figment::new();

        if let Some(path) = self.config_file()? {
            debug!(path = %path.display(), "loading config file");
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file(&path)),
                Some("json") => figment.merge(Json::file(&path)),
                other => {
                    return Err(ConfigError::UnsupportedFormat(
                        other.unwrap_or("<none>").to_string(),
                    ));
                }
            };
        }

        if self.env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).only(&ENV_KEYS));
        }

        Ok(figment.merge(Serialized::defaults(&self.overrides)))
    }

    pub fn load(&self) -> Result<PipelineConfig> {
        Ok(self.figment()?.extract()?)
    }

    /// Load and validate in one step.
    pub fn resolve(&self) -> Result<Configuration> {
        self.load()?.resolve(&self.cwd)
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }
}
