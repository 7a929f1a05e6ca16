use std::path::{Path, PathBuf};
use std::time::Duration;

use crawlpack_bundler::{BundlerOptions, MinifyLevel};
use path_clean::PathClean;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default number of entries built at the same time.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Default quiet period before a burst of file events becomes a rebuild.
pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

/// Raw pipeline options.
///
/// Every field is optional so layers can be merged without one layer's
/// defaults clobbering another's values; unset fields are skipped when
/// serializing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Basename identifying entry files, e.g. `main.js`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    /// Directory searched for entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,

    /// Directory receiving the outputs, mirroring `source`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<PathBuf>,

    /// Keep running and rebuild entries when their files change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch: Option<bool>,

    /// Umbrella for `minify` and `gzip`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compress: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minify: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gzip: Option<bool>,

    /// Write a `.map` file next to every output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sourcemap: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minify_level: Option<MinifyLevel>,

    /// Maximum number of entries built at the same time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,

    /// Emit progress through the build logger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<bool>,

    /// Options passed through to the bundler factory untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundler: Option<BundlerOptions>,
}

impl PipelineConfig {
    /// The three options every pipeline needs.
    pub fn new(
        file_name: impl Into<String>,
        source: impl Into<PathBuf>,
        dest: impl Into<PathBuf>,
    ) -> Self {
        Self {
            file_name: Some(file_name.into()),
            source: Some(source.into()),
            dest: Some(dest.into()),
            ..Self::default()
        }
    }

    /// Validate and apply defaults. Relative paths are anchored at `cwd`.
    ///
    /// Purely lexical: nothing is read from disk, so a missing source
    /// directory is reported later, by discovery.
    pub fn resolve(&self, cwd: &Path) -> Result<Configuration> {
        let file_name = self
            .file_name
            .as_deref()
            .ok_or(ConfigError::MissingField("file_name"))?;
        let source = self
            .source
            .as_deref()
            .ok_or(ConfigError::MissingField("source"))?;
        let dest = self
            .dest
            .as_deref()
            .ok_or(ConfigError::MissingField("dest"))?;

        validate_file_name(file_name)?;
        if source.as_os_str().is_empty() {
            return Err(ConfigError::invalid("source", "must not be empty"));
        }
        if dest.as_os_str().is_empty() {
            return Err(ConfigError::invalid("dest", "must not be empty"));
        }

        let concurrency = self.concurrency.unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(ConfigError::invalid("concurrency", "must be at least 1"));
        }

        let source = absolute(cwd, source);
        let dest = absolute(cwd, dest);
        if source == dest {
            return Err(ConfigError::invalid(
                "dest",
                "must differ from source, outputs would overwrite their entries",
            ));
        }

        let compress = self.compress.unwrap_or(false);
        Ok(Configuration {
            file_name: file_name.to_string(),
            source,
            dest,
            watch: self.watch.unwrap_or(false),
            minify: self.minify.unwrap_or(compress),
            gzip: self.gzip.unwrap_or(compress),
            sourcemap: self.sourcemap.unwrap_or(true),
            minify_level: self.minify_level.unwrap_or_default(),
            concurrency,
            debounce: Duration::from_millis(self.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS)),
            log: self.log.unwrap_or(true),
            bundler: self.bundler.clone().unwrap_or_default(),
        })
    }
}

fn validate_file_name(file_name: &str) -> Result<()> {
    if file_name.is_empty() {
        return Err(ConfigError::invalid("file_name", "must not be empty"));
    }
    let mut components = Path::new(file_name).components();
    let is_basename = matches!(
        (components.next(), components.next()),
        (Some(std::path::Component::Normal(_)), None)
    );
    if !is_basename || file_name.contains(['/', '\\']) {
        return Err(ConfigError::invalid(
            "file_name",
            format!("'{file_name}' must be a plain file name without directories"),
        ));
    }
    Ok(())
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf().clean()
    } else {
        cwd.join(path).clean()
    }
}

/// Validated, immutable pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    file_name: String,
    source: PathBuf,
    dest: PathBuf,
    watch: bool,
    minify: bool,
    gzip: bool,
    sourcemap: bool,
    minify_level: MinifyLevel,
    concurrency: usize,
    debounce: Duration,
    log: bool,
    bundler: BundlerOptions,
}

impl Configuration {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Absolute source root.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Absolute destination root.
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    pub fn watch(&self) -> bool {
        self.watch
    }

    pub fn minify(&self) -> bool {
        self.minify
    }

    pub fn gzip(&self) -> bool {
        self.gzip
    }

    pub fn sourcemap(&self) -> bool {
        self.sourcemap
    }

    pub fn minify_level(&self) -> MinifyLevel {
        self.minify_level
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn log(&self) -> bool {
        self.log
    }

    pub fn bundler_options(&self) -> &BundlerOptions {
        &self.bundler
    }
}
