//! # crawlpack-config
//!
//! Configuration for the crawlpack pipeline.
//!
//! [`PipelineConfig`] is the raw, serde-friendly shape that comes out of
//! configuration files, environment variables and command-line flags.
//! Validation happens once, in [`PipelineConfig::resolve`], and yields an
//! immutable [`Configuration`] with every default applied and every path
//! absolute. Resolution never touches the filesystem.
//!
//! [`ConfigLoader`] layers the sources with `figment`, later layers winning:
//!
//! 1. `crawlpack.toml` / `crawlpack.json` (or an explicit file)
//! 2. `CRAWLPACK_*` environment variables
//! 3. explicit overrides, usually from the command line
//!
//! Defaults are applied by [`PipelineConfig::resolve`], after merging.

mod config;
mod error;
mod loader;

pub use config::{
    Configuration, DEFAULT_CONCURRENCY, DEFAULT_DEBOUNCE_MS, PipelineConfig,
};
pub use crawlpack_bundler::{BundlerOptions, MinifyLevel};
pub use error::{ConfigError, Result};
pub use loader::{CONFIG_FILE_NAMES, ConfigLoader, ENV_PREFIX};
