//! The bundler capability.
//!
//! A [`BundlerFactory`] configures one [`Bundler`] per entry. The bundler is
//! long-lived: it keeps its [`ModuleCache`] between calls so that a rebuild
//! after a change only re-parses the modules whose content changed.

use std::path::{Path, PathBuf};

use crate::cache::ModuleCache;
use crate::error::BundleError;

/// Pass-through options handed to the bundler factory.
pub type BundlerOptions = serde_json::Map<String, serde_json::Value>;

/// Result of one successful bundle.
#[derive(Debug, Clone)]
pub struct BundleOutput {
    /// Bundled code, ending with an inline source map comment when the
    /// bundler produced one.
    pub code: String,
    /// Every module that ended up in the bundle, entry first.
    pub modules: Vec<PathBuf>,
}

/// Incremental bundler bound to one entry file.
pub trait Bundler: Send {
    /// The entry this bundler was configured for.
    fn entry(&self) -> &Path;

    /// Produce a fresh bundle of the entry and everything it reaches.
    fn bundle(&mut self) -> Result<BundleOutput, BundleError>;

    /// Files the most recent [`Bundler::bundle`] call read, including the
    /// ones read before a failure. A change to any of them invalidates the
    /// bundle.
    fn watch_files(&self) -> Vec<PathBuf>;
}

/// Creates bundlers for entries.
pub trait BundlerFactory: Send + Sync {
    /// Configure a bundler for `entry`, seeded with `cache`.
    fn configure(
        &self,
        entry: &Path,
        cache: ModuleCache,
        options: &BundlerOptions,
    ) -> Result<Box<dyn Bundler>, BundleError>;
}
