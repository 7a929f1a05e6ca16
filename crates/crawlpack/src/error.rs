//! Error types for the pipeline.
//!
//! Per-entry failures ([`EntryError`]) never stop the pipeline; they surface
//! as one `error` event each and count toward the initial build tally.
//! Everything else is fatal and comes back from the pipeline task as a
//! [`PipelineError`].

use std::fmt;
use std::io;
use std::path::PathBuf;

use crawlpack_bundler::{BundleError, CompressError, MinifyError, SourceMapError};
use crawlpack_config::ConfigError;
use thiserror::Error;

/// Failure while enumerating entries.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("source path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// An input that does not live under the source root.
#[derive(Debug, Error)]
#[error("{} is not inside source root {}", path.display(), root.display())]
pub struct PathError {
    pub path: PathBuf,
    pub root: PathBuf,
}

/// The step of an entry build that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStage {
    /// Creating output directories or configuring the bundler.
    Prepare,
    Bundle,
    Emit,
    Minify,
    Gzip,
    /// The build task itself died.
    Internal,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Prepare => "prepare",
            Self::Bundle => "bundle",
            Self::Emit => "emit",
            Self::Minify => "minify",
            Self::Gzip => "gzip",
            Self::Internal => "internal",
        })
    }
}

/// Failure of one entry build.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("failed to create output directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The bundle's inline source map could not be decoded.
    #[error("invalid inline source map: {0}")]
    SourceMap(#[from] SourceMapError),

    #[error(transparent)]
    Minify(#[from] MinifyError),

    #[error(transparent)]
    Compress(#[from] CompressError),

    #[error("no bundler configured for {}", .0.display())]
    Unconfigured(PathBuf),

    #[error("build task panicked: {0}")]
    Panicked(String),
}

impl EntryError {
    pub fn stage(&self) -> BuildStage {
        match self {
            Self::CreateDir { .. } | Self::Unconfigured(_) => BuildStage::Prepare,
            // Option errors come from configuring the bundler, before any build.
            Self::Bundle(BundleError::InvalidOption { .. }) => BuildStage::Prepare,
            Self::Bundle(_) => BuildStage::Bundle,
            Self::Write { .. } | Self::SourceMap(_) => BuildStage::Emit,
            Self::Minify(_) => BuildStage::Minify,
            Self::Compress(_) => BuildStage::Gzip,
            Self::Panicked(_) => BuildStage::Internal,
        }
    }
}

/// Failure of the change notifier.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watch root not found: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),
}

/// Fatal pipeline failure.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("pipeline task failed: {0}")]
    Join(String),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
