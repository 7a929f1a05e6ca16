//! Pipeline lifecycle events.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::{BuildStage, EntryError};
use crate::logger::BuildLogger;

/// Events in the pipeline lifecycle, in the order a single entry sees them:
/// `found`, then per build `update` (rebuilds only), `minify`, `gzip` and
/// finally `compile` or `error`.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// An entry file was discovered.
    Found { entry: PathBuf },

    /// Discovery finished without finding a single entry.
    NoEntries { source: PathBuf, file_name: String },

    /// A file an entry depends on changed; a rebuild is queued.
    Update { entry: PathBuf, changed: PathBuf },

    /// An entry's output is complete.
    Compile {
        entry: PathBuf,
        output: PathBuf,
        duration: Duration,
    },

    /// The minified output was written.
    Minify { entry: PathBuf, output: PathBuf },

    /// The gzip sibling was written.
    Gzip { entry: PathBuf, output: PathBuf },

    /// Every entry found at startup has finished its first build, successfully
    /// or not. Fires exactly once.
    Build { files: Vec<PathBuf> },

    /// One build of one entry failed.
    Error {
        entry: PathBuf,
        stage: BuildStage,
        error: Arc<EntryError>,
    },
}

impl PipelineEvent {
    /// Short event name, as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Found { .. } => "found",
            Self::NoEntries { .. } => "no-entries",
            Self::Update { .. } => "update",
            Self::Compile { .. } => "compile",
            Self::Minify { .. } => "minify",
            Self::Gzip { .. } => "gzip",
            Self::Build { .. } => "build",
            Self::Error { .. } => "error",
        }
    }

    /// The entry this event is about, if any.
    pub fn entry(&self) -> Option<&Path> {
        match self {
            Self::Found { entry }
            | Self::Update { entry, .. }
            | Self::Compile { entry, .. }
            | Self::Minify { entry, .. }
            | Self::Gzip { entry, .. }
            | Self::Error { entry, .. } => Some(entry),
            Self::NoEntries { .. } | Self::Build { .. } => None,
        }
    }
}

/// Fans events out to the logger and the subscriber channel.
#[derive(Clone)]
pub(crate) struct Emitter {
    tx: mpsc::UnboundedSender<PipelineEvent>,
    logger: Arc<dyn BuildLogger>,
}

impl Emitter {
    pub(crate) fn new(logger: Arc<dyn BuildLogger>) -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, logger }, rx)
    }

    pub(crate) fn emit(&self, event: PipelineEvent) {
        self.logger.log(&event);
        // A dropped receiver only means nobody is listening.
        let _ = self.tx.send(event);
    }
}
