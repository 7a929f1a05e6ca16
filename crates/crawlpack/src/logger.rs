//! Build loggers.
//!
//! The pipeline hands every event to a [`BuildLogger`] before publishing it.
//! [`TracingLogger`] turns events into `tracing` records; install a
//! subscriber to see them. [`SilentLogger`] drops them.

use tracing::{debug, error, info, warn};

use crate::events::PipelineEvent;

/// Receives every pipeline event, synchronously, in emission order.
pub trait BuildLogger: Send + Sync {
    fn log(&self, event: &PipelineEvent);
}

/// Logs events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl BuildLogger for TracingLogger {
    fn log(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Found { entry } => {
                debug!(entry = %entry.display(), "found entry");
            }
            PipelineEvent::NoEntries { source, file_name } => {
                warn!(source = %source.display(), file_name = %file_name, "no files found");
            }
            PipelineEvent::Update { entry, changed } => {
                info!(entry = %entry.display(), changed = %changed.display(), "change detected, rebuilding");
            }
            PipelineEvent::Compile {
                entry,
                output,
                duration,
            } => {
                info!(
                    entry = %entry.display(),
                    output = %output.display(),
                    duration_ms = duration.as_millis() as u64,
                    "compiled"
                );
            }
            PipelineEvent::Minify { output, .. } => {
                debug!(output = %output.display(), "minified");
            }
            PipelineEvent::Gzip { output, .. } => {
                debug!(output = %output.display(), "gzipped");
            }
            PipelineEvent::Build { files } => {
                info!(files = files.len(), "finished initial build");
            }
            PipelineEvent::Error {
                entry,
                stage,
                error,
            } => {
                error!(entry = %entry.display(), stage = %stage, error = %error, "build failed");
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentLogger;

impl BuildLogger for SilentLogger {
    fn log(&self, _event: &PipelineEvent) {}
}
