//! # crawlpack
//!
//! Incremental build pipeline for multi-entry JavaScript projects.
//!
//! Every file named `file_name` under the source root is an entry. Each entry
//! is bundled with everything it `require()`s and written to the mirrored
//! path under the destination root, together with its source map and,
//! optionally, minified and gzipped. In watch mode, a change to any file an
//! entry depends on rebuilds just that entry.
//!
//! ## Quick Start
//!
//! ```no_run
//! use crawlpack::{Pipeline, PipelineConfig, PipelineEvent};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::new("main.js", "src", "dist").resolve(&std::env::current_dir()?)?;
//!
//! let events = Pipeline::new(config).spawn().finish().await?;
//! for event in &events {
//!     if let PipelineEvent::Compile { output, .. } = event {
//!         println!("wrote {}", output.display());
//!     }
//! }
//! # Ok(()) }
//! ```
//!
//! ## Events
//!
//! Progress is published as [`PipelineEvent`]s, both to the configured
//! [`BuildLogger`] and through [`PipelineHandle::next_event`]. Per-entry
//! failures arrive as `Error` events and never stop the pipeline; only
//! discovery and watcher setup failures end it, as a [`PipelineError`].

mod adapter;
mod discovery;
mod entry;
mod error;
mod events;
mod logger;
mod paths;
mod pipeline;
pub mod postprocess;
mod runner;
mod scheduler;
mod watch;

pub use adapter::BundlerAdapter;
pub use discovery::discover_entries;
pub use entry::{Entry, EntryId};
pub use error::{
    BuildStage, DiscoveryError, EntryError, PathError, PipelineError, Result, WatchError,
};
pub use events::PipelineEvent;
pub use logger::{BuildLogger, SilentLogger, TracingLogger};
pub use paths::{ensure_parents, map_output, with_suffix};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineHandle, PipelineState};
pub use watch::{ChangeNotifier, FileChange, NotifyWatcher};

pub use crawlpack_bundler as bundler;
pub use crawlpack_config::{ConfigError, ConfigLoader, Configuration, PipelineConfig};
