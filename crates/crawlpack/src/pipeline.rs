//! The pipeline controller.
//!
//! Drives one run from discovery to shutdown:
//!
//! 1. discover entries and publish `found` for each
//! 2. start watching, when configured, so no change is missed
//! 3. configure one bundler per entry and schedule the initial builds
//! 4. publish `build` once every initial build has finished
//! 5. in watch mode, route each file change to the entries that depend on
//!    it until shutdown, then let in-flight and queued builds finish

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crawlpack_bundler::{
    BundlerFactory, CommonJsFactory, Compressor, GzipCompressor, Minifier, OxcMinifier,
};
use crawlpack_config::Configuration;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapter::BundlerAdapter;
use crate::discovery::discover_entries;
use crate::entry::{Entry, EntryId};
use crate::error::{PipelineError, Result};
use crate::events::{Emitter, PipelineEvent};
use crate::logger::{BuildLogger, SilentLogger, TracingLogger};
use crate::paths::map_output;
use crate::postprocess::PostProcessor;
use crate::runner::{EntryRunner, SharedNotifier};
use crate::scheduler::{BuildTask, Scheduler};
use crate::watch::{ChangeNotifier, FileChange, NotifyWatcher};

/// Where a pipeline is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Starting,
    Discovering,
    /// Initial builds are running.
    Building { entries: usize },
    /// Initial build done; waiting for changes.
    Watching,
    /// Shutting down; in-flight and queued builds are finishing.
    Draining,
    Finished,
}

/// Configures a [`Pipeline`].
pub struct PipelineBuilder {
    config: Configuration,
    bundlers: Arc<dyn BundlerFactory>,
    minifier: Option<Arc<dyn Minifier>>,
    compressor: Arc<dyn Compressor>,
    logger: Option<Arc<dyn BuildLogger>>,
    notifier: Option<(Box<dyn ChangeNotifier>, mpsc::Receiver<FileChange>)>,
}

impl PipelineBuilder {
    pub fn bundler_factory(mut self, factory: impl BundlerFactory + 'static) -> Self {
        self.bundlers = Arc::new(factory);
        self
    }

    pub fn minifier(mut self, minifier: impl Minifier + 'static) -> Self {
        self.minifier = Some(Arc::new(minifier));
        self
    }

    pub fn compressor(mut self, compressor: impl Compressor + 'static) -> Self {
        self.compressor = Arc::new(compressor);
        self
    }

    /// Overrides the logger chosen from the `log` option.
    pub fn logger(mut self, logger: impl BuildLogger + 'static) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    /// Use `notifier` and its change stream instead of watching the source
    /// root with `notify`. Only consulted in watch mode.
    pub fn notifier(
        mut self,
        notifier: impl ChangeNotifier + 'static,
        changes: mpsc::Receiver<FileChange>,
    ) -> Self {
        self.notifier = Some((Box::new(notifier), changes));
        self
    }

    pub fn build(self) -> Pipeline {
        let minifier = self
            .minifier
            .unwrap_or_else(|| Arc::new(OxcMinifier::new(self.config.minify_level())));
        let logger = self.logger.unwrap_or_else(|| {
            if self.config.log() {
                Arc::new(TracingLogger)
            } else {
                Arc::new(SilentLogger)
            }
        });
        Pipeline {
            config: self.config,
            bundlers: self.bundlers,
            minifier,
            compressor: self.compressor,
            logger,
            notifier: self.notifier,
        }
    }
}

/// A configured, not yet started pipeline.
pub struct Pipeline {
    config: Configuration,
    bundlers: Arc<dyn BundlerFactory>,
    minifier: Arc<dyn Minifier>,
    compressor: Arc<dyn Compressor>,
    logger: Arc<dyn BuildLogger>,
    notifier: Option<(Box<dyn ChangeNotifier>, mpsc::Receiver<FileChange>)>,
}

impl Pipeline {
    /// Defaults: CommonJS bundler, oxc minifier, gzip compressor.
    pub fn builder(config: Configuration) -> PipelineBuilder {
        PipelineBuilder {
            config,
            bundlers: Arc::new(CommonJsFactory),
            minifier: None,
            compressor: Arc::new(GzipCompressor::default()),
            logger: None,
            notifier: None,
        }
    }

    pub fn new(config: Configuration) -> Self {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Start the pipeline on the current tokio runtime.
    pub fn spawn(self) -> PipelineHandle {
        let (emitter, events) = Emitter::new(Arc::clone(&self.logger));
        let (state_tx, state) = watch::channel(PipelineState::Starting);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(emitter, state_tx, shutdown_rx));
        PipelineHandle {
            events,
            state,
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    async fn run(
        self,
        emitter: Emitter,
        state: watch::Sender<PipelineState>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> Result<()> {
        let Self {
            config,
            bundlers,
            minifier,
            compressor,
            logger: _,
            notifier,
        } = self;

        state.send_replace(PipelineState::Discovering);
        let entries = discover(&config, &emitter)?;

        let (notifier, changes) = if config.watch() {
            let (notifier, changes) = match notifier {
                Some(pair) => pair,
                None => {
                    let (watcher, changes) =
                        NotifyWatcher::new(config.source().to_path_buf(), config.debounce())?;
                    (Box::new(watcher) as Box<dyn ChangeNotifier>, changes)
                }
            };
            let shared: SharedNotifier = Arc::new(Mutex::new(notifier));
            (Some(shared), Some(changes))
        } else {
            (None, None)
        };

        let mut adapters = BTreeMap::new();
        let mut unconfigured = Vec::new();
        for entry in &entries {
            match BundlerAdapter::new(Arc::clone(entry), bundlers.as_ref(), config.bundler_options()) {
                Ok(adapter) => {
                    adapters.insert(entry.id(), Arc::new(adapter));
                }
                Err(err) => unconfigured.push((Arc::clone(entry), err)),
            }
        }
        let adapters = Arc::new(adapters);

        let chain = Arc::new(PostProcessor::from_config(&config, minifier, compressor));
        let runner = EntryRunner::new(Arc::clone(&adapters), chain, emitter.clone(), notifier);
        let scheduler = Scheduler::new(Arc::new(runner), config.concurrency(), emitter.clone());

        state.send_replace(PipelineState::Building {
            entries: entries.len(),
        });
        scheduler.begin_initial(entries.iter().map(|e| e.input().to_path_buf()).collect());
        for (entry, err) in unconfigured {
            scheduler.report(&BuildTask::initial(entry), Duration::ZERO, Err(err));
        }
        for adapter in adapters.values() {
            scheduler.submit(BuildTask::initial(Arc::clone(adapter.entry())));
        }

        let mut initial_done = scheduler.initial_done();
        let Some(mut changes) = changes else {
            wait_initial(&mut initial_done).await;
            scheduler.wait_idle().await;
            state.send_replace(PipelineState::Finished);
            return Ok(());
        };

        let mut initial_pending = true;
        loop {
            tokio::select! {
                done = wait_initial(&mut initial_done), if initial_pending => {
                    initial_pending = false;
                    if done {
                        info!(root = %config.source().display(), "watching for changes");
                        state.send_replace(PipelineState::Watching);
                    }
                }

                change = changes.recv() => match change {
                    Some(change) => route_change(&change, &adapters, &scheduler, &emitter),
                    None => {
                        debug!("change stream closed");
                        break;
                    }
                },

                _ = &mut shutdown => {
                    debug!("shutdown requested");
                    break;
                }
            }
        }

        state.send_replace(PipelineState::Draining);
        scheduler.wait_idle().await;
        state.send_replace(PipelineState::Finished);
        Ok(())
    }
}

/// Enumerate entries and publish `found` for each, or `no-entries`.
fn discover(config: &Configuration, emitter: &Emitter) -> Result<Vec<Arc<Entry>>> {
    let source = config.source();
    let dest = config.dest();
    let mut inputs = discover_entries(source, config.file_name())?;

    // Outputs written inside the source tree must not become entries.
    if dest != source && dest.starts_with(source) {
        inputs.retain(|input| !input.starts_with(dest));
    }

    let mut entries = Vec::with_capacity(inputs.len());
    for input in inputs {
        let output = match map_output(&input, source, dest) {
            Ok(output) => output,
            Err(err) => {
                warn!(error = %err, "skipping entry");
                continue;
            }
        };
        emitter.emit(PipelineEvent::Found {
            entry: input.clone(),
        });
        entries.push(Arc::new(Entry::new(EntryId::new(entries.len()), input, output)));
    }

    if entries.is_empty() {
        emitter.emit(PipelineEvent::NoEntries {
            source: source.to_path_buf(),
            file_name: config.file_name().to_string(),
        });
    }
    Ok(entries)
}

/// Queue a rebuild of every entry that depends on the changed file.
fn route_change(
    change: &FileChange,
    adapters: &BTreeMap<EntryId, Arc<BundlerAdapter>>,
    scheduler: &Scheduler,
    emitter: &Emitter,
) {
    let changed = change.path();
    for adapter in adapters.values() {
        if !adapter.depends_on(changed) {
            continue;
        }
        let entry = adapter.entry();
        if scheduler.has_pending(entry.id()) {
            debug!(entry = %entry.input().display(), "rebuild already queued");
            continue;
        }
        emitter.emit(PipelineEvent::Update {
            entry: entry.input().to_path_buf(),
            changed: changed.to_path_buf(),
        });
        scheduler.submit(BuildTask::invalidated(Arc::clone(entry)));
    }
}

async fn wait_initial(done: &mut watch::Receiver<bool>) -> bool {
    done.wait_for(|done| *done).await.is_ok()
}

/// Handle to a running pipeline.
pub struct PipelineHandle {
    events: mpsc::UnboundedReceiver<PipelineEvent>,
    state: watch::Receiver<PipelineState>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl PipelineHandle {
    /// Next event, or `None` once the pipeline has finished and every event
    /// has been received.
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        self.events.recv().await
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<PipelineState> {
        self.state.clone()
    }

    /// Receive events up to and including `build`. Returns `None` if the
    /// pipeline stopped first.
    pub async fn initial_build(&mut self) -> Option<Vec<PipelineEvent>> {
        let mut seen = Vec::new();
        while let Some(event) = self.events.recv().await {
            let is_build = matches!(event, PipelineEvent::Build { .. });
            seen.push(event);
            if is_build {
                return Some(seen);
            }
        }
        None
    }

    /// Ask the pipeline to stop watching. Builds already running or queued
    /// still finish.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    /// Wait for the pipeline task to end.
    pub async fn join(self) -> Result<()> {
        let Self {
            task,
            shutdown: _shutdown,
            ..
        } = self;
        task.await
            .map_err(|err| PipelineError::Join(err.to_string()))?
    }

    /// Receive every remaining event, then wait for the pipeline to end.
    /// In watch mode this only returns after [`PipelineHandle::shutdown`].
    pub async fn finish(mut self) -> Result<Vec<PipelineEvent>> {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        self.join().await?;
        Ok(events)
    }
}
