//! One entry build: prepare directories, bundle, post-process.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::warn;

use crate::adapter::BundlerAdapter;
use crate::entry::EntryId;
use crate::error::{BuildStage, EntryError};
use crate::events::{Emitter, PipelineEvent};
use crate::paths::ensure_parents;
use crate::postprocess::{BuildContext, PostProcessor};
use crate::scheduler::{BuildTask, TaskRunner};
use crate::watch::ChangeNotifier;

pub(crate) type SharedNotifier = Arc<Mutex<Box<dyn ChangeNotifier>>>;

pub(crate) struct EntryRunner {
    adapters: Arc<BTreeMap<EntryId, Arc<BundlerAdapter>>>,
    chain: Arc<PostProcessor>,
    emitter: Emitter,
    notifier: Option<SharedNotifier>,
}

impl EntryRunner {
    pub fn new(
        adapters: Arc<BTreeMap<EntryId, Arc<BundlerAdapter>>>,
        chain: Arc<PostProcessor>,
        emitter: Emitter,
        notifier: Option<SharedNotifier>,
    ) -> Self {
        Self {
            adapters,
            chain,
            emitter,
            notifier,
        }
    }

    fn watch_dependencies(&self, adapter: &BundlerAdapter) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let mut notifier = notifier.lock();
        for file in adapter.watched_files() {
            if let Err(err) = notifier.watch(&file) {
                warn!(path = %file.display(), error = %err, "failed to watch dependency");
            }
        }
    }
}

#[async_trait]
impl TaskRunner for EntryRunner {
    async fn run(&self, task: &BuildTask) -> Result<(), EntryError> {
        let entry = &task.entry;
        let adapter = self
            .adapters
            .get(&entry.id())
            .cloned()
            .ok_or_else(|| EntryError::Unconfigured(entry.input().to_path_buf()))?;

        let output = entry.output();
        ensure_parents(output).map_err(|source| EntryError::CreateDir {
            path: output.parent().unwrap_or(output).to_path_buf(),
            source,
        })?;

        let bundle = adapter.bundle().await;
        self.watch_dependencies(&adapter);
        let bundle = bundle?;

        let chain = Arc::clone(&self.chain);
        let ctx_entry = Arc::clone(entry);
        let (ctx, result) = tokio::task::spawn_blocking(move || {
            let mut ctx = BuildContext::new(ctx_entry, bundle.code);
            let result = chain.run(&mut ctx);
            (ctx, result)
        })
        .await
        .map_err(|err| EntryError::Panicked(err.to_string()))?;

        for (stage, path) in ctx.completed() {
            let event = match stage {
                BuildStage::Minify => PipelineEvent::Minify {
                    entry: entry.input().to_path_buf(),
                    output: path.clone(),
                },
                BuildStage::Gzip => PipelineEvent::Gzip {
                    entry: entry.input().to_path_buf(),
                    output: path.clone(),
                },
                _ => continue,
            };
            self.emitter.emit(event);
        }

        result
    }
}
