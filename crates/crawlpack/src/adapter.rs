//! Wraps one configured bundler with the bookkeeping the pipeline needs:
//! running builds off the async runtime and remembering which files the
//! last build depended on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crawlpack_bundler::{BundleOutput, Bundler, BundlerFactory, BundlerOptions, ModuleCache};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashSet;

use crate::entry::Entry;
use crate::error::EntryError;

pub struct BundlerAdapter {
    entry: Arc<Entry>,
    bundler: Arc<Mutex<Box<dyn Bundler>>>,
    watched: RwLock<FxHashSet<PathBuf>>,
}

impl BundlerAdapter {
    /// Configure a bundler for `entry` with a fresh module cache.
    pub fn new(
        entry: Arc<Entry>,
        factory: &dyn BundlerFactory,
        options: &BundlerOptions,
    ) -> Result<Self, EntryError> {
        let bundler = factory.configure(entry.input(), ModuleCache::new(), options)?;
        let watched = std::iter::once(entry.input().to_path_buf()).collect();
        Ok(Self {
            entry,
            bundler: Arc::new(Mutex::new(bundler)),
            watched: RwLock::new(watched),
        })
    }

    pub fn entry(&self) -> &Arc<Entry> {
        &self.entry
    }

    /// Run the bundler on the blocking pool.
    ///
    /// The watch set is refreshed whether or not the build succeeds, so
    /// fixing a broken dependency triggers the next rebuild.
    pub async fn bundle(&self) -> Result<BundleOutput, EntryError> {
        let bundler = Arc::clone(&self.bundler);
        let (result, files) = tokio::task::spawn_blocking(move || {
            let mut bundler = bundler.lock();
            let result = bundler.bundle();
            (result, bundler.watch_files())
        })
        .await
        .map_err(|err| EntryError::Panicked(err.to_string()))?;

        self.update_watched(files);
        Ok(result?)
    }

    /// Whether a change to `path` invalidates this entry.
    ///
    /// `path` is compared exactly against the paths the bundler read, which
    /// live under the configured source root. [`NotifyWatcher`] reports
    /// changes under that same spelling.
    ///
    /// [`NotifyWatcher`]: crate::watch::NotifyWatcher
    pub fn depends_on(&self, path: &Path) -> bool {
        self.watched.read().contains(path)
    }

    pub fn watched_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self.watched.read().iter().cloned().collect();
        files.sort();
        files
    }

    fn update_watched(&self, files: Vec<PathBuf>) {
        let mut watched = self.watched.write();
        *watched = files.into_iter().collect();
        // An unreadable entry reports nothing; keep it so its reappearance
        // triggers a rebuild.
        watched.insert(self.entry.input().to_path_buf());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryId;
    use crawlpack_bundler::CommonJsFactory;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_watch_set_follows_the_graph() {
        let tmp = TempDir::new().unwrap();
        let main = tmp.path().join("main.js");
        let x = tmp.path().join("x.js");
        let y = tmp.path().join("y.js");
        fs::write(&main, "module.exports = require('./x');\n").unwrap();
        fs::write(&x, "module.exports = 1;\n").unwrap();
        fs::write(&y, "module.exports = 2;\n").unwrap();

        let entry = Arc::new(Entry::new(EntryId::new(0), &main, tmp.path().join("out/main.js")));
        let adapter = BundlerAdapter::new(entry, &CommonJsFactory, &BundlerOptions::new()).unwrap();
        assert!(adapter.depends_on(&main));
        assert!(!adapter.depends_on(&x));

        adapter.bundle().await.unwrap();
        assert!(adapter.depends_on(&x));
        assert!(!adapter.depends_on(&y));

        fs::write(&main, "module.exports = require('./y');\n").unwrap();
        adapter.bundle().await.unwrap();
        assert!(adapter.depends_on(&y));
        assert!(!adapter.depends_on(&x));
    }

    #[tokio::test]
    async fn test_failed_build_keeps_entry_watched() {
        let tmp = TempDir::new().unwrap();
        let main = tmp.path().join("main.js");
        fs::write(&main, "module.exports = require('./missing');\n").unwrap();

        let entry = Arc::new(Entry::new(EntryId::new(0), &main, tmp.path().join("out/main.js")));
        let adapter = BundlerAdapter::new(entry, &CommonJsFactory, &BundlerOptions::new()).unwrap();

        let err = adapter.bundle().await.unwrap_err();
        assert!(matches!(err, EntryError::Bundle(_)));
        assert_eq!(adapter.watched_files(), vec![main.clone()]);

        fs::remove_file(&main).unwrap();
        assert!(adapter.bundle().await.is_err());
        assert_eq!(adapter.watched_files(), vec![main]);
    }
}
