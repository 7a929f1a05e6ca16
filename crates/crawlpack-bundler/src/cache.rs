//! Per-entry module cache keyed by content hash.
//!
//! Parsing is the expensive part of a rebuild. The cache remembers, for every
//! module path, the BLAKE3 hash of the bytes last read and the `require()`
//! specifiers found in them. A lookup only hits when the current bytes hash
//! to the same value, so edits are picked up without timestamps.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

/// Parsed state of one module.
#[derive(Debug, Clone)]
pub struct CachedModule {
    /// Content hash of the bytes the entry was built from.
    pub hash: blake3::Hash,
    /// Module body as it is wrapped into the bundle.
    pub source: Arc<str>,
    /// `require()` specifiers in source order.
    pub requires: Arc<[String]>,
}

/// Hit and miss counters, mostly useful in tests and debug logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Module cache owned by a single bundler.
#[derive(Debug, Default)]
pub struct ModuleCache {
    modules: FxHashMap<PathBuf, CachedModule>,
    stats: CacheStats,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `path`, hitting only when its cached hash equals `hash`.
    pub fn get(&mut self, path: &Path, hash: &blake3::Hash) -> Option<CachedModule> {
        match self.modules.get(path) {
            Some(module) if module.hash == *hash => {
                self.stats.hits += 1;
                Some(module.clone())
            }
            _ => {
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, path: PathBuf, module: CachedModule) {
        self.modules.insert(path, module);
    }

    /// Drop every module that is no longer part of the graph.
    pub fn retain_live(&mut self, live: &FxHashSet<PathBuf>) {
        self.modules.retain(|path, _| live.contains(path));
    }

    /// Number of modules currently held.
    pub fn cached_modules(&self) -> usize {
        self.modules.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(text: &str) -> CachedModule {
        CachedModule {
            hash: blake3::hash(text.as_bytes()),
            source: Arc::from(text),
            requires: Arc::from(Vec::new()),
        }
    }

    #[test]
    fn test_hit_requires_matching_hash() {
        let mut cache = ModuleCache::new();
        let path = PathBuf::from("/src/a.js");
        cache.insert(path.clone(), module("a"));

        assert!(cache.get(&path, &blake3::hash(b"a")).is_some());
        assert!(cache.get(&path, &blake3::hash(b"b")).is_none());
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_retain_live_prunes_dead_modules() {
        let mut cache = ModuleCache::new();
        cache.insert(PathBuf::from("/src/a.js"), module("a"));
        cache.insert(PathBuf::from("/src/b.js"), module("b"));

        let live: FxHashSet<PathBuf> = [PathBuf::from("/src/a.js")].into_iter().collect();
        cache.retain_live(&live);

        assert_eq!(cache.cached_modules(), 1);
    }
}
