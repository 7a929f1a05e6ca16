//! Default bundler: CommonJS modules resolved with Node semantics.

mod emit;
mod requires;
mod resolve;

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::bundler::{BundleOutput, Bundler, BundlerFactory, BundlerOptions};
use crate::cache::{CachedModule, ModuleCache};
use crate::error::BundleError;
use emit::ModuleRecord;
use resolve::Resolver;

/// Options read from the pass-through bundler table.
///
/// | key             | type       | default             |
/// |-----------------|------------|---------------------|
/// | `extensions`    | `[string]` | `[".js", ".json"]`  |
/// | `ignoreMissing` | `bool`     | `false`             |
///
/// Unknown keys are ignored so one configuration can serve several bundlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonJsOptions {
    pub extensions: Vec<String>,
    pub ignore_missing: bool,
}

impl Default for CommonJsOptions {
    fn default() -> Self {
        Self {
            extensions: vec![".js".to_string(), ".json".to_string()],
            ignore_missing: false,
        }
    }
}

impl CommonJsOptions {
    pub fn from_options(options: &BundlerOptions) -> Result<Self, BundleError> {
        let mut out = Self::default();

        if let Some(value) = options.get("extensions") {
            let list = value.as_array().ok_or_else(|| invalid("extensions", "expected an array"))?;
            out.extensions = list
                .iter()
                .map(|ext| {
                    let ext = ext
                        .as_str()
                        .ok_or_else(|| invalid("extensions", "expected strings"))?;
                    Ok(if ext.starts_with('.') {
                        ext.to_string()
                    } else {
                        format!(".{ext}")
                    })
                })
                .collect::<Result<_, BundleError>>()?;
        }

        if let Some(value) = options.get("ignoreMissing") {
            out.ignore_missing = value
                .as_bool()
                .ok_or_else(|| invalid("ignoreMissing", "expected a boolean"))?;
        }

        Ok(out)
    }
}

fn invalid(key: &str, message: &str) -> BundleError {
    BundleError::InvalidOption {
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// Factory for [`CommonJsBundler`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonJsFactory;

impl BundlerFactory for CommonJsFactory {
    fn configure(
        &self,
        entry: &Path,
        cache: ModuleCache,
        options: &BundlerOptions,
    ) -> Result<Box<dyn Bundler>, BundleError> {
        let options = CommonJsOptions::from_options(options)?;
        Ok(Box::new(CommonJsBundler::new(entry, cache, options)))
    }
}

/// Bundles an entry and everything it `require()`s into one script.
#[derive(Debug)]
pub struct CommonJsBundler {
    entry: PathBuf,
    file_name: String,
    resolver: Resolver,
    ignore_missing: bool,
    cache: ModuleCache,
    touched: Vec<PathBuf>,
}

impl CommonJsBundler {
    pub fn new(entry: &Path, cache: ModuleCache, options: CommonJsOptions) -> Self {
        let file_name = entry
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            entry: entry.to_path_buf(),
            file_name,
            resolver: Resolver::new(options.extensions),
            ignore_missing: options.ignore_missing,
            cache,
            touched: Vec::new(),
        }
    }

    fn load(&mut self, path: &Path) -> Result<CachedModule, BundleError> {
        let bytes = fs::read(path).map_err(|source| BundleError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.touched.push(path.to_path_buf());

        let hash = blake3::hash(&bytes);
        if let Some(module) = self.cache.get(path, &hash) {
            return Ok(module);
        }

        let text = String::from_utf8(bytes).map_err(|_| BundleError::InvalidUtf8 {
            path: path.to_path_buf(),
        })?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

        let (source, requires) = if is_json(path) {
            serde_json::from_str::<serde_json::Value>(text).map_err(|err| BundleError::Parse {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
            (format!("module.exports = {}", text.trim_end()), Vec::new())
        } else {
            let requires = requires::collect_requires(path, text)?;
            (strip_hashbang(text), requires)
        };

        let module = CachedModule {
            hash,
            source: Arc::from(source),
            requires: Arc::from(requires),
        };
        self.cache.insert(path.to_path_buf(), module.clone());
        Ok(module)
    }
}

impl Bundler for CommonJsBundler {
    fn entry(&self) -> &Path {
        &self.entry
    }

    fn bundle(&mut self) -> Result<BundleOutput, BundleError> {
        self.touched.clear();

        let mut order: Vec<PathBuf> = vec![self.entry.clone()];
        let mut ids: FxHashMap<PathBuf, usize> = FxHashMap::default();
        ids.insert(self.entry.clone(), 0);
        let mut records = Vec::new();
        let mut next = VecDeque::from([0usize]);

        while let Some(id) = next.pop_front() {
            let path = order[id].clone();
            let module = self.load(&path)?;

            let mut deps = Vec::with_capacity(module.requires.len());
            for specifier in module.requires.iter() {
                if deps.iter().any(|(seen, _)| seen == specifier) {
                    continue;
                }
                let resolved = match self.resolver.resolve(specifier, &path) {
                    Some(resolved) => resolved,
                    None if self.ignore_missing => {
                        debug!(specifier = %specifier, importer = %path.display(), "ignoring missing module");
                        deps.push((specifier.clone(), None));
                        continue;
                    }
                    None => {
                        return Err(BundleError::Unresolved {
                            specifier: specifier.clone(),
                            importer: path,
                        });
                    }
                };
                let dep_id = match ids.get(&resolved) {
                    Some(&dep_id) => dep_id,
                    None => {
                        let dep_id = order.len();
                        ids.insert(resolved.clone(), dep_id);
                        order.push(resolved);
                        next.push_back(dep_id);
                        dep_id
                    }
                };
                deps.push((specifier.clone(), Some(dep_id)));
            }

            records.push(ModuleRecord {
                path,
                source: module.source,
                deps,
            });
        }

        let live: FxHashSet<PathBuf> = order.iter().cloned().collect();
        self.cache.retain_live(&live);
        let stats = self.cache.stats();
        debug!(
            entry = %self.entry.display(),
            modules = records.len(),
            cached = self.cache.cached_modules(),
            cache_hits = stats.hits,
            cache_misses = stats.misses,
            "bundled entry"
        );

        let code = emit::render(&records, &self.file_name)?;
        Ok(BundleOutput {
            code,
            modules: order,
        })
    }

    fn watch_files(&self) -> Vec<PathBuf> {
        self.touched.clone()
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Turn a leading `#!` line into a comment so the body stays valid inside
/// the module wrapper without shifting lines.
fn strip_hashbang(text: &str) -> String {
    match text.strip_prefix("#!") {
        Some(rest) => format!("//{rest}"),
        None => text.to_string(),
    }
}
