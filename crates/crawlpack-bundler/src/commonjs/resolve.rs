//! Node-style module resolution for `require()` specifiers.

use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use serde::Deserialize;

#[derive(Deserialize)]
struct PackageManifest {
    main: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct Resolver {
    extensions: Vec<String>,
}

impl Resolver {
    pub(crate) fn new(extensions: Vec<String>) -> Self {
        Self { extensions }
    }

    /// Resolve `specifier` as required from `importer`.
    pub(crate) fn resolve(&self, specifier: &str, importer: &Path) -> Option<PathBuf> {
        let base = importer.parent()?;

        if is_path_like(specifier) {
            let candidate = base.join(specifier).clean();
            return self
                .resolve_file(&candidate)
                .or_else(|| self.resolve_directory(&candidate));
        }

        for dir in base.ancestors() {
            if dir.file_name().is_some_and(|name| name == "node_modules") {
                continue;
            }
            let candidate = dir.join("node_modules").join(specifier).clean();
            if let Some(found) = self
                .resolve_file(&candidate)
                .or_else(|| self.resolve_directory(&candidate))
            {
                return Some(found);
            }
        }
        None
    }

    fn resolve_file(&self, path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        self.extensions.iter().find_map(|ext| {
            let mut candidate = path.as_os_str().to_owned();
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            candidate.is_file().then_some(candidate)
        })
    }

    fn resolve_directory(&self, dir: &Path) -> Option<PathBuf> {
        if !dir.is_dir() {
            return None;
        }

        if let Some(main) = read_main(&dir.join("package.json")) {
            let target = dir.join(main).clean();
            if let Some(found) = self.resolve_file(&target).or_else(|| {
                self.resolve_file(&target.join("index"))
            }) {
                return Some(found);
            }
        }

        self.resolve_file(&dir.join("index"))
    }
}

fn is_path_like(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
}

fn read_main(manifest: &Path) -> Option<String> {
    let text = fs::read_to_string(manifest).ok()?;
    match serde_json::from_str::<PackageManifest>(&text) {
        Ok(pkg) => pkg.main.filter(|main| !main.is_empty()),
        Err(err) => {
            tracing::debug!(path = %manifest.display(), error = %err, "ignoring malformed package.json");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resolver() -> Resolver {
        Resolver::new(vec![".js".to_string(), ".json".to_string()])
    }

    fn touch(root: &Path, rel: &str, contents: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_relative_with_and_without_extension() {
        let tmp = TempDir::new().unwrap();
        let main = touch(tmp.path(), "main.js", "");
        let x = touch(tmp.path(), "x.js", "");
        let data = touch(tmp.path(), "lib/data.json", "{}");

        let r = resolver();
        assert_eq!(r.resolve("./x", &main), Some(x.clone()));
        assert_eq!(r.resolve("./x.js", &main), Some(x));
        assert_eq!(r.resolve("./lib/data", &main), Some(data));
        assert_eq!(r.resolve("./missing", &main), None);
    }

    #[test]
    fn test_directory_index_and_parent_segments() {
        let tmp = TempDir::new().unwrap();
        let nested = touch(tmp.path(), "nested/main.js", "");
        let index = touch(tmp.path(), "util/index.js", "");

        assert_eq!(resolver().resolve("../util", &nested), Some(index));
    }

    #[test]
    fn test_node_modules_with_package_main() {
        let tmp = TempDir::new().unwrap();
        let main = touch(tmp.path(), "src/deep/main.js", "");
        touch(
            tmp.path(),
            "node_modules/pkg/package.json",
            r#"{"main": "lib/entry"}"#,
        );
        let entry = touch(tmp.path(), "node_modules/pkg/lib/entry.js", "");
        let sub = touch(tmp.path(), "node_modules/pkg/sub.js", "");

        let r = resolver();
        assert_eq!(r.resolve("pkg", &main), Some(entry));
        assert_eq!(r.resolve("pkg/sub", &main), Some(sub));
        assert_eq!(r.resolve("nope", &main), None);
    }
}
