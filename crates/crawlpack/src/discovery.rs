//! Entry discovery.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::DiscoveryError;

/// Find every regular file named exactly `file_name` under `root`.
///
/// Symlinks are neither followed nor matched. Results are ordered by path
/// so entry ids are stable across runs. Unreadable subdirectories are
/// skipped with a warning; an unreadable or missing root is an error.
pub fn discover_entries(root: &Path, file_name: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let meta = std::fs::metadata(root).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => DiscoveryError::SourceNotFound(root.to_path_buf()),
        _ => DiscoveryError::Unreadable {
            path: root.to_path_buf(),
            source,
        },
    })?;
    if !meta.is_dir() {
        return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
    }

    let target = OsStr::new(file_name);
    let mut found = Vec::new();

    for item in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let item = match item {
            Ok(item) => item,
            Err(err) if err.depth() == 0 => {
                let path = err.path().unwrap_or(root).to_path_buf();
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::other("filesystem loop"));
                return Err(DiscoveryError::Unreadable { path, source });
            }
            Err(err) => {
                warn!(error = %err, "skipping unreadable path during discovery");
                continue;
            }
        };

        if item.file_type().is_file() && item.file_name() == target {
            found.push(item.into_path());
        }
    }

    found.sort();
    debug!(root = %root.display(), count = found.len(), "discovered entries");
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "").unwrap();
        path
    }

    #[test]
    fn test_finds_matching_basenames_at_any_depth() {
        let tmp = TempDir::new().unwrap();
        let a = touch(tmp.path(), "main.js");
        let b = touch(tmp.path(), "nested/deeper/main.js");
        touch(tmp.path(), "nested/x.js");
        touch(tmp.path(), "nested/main.js.map");
        touch(tmp.path(), "other/notmain.js");

        let found = discover_entries(tmp.path(), "main.js").unwrap();
        assert_eq!(found, vec![a, b]);
    }

    #[test]
    fn test_directory_with_entry_name_is_not_an_entry() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("main.js")).unwrap();
        let inner = touch(tmp.path(), "main.js/main.js");

        let found = discover_entries(tmp.path(), "main.js").unwrap();
        assert_eq!(found, vec![inner]);
    }

    #[test]
    fn test_empty_tree() {
        let tmp = TempDir::new().unwrap();
        assert!(discover_entries(tmp.path(), "main.js").unwrap().is_empty());
    }

    #[test]
    fn test_missing_root() {
        let tmp = TempDir::new().unwrap();
        let err = discover_entries(&tmp.path().join("missing"), "main.js").unwrap_err();
        assert!(matches!(err, DiscoveryError::SourceNotFound(_)));
    }

    #[test]
    fn test_root_is_a_file() {
        let tmp = TempDir::new().unwrap();
        let file = touch(tmp.path(), "main.js");
        let err = discover_entries(&file, "main.js").unwrap_err();
        assert!(matches!(err, DiscoveryError::NotADirectory(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_matched() {
        let tmp = TempDir::new().unwrap();
        let real = touch(tmp.path(), "real/main.js");
        fs::create_dir_all(tmp.path().join("linked")).unwrap();
        std::os::unix::fs::symlink(&real, tmp.path().join("linked/main.js")).unwrap();

        let found = discover_entries(tmp.path(), "main.js").unwrap();
        assert_eq!(found, vec![real]);
    }
}
