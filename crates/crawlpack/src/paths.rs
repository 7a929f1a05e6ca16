//! Mapping inputs to outputs and preparing output directories.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::error::PathError;

/// Mirror `input`'s position under `source_root` into `dest_root`.
///
/// Pure: nothing on disk is consulted.
pub fn map_output(input: &Path, source_root: &Path, dest_root: &Path) -> Result<PathBuf, PathError> {
    let relative = input.strip_prefix(source_root).map_err(|_| PathError {
        path: input.to_path_buf(),
        root: source_root.to_path_buf(),
    })?;
    Ok(dest_root.join(relative))
}

/// Create every missing ancestor directory of `output`, outermost first.
///
/// Returns the directories that were created. A directory that appears
/// concurrently (another entry sharing the same parents) is not an error.
pub fn ensure_parents(output: &Path) -> io::Result<Vec<PathBuf>> {
    let Some(parent) = output.parent() else {
        return Ok(Vec::new());
    };

    let mut chain: Vec<&Path> = parent
        .ancestors()
        .filter(|dir| !dir.as_os_str().is_empty())
        .take_while(|dir| !dir.is_dir())
        .collect();
    chain.reverse();

    let mut created = Vec::with_capacity(chain.len());
    for dir in chain {
        match fs::create_dir(dir) {
            Ok(()) => {
                trace!(dir = %dir.display(), "created output directory");
                created.push(dir.to_path_buf());
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => {}
            Err(err) => return Err(err),
        }
    }
    Ok(created)
}

/// `path` with `suffix` appended to its file name, e.g. `main.js` to
/// `main.js.map`.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut out = path.as_os_str().to_owned();
    out.push(suffix);
    PathBuf::from(out)
}
