use std::fmt;
use std::path::{Path, PathBuf};

use crate::paths::with_suffix;

/// Stable identity of an entry for the lifetime of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(usize);

impl EntryId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A discovered entry file and where its bundle goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    id: EntryId,
    input: PathBuf,
    output: PathBuf,
}

impl Entry {
    pub fn new(id: EntryId, input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            id,
            input: input.into(),
            output: output.into(),
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Sibling source map of the output.
    pub fn map_path(&self) -> PathBuf {
        with_suffix(&self.output, ".map")
    }

    /// File name of the output, as referenced from the output itself.
    pub fn output_name(&self) -> String {
        self.output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
