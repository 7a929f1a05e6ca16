//! Post-processing of a finished bundle.
//!
//! A [`PostProcessor`] is an ordered list of [`Stage`]s run over one
//! [`BuildContext`]. The first failing stage stops the chain. Every stage
//! leaves its artifacts complete and synced on disk before returning, and
//! later stages read their input back from disk rather than from memory.

mod emit;
mod gzip;
mod minify;

pub use emit::EmitStage;
pub use gzip::GzipStage;
pub use minify::MinifyStage;

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crawlpack_bundler::{Compressor, Minifier};
use crawlpack_config::Configuration;

use crate::entry::Entry;
use crate::error::{BuildStage, EntryError};

/// One step of post-processing.
pub trait Stage: Send + Sync {
    fn kind(&self) -> BuildStage;
    fn run(&self, ctx: &mut BuildContext) -> Result<(), EntryError>;
}

/// State threaded through the stages of one entry build.
#[derive(Debug)]
pub struct BuildContext {
    entry: Arc<Entry>,
    bundle: Option<String>,
    artifacts: Vec<PathBuf>,
    completed: Vec<(BuildStage, PathBuf)>,
}

impl BuildContext {
    pub fn new(entry: Arc<Entry>, bundle: String) -> Self {
        Self {
            entry,
            bundle: Some(bundle),
            artifacts: Vec::new(),
            completed: Vec::new(),
        }
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Hand the in-memory bundle to the stage that writes it. Later calls
    /// return an empty string.
    pub fn take_bundle(&mut self) -> String {
        self.bundle.take().unwrap_or_default()
    }

    /// Remember a file written during this build.
    pub fn add_artifact(&mut self, path: PathBuf) {
        if !self.artifacts.contains(&path) {
            self.artifacts.push(path);
        }
    }

    pub fn has_artifact(&self, path: &Path) -> bool {
        self.artifacts.iter().any(|artifact| artifact == path)
    }

    /// Mark `stage` done, with `output` as its main artifact.
    pub fn complete(&mut self, stage: BuildStage, output: PathBuf) {
        self.add_artifact(output.clone());
        self.completed.push((stage, output));
    }

    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    pub fn completed(&self) -> &[(BuildStage, PathBuf)] {
        &self.completed
    }
}

/// Ordered chain of stages.
#[derive(Default)]
pub struct PostProcessor {
    stages: Vec<Box<dyn Stage>>,
}

impl PostProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Emit, then minify and gzip as configured.
    pub fn from_config(
        config: &Configuration,
        minifier: Arc<dyn Minifier>,
        compressor: Arc<dyn Compressor>,
    ) -> Self {
        let mut chain = Self::new().with_stage(EmitStage::new(config.sourcemap()));
        if config.minify() {
            chain = chain.with_stage(MinifyStage::new(minifier));
        }
        if config.gzip() {
            chain = chain.with_stage(GzipStage::new(compressor));
        }
        chain
    }

    pub fn stages(&self) -> Vec<BuildStage> {
        self.stages.iter().map(|stage| stage.kind()).collect()
    }

    pub fn run(&self, ctx: &mut BuildContext) -> Result<(), EntryError> {
        for stage in &self.stages {
            tracing::trace!(entry = %ctx.entry().input().display(), stage = %stage.kind(), "running stage");
            stage.run(ctx)?;
        }
        Ok(())
    }
}

/// Write `bytes` to `path` and sync it before returning.
pub(crate) fn write_durable(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// File name of the map that sits next to `entry`'s output.
pub(crate) fn map_file_name(entry: &Entry) -> String {
    format!("{}.map", entry.output_name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryId;
    use crawlpack_bundler::{GzipCompressor, OxcMinifier};
    use crawlpack_config::PipelineConfig;

    struct Failing;

    impl Stage for Failing {
        fn kind(&self) -> BuildStage {
            BuildStage::Minify
        }

        fn run(&self, _ctx: &mut BuildContext) -> Result<(), EntryError> {
            Err(EntryError::Minify(crawlpack_bundler::MinifyError::Parse(
                "nope".to_string(),
            )))
        }
    }

    struct Recording(BuildStage);

    impl Stage for Recording {
        fn kind(&self) -> BuildStage {
            self.0
        }

        fn run(&self, ctx: &mut BuildContext) -> Result<(), EntryError> {
            ctx.complete(self.0, PathBuf::from(self.0.to_string()));
            Ok(())
        }
    }

    fn context() -> BuildContext {
        let entry = Entry::new(EntryId::new(0), "/src/main.js", "/dist/main.js");
        BuildContext::new(Arc::new(entry), String::new())
    }

    #[test]
    fn test_chain_stops_at_first_failure() {
        let chain = PostProcessor::new()
            .with_stage(Recording(BuildStage::Emit))
            .with_stage(Failing)
            .with_stage(Recording(BuildStage::Gzip));

        let mut ctx = context();
        let err = chain.run(&mut ctx).unwrap_err();
        assert_eq!(err.stage(), BuildStage::Minify);
        let stages: Vec<_> = ctx.completed().iter().map(|(stage, _)| *stage).collect();
        assert_eq!(stages, vec![BuildStage::Emit]);
    }

    #[test]
    fn test_from_config_selects_stages() {
        let minifier: Arc<dyn Minifier> = Arc::new(OxcMinifier::default());
        let compressor: Arc<dyn Compressor> = Arc::new(GzipCompressor::default());

        let plain = PipelineConfig::new("main.js", "/src", "/dist")
            .resolve(Path::new("/"))
            .unwrap();
        let chain = PostProcessor::from_config(&plain, minifier.clone(), compressor.clone());
        assert_eq!(chain.stages(), vec![BuildStage::Emit]);

        let mut config = PipelineConfig::new("main.js", "/src", "/dist");
        config.compress = Some(true);
        let compressed = config.resolve(Path::new("/")).unwrap();
        let chain = PostProcessor::from_config(&compressed, minifier, compressor);
        assert_eq!(
            chain.stages(),
            vec![BuildStage::Emit, BuildStage::Minify, BuildStage::Gzip]
        );
    }
}
