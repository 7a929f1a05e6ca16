//! Command-line arguments.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use crawlpack::bundler::MinifyLevel;
use crawlpack::{ConfigLoader, Configuration, PipelineConfig};

use crate::error::{CliError, Result};

/// Bundle every entry file under a source tree, then keep them fresh
#[derive(Parser, Debug)]
#[command(name = "crawlpack", version, about)]
pub struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build every entry, optionally watching for changes
    Build(BuildArgs),

    /// Validate the configuration and list the entries a build would use
    Check(CheckArgs),
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Rebuild entries when the files they depend on change
    #[arg(short, long)]
    pub watch: bool,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// Options shared by every command. Anything given here overrides the
/// config file and the environment.
#[derive(Args, Debug, Default)]
pub struct PipelineArgs {
    /// Config file [default: crawlpack.toml or crawlpack.json in the working directory]
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory relative paths are resolved against [default: current directory]
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Directory searched for entries
    #[arg(short, long, value_name = "DIR")]
    pub source: Option<PathBuf>,

    /// Directory the outputs are written to
    #[arg(short, long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Entry file name, e.g. main.js
    #[arg(short = 'f', long, value_name = "NAME")]
    pub file_name: Option<String>,

    /// Minify and gzip every output
    #[arg(short, long)]
    pub compress: bool,

    /// Minify every output
    #[arg(long)]
    pub minify: bool,

    /// Write a gzipped copy next to every output
    #[arg(long)]
    pub gzip: bool,

    /// Keep source maps inline instead of writing .map files
    #[arg(long)]
    pub no_sourcemap: bool,

    /// whitespace, syntax or identifiers
    #[arg(long, value_name = "LEVEL", value_parser = MinifyLevel::parse)]
    pub minify_level: Option<MinifyLevel>,

    /// Number of entries built at the same time
    #[arg(short = 'j', long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Quiet period before file changes trigger a rebuild
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Ignore CRAWLPACK_* environment variables
    #[arg(long)]
    pub no_env: bool,
}

impl PipelineArgs {
    /// Only flags that were actually given; unset switches stay `None` so
    /// they do not mask the config file.
    pub fn overrides(&self) -> PipelineConfig {
        PipelineConfig {
            file_name: self.file_name.clone(),
            source: self.source.clone(),
            dest: self.dest.clone(),
            compress: self.compress.then_some(true),
            minify: self.minify.then_some(true),
            gzip: self.gzip.then_some(true),
            sourcemap: self.no_sourcemap.then_some(false),
            minify_level: self.minify_level,
            concurrency: self.concurrency,
            debounce_ms: self.debounce_ms,
            ..PipelineConfig::default()
        }
    }

    pub fn loader(&self) -> Result<ConfigLoader> {
        let cwd = match &self.cwd {
            Some(cwd) if cwd.is_absolute() => cwd.clone(),
            Some(cwd) => current_dir()?.join(cwd),
            None => current_dir()?,
        };
        let mut loader = ConfigLoader::new(cwd);
        if let Some(file) = &self.config {
            loader = loader.file(file);
        }
        if self.no_env {
            loader = loader.without_env();
        }
        Ok(loader)
    }

    /// Load every layer and validate, with `extra` applied on top of the
    /// command-line flags.
    pub fn resolve_with(&self, extra: impl FnOnce(&mut PipelineConfig)) -> Result<Configuration> {
        let mut overrides = self.overrides();
        extra(&mut overrides);
        Ok(self.loader()?.overrides(overrides).resolve()?)
    }
}

fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().map_err(CliError::WorkingDirectory)
}

/// `path` relative to `base` when it is inside it.
pub(crate) fn relative<'a>(path: &'a Path, base: &Path) -> &'a Path {
    path.strip_prefix(base).unwrap_or(path)
}
