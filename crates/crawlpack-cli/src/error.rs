//! CLI errors.
//!
//! Library errors are wrapped transparently so their messages reach the
//! terminal unchanged; miette adds a code and, where it helps, a hint.

use std::io;

use crawlpack::{ConfigError, PipelineError};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(
        code(crawlpack::config),
        help(
            "options come from --file-name/--source/--dest, a crawlpack.toml or crawlpack.json \
             in the working directory, or CRAWLPACK_* environment variables"
        )
    )]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(code(crawlpack::pipeline))]
    Pipeline(#[from] PipelineError),

    /// Non-watch builds where at least one entry failed.
    #[error("{failed} of {total} entries failed to build")]
    #[diagnostic(code(crawlpack::build_failed), help("the errors are listed above"))]
    BuildFailed { failed: usize, total: usize },

    #[error("cannot determine the working directory")]
    #[diagnostic(code(crawlpack::cwd))]
    WorkingDirectory(#[source] io::Error),

    #[error("failed to render configuration")]
    #[diagnostic(code(crawlpack::render))]
    Render(#[from] toml::ser::Error),
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;
