//! Command-line interface for the crawlpack build pipeline.
//!
//! - [`cli`] - argument definitions
//! - [`commands`] - `build` and `check`
//! - [`error`] - [`CliError`], rendered through miette
//! - [`logger`] - tracing subscriber setup
//! - [`ui`] - status lines and the build summary

pub mod cli;
pub mod commands;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, Result};
