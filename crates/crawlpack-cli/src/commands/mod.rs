//! Command implementations.
//!
//! - [`build`] - run the pipeline, once or in watch mode
//! - [`check`] - validate configuration and list entries

pub mod build;
pub mod check;

pub use build::execute as build_execute;
pub use check::execute as check_execute;
