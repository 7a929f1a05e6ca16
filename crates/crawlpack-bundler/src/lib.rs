//! # crawlpack-bundler
//!
//! The pluggable capabilities behind the crawlpack pipeline: a [`Bundler`]
//! that turns an entry file into a single self-contained script, a
//! [`Minifier`] that shrinks an emitted bundle while keeping its source map
//! accurate, and a [`Compressor`] that streams an artifact into its gzip
//! sibling.
//!
//! Each capability is a trait with one default implementation:
//!
//! - [`CommonJsBundler`] resolves `require()` calls with Node semantics and
//!   emits a bundle carrying an inline base64 source map.
//! - [`OxcMinifier`] minifies with `oxc` and composes the resulting map onto
//!   the bundle map.
//! - [`GzipCompressor`] streams through `flate2`.
//!
//! ```no_run
//! use crawlpack_bundler::{BundlerFactory, BundlerOptions, CommonJsFactory, ModuleCache};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let factory = CommonJsFactory;
//! let mut bundler = factory.configure(
//!     "src/main.js".as_ref(),
//!     ModuleCache::new(),
//!     &BundlerOptions::new(),
//! )?;
//! let output = bundler.bundle()?;
//! println!("{} modules", output.modules.len());
//! # Ok(()) }
//! ```

pub mod bundler;
pub mod cache;
pub mod commonjs;
pub mod compress;
pub mod error;
pub mod minify;
pub mod source_map;

pub use bundler::{BundleOutput, Bundler, BundlerFactory, BundlerOptions};
pub use cache::{CacheStats, CachedModule, ModuleCache};
pub use commonjs::{CommonJsBundler, CommonJsFactory, CommonJsOptions};
pub use compress::{Compressor, GzipCompressor};
pub use error::{BundleError, CompressError, MinifyError, SourceMapError};
pub use minify::{MinifyLevel, MinifyOutput, Minifier, OxcMinifier};
