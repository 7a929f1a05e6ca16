//! Error types for the bundler, minifier and compressor capabilities.

use std::path::PathBuf;

use thiserror::Error;

/// Failure while turning an entry and its dependency graph into one bundle.
#[derive(Debug, Error)]
pub enum BundleError {
    /// A module in the graph could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A module is not valid UTF-8.
    #[error("{} is not valid UTF-8", path.display())]
    InvalidUtf8 { path: PathBuf },

    /// A module failed to parse.
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// A `require()` specifier could not be resolved to a file.
    #[error("cannot find module '{specifier}' from {}", importer.display())]
    Unresolved { specifier: String, importer: PathBuf },

    /// Bundler options were rejected while configuring a bundler.
    #[error("invalid bundler option '{key}': {message}")]
    InvalidOption { key: String, message: String },

    /// The inline source map could not be produced.
    #[error("failed to generate source map: {0}")]
    SourceMap(String),
}

/// Failure while minifying an emitted bundle.
#[derive(Debug, Error)]
pub enum MinifyError {
    /// The emitted bundle did not parse.
    #[error("failed to parse bundle for minification: {0}")]
    Parse(String),

    /// The incoming source map could not be read or composed.
    #[error("source map error: {0}")]
    SourceMap(String),

    /// Reading the emitted artifacts or writing the minified ones failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure while compressing an artifact.
#[derive(Debug, Error)]
pub enum CompressError {
    /// Streaming the input through the encoder failed.
    #[error("compression failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure while handling source map data.
#[derive(Debug, Error)]
pub enum SourceMapError {
    /// The data URL did not carry base64 JSON.
    #[error("unsupported source map data URL: {0}")]
    UnsupportedDataUrl(String),

    /// The payload was not valid base64.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The payload was not a valid source map.
    #[error("invalid source map: {0}")]
    Invalid(#[from] ::sourcemap::Error),
}

impl From<SourceMapError> for MinifyError {
    fn from(err: SourceMapError) -> Self {
        Self::SourceMap(err.to_string())
    }
}
