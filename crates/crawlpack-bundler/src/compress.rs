//! The compressor capability.

use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::error::CompressError;

/// Streams an artifact into its compressed sibling.
pub trait Compressor: Send + Sync {
    /// Suffix appended to the artifact path, including the dot.
    fn suffix(&self) -> &str;

    /// Compress everything from `input` into `output`, returning the number
    /// of input bytes consumed.
    fn compress(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<u64, CompressError>;
}

/// Gzip through `flate2`.
#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    level: Compression,
}

impl GzipCompressor {
    /// `level` ranges from 0 (store) to 9 (best).
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl Compressor for GzipCompressor {
    fn suffix(&self) -> &str {
        ".gz"
    }

    fn compress(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<u64, CompressError> {
        let mut encoder = GzEncoder::new(output, self.level);
        let copied = io::copy(input, &mut encoder)?;
        encoder.finish()?.flush()?;
        Ok(copied)
    }
}
