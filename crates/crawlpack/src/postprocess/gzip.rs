use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;

use crawlpack_bundler::{CompressError, Compressor};

use super::{BuildContext, Stage};
use crate::error::{BuildStage, EntryError};
use crate::paths::with_suffix;

/// Streams the final output into a compressed sibling.
pub struct GzipStage {
    compressor: Arc<dyn Compressor>,
}

impl GzipStage {
    pub fn new(compressor: Arc<dyn Compressor>) -> Self {
        Self { compressor }
    }
}

impl Stage for GzipStage {
    fn kind(&self) -> BuildStage {
        BuildStage::Gzip
    }

    fn run(&self, ctx: &mut BuildContext) -> Result<(), EntryError> {
        let output = ctx.entry().output();
        let target = with_suffix(output, self.compressor.suffix());

        let mut input = File::open(output).map_err(CompressError::Io)?;
        let mut writer = BufWriter::new(File::create(&target).map_err(CompressError::Io)?);
        self.compressor.compress(&mut input, &mut writer)?;
        let file = writer
            .into_inner()
            .map_err(|err| CompressError::Io(err.into_error()))?;
        file.sync_all().map_err(CompressError::Io)?;

        ctx.complete(BuildStage::Gzip, target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Entry, EntryId};
    use crawlpack_bundler::GzipCompressor;
    use flate2::read::GzDecoder;
    use std::fs;
    use std::io::{self, Read, Write};
    use tempfile::TempDir;

    struct Full;

    impl Compressor for Full {
        fn suffix(&self) -> &str {
            ".gz"
        }

        fn compress(&self, _: &mut dyn Read, _: &mut dyn Write) -> Result<u64, CompressError> {
            Err(CompressError::Io(io::Error::other("no space left on device")))
        }
    }

    fn context(tmp: &TempDir) -> BuildContext {
        let output = tmp.path().join("main.js");
        fs::write(&output, "var a = 1;\n").unwrap();
        let entry = Entry::new(EntryId::new(0), tmp.path().join("src/main.js"), output);
        BuildContext::new(Arc::new(entry), String::new())
    }

    #[test]
    fn test_writes_compressed_sibling() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = context(&tmp);

        GzipStage::new(Arc::new(GzipCompressor::default()))
            .run(&mut ctx)
            .unwrap();

        let target = tmp.path().join("main.js.gz");
        let mut unzipped = String::new();
        GzDecoder::new(File::open(&target).unwrap())
            .read_to_string(&mut unzipped)
            .unwrap();
        assert_eq!(unzipped, "var a = 1;\n");
        assert_eq!(ctx.completed(), [(BuildStage::Gzip, target)]);
    }

    #[test]
    fn test_compressor_failure_is_a_gzip_error() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = context(&tmp);

        let err = GzipStage::new(Arc::new(Full)).run(&mut ctx).unwrap_err();

        assert_eq!(err.stage(), BuildStage::Gzip);
        assert!(ctx.completed().is_empty());
        assert_eq!(
            fs::read_to_string(tmp.path().join("main.js")).unwrap(),
            "var a = 1;\n"
        );
    }
}
