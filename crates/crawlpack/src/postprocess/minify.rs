use std::fs;
use std::sync::Arc;

use crawlpack_bundler::source_map::{strip_map_comment, with_map_reference};
use crawlpack_bundler::{Minifier, MinifyError};

use super::{BuildContext, Stage, map_file_name, write_durable};
use crate::error::{BuildStage, EntryError};

/// Replaces the emitted output with its minified form, composing the map
/// written by the emit stage when there is one.
pub struct MinifyStage {
    minifier: Arc<dyn Minifier>,
}

impl MinifyStage {
    pub fn new(minifier: Arc<dyn Minifier>) -> Self {
        Self { minifier }
    }
}

impl Stage for MinifyStage {
    fn kind(&self) -> BuildStage {
        BuildStage::Minify
    }

    fn run(&self, ctx: &mut BuildContext) -> Result<(), EntryError> {
        let output = ctx.entry().output().to_path_buf();
        let map_path = ctx.entry().map_path();

        let code = fs::read_to_string(&output).map_err(MinifyError::Io)?;
        let map = if ctx.has_artifact(&map_path) {
            Some(fs::read(&map_path).map_err(MinifyError::Io)?)
        } else {
            None
        };

        let file_name = ctx.entry().output_name();
        let minified = self
            .minifier
            .minify(strip_map_comment(&code), map.as_deref(), &file_name)?;

        match minified.map {
            Some(map) => {
                write_durable(&map_path, &map).map_err(MinifyError::Io)?;
                let code = with_map_reference(&minified.code, &map_file_name(ctx.entry()));
                write_durable(&output, code.as_bytes()).map_err(MinifyError::Io)?;
            }
            None => {
                write_durable(&output, minified.code.as_bytes()).map_err(MinifyError::Io)?;
            }
        }

        ctx.complete(BuildStage::Minify, output);
        Ok(())
    }
}
