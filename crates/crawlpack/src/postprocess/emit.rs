use crawlpack_bundler::source_map::{extract_inline_map, with_map_reference};

use super::{BuildContext, Stage, map_file_name, write_durable};
use crate::error::{BuildStage, EntryError};

/// Writes the bundle to the entry's output path, moving its inline source
/// map into a sibling `.map` file when `extract_map` is set.
#[derive(Debug, Clone, Copy)]
pub struct EmitStage {
    extract_map: bool,
}

impl EmitStage {
    pub fn new(extract_map: bool) -> Self {
        Self { extract_map }
    }
}

impl Stage for EmitStage {
    fn kind(&self) -> BuildStage {
        BuildStage::Emit
    }

    fn run(&self, ctx: &mut BuildContext) -> Result<(), EntryError> {
        let code = ctx.take_bundle();
        let output = ctx.entry().output().to_path_buf();
        let map_path = ctx.entry().map_path();

        let extracted = if self.extract_map {
            extract_inline_map(&code)?
        } else {
            None
        };

        match extracted {
            Some(extracted) => {
                write_durable(&map_path, &extracted.map).map_err(|source| EntryError::Write {
                    path: map_path.clone(),
                    source,
                })?;
                ctx.add_artifact(map_path);

                let code = with_map_reference(&extracted.code, &map_file_name(ctx.entry()));
                write_durable(&output, code.as_bytes()).map_err(|source| EntryError::Write {
                    path: output.clone(),
                    source,
                })?;
            }
            None => {
                write_durable(&output, code.as_bytes()).map_err(|source| EntryError::Write {
                    path: output.clone(),
                    source,
                })?;
            }
        }

        ctx.complete(BuildStage::Emit, output);
        Ok(())
    }
}
