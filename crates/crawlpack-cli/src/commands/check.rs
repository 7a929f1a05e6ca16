//! `crawlpack check`.

use crawlpack::{PipelineError, discover_entries};

use crate::cli::{CheckArgs, relative};
use crate::error::Result;
use crate::ui;

/// Print the merged configuration as TOML on stdout, then the entries a
/// build would pick up.
pub fn execute(args: CheckArgs) -> Result<()> {
    let loader = args.pipeline.loader()?;
    let loader = loader.overrides(args.pipeline.overrides());
    if let Some(file) = loader.config_file()? {
        ui::info(&format!("Using {}", relative(&file, loader.cwd()).display()));
    }

    let merged = loader.load()?;
    let config = merged.resolve(loader.cwd())?;
    print!("{}", toml::to_string_pretty(&merged)?);

    let entries = discover_entries(config.source(), config.file_name())
        .map_err(PipelineError::from)?;
    if entries.is_empty() {
        ui::warning(&format!(
            "No {} files under {}",
            config.file_name(),
            config.source().display()
        ));
        return Ok(());
    }
    for entry in &entries {
        println!("{}", relative(entry, config.source()).display());
    }
    ui::success(&format!("Configuration is valid, {} entry files", entries.len()));
    Ok(())
}
