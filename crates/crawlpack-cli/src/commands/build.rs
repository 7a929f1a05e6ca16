//! `crawlpack build`.

use std::time::Instant;

use crawlpack::{Pipeline, PipelineEvent};
use tracing::warn;

use crate::cli::{BuildArgs, relative};
use crate::error::{CliError, Result};
use crate::ui::{self, BuildSummary};

/// Run the pipeline until the initial build is done or, with `--watch`,
/// until Ctrl+C.
///
/// A non-watch build fails if any entry failed; in watch mode failures are
/// only reported, and the process keeps watching.
pub async fn execute(args: BuildArgs) -> Result<()> {
    let watch = args.watch;
    let config = args.pipeline.resolve_with(|overrides| {
        if watch {
            overrides.watch = Some(true);
        }
    })?;
    let watch = config.watch();

    let cwd = std::env::current_dir().map_err(CliError::WorkingDirectory)?;
    ui::info(&format!(
        "Building every {} under {}",
        config.file_name(),
        relative(config.source(), &cwd).display()
    ));

    let start = Instant::now();
    let mut summary = BuildSummary::new(config.dest());
    let mut handle = Pipeline::new(config).spawn();
    let mut stopping = false;

    loop {
        tokio::select! {
            event = handle.next_event() => {
                let Some(event) = event else {
                    break;
                };
                let was_complete = summary.is_complete();
                summary.record(&event);
                if !was_complete && matches!(event, PipelineEvent::Build { .. }) {
                    report(&summary, start.elapsed());
                    if watch {
                        ui::info("Watching for changes, press Ctrl+C to stop");
                    }
                }
            }

            signal = tokio::signal::ctrl_c(), if watch && !stopping => {
                stopping = true;
                match signal {
                    Ok(()) => {
                        ui::info("Stopping, letting running builds finish");
                        handle.shutdown();
                    }
                    Err(err) => warn!(error = %err, "cannot listen for Ctrl+C"),
                }
            }
        }
    }

    handle.join().await?;

    if !watch && summary.failed() > 0 {
        return Err(CliError::BuildFailed {
            failed: summary.failed(),
            total: summary.total(),
        });
    }
    Ok(())
}

fn report(summary: &BuildSummary, elapsed: std::time::Duration) {
    summary.print(elapsed);
    match (summary.total(), summary.failed()) {
        (0, _) => ui::warning("No entries found, nothing to build"),
        (total, 0) => ui::success(&format!(
            "Built {total} {} in {}",
            plural(total),
            ui::format_duration(elapsed)
        )),
        (total, failed) => ui::error(&format!(
            "{failed} of {total} {} failed",
            plural(total)
        )),
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "entry" } else { "entries" }
}
