//! Sizes, durations and the end-of-build summary.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use console::Term;
use crawlpack::PipelineEvent;
use owo_colors::OwoColorize;

use super::colors_enabled;

/// Format a byte count with the largest fitting unit.
///
/// ```
/// use crawlpack_cli::ui::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(500), "500 B");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{:.2} {}", size, UNITS[unit])
    }
}

/// ```
/// use std::time::Duration;
/// use crawlpack_cli::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();
    if total_ms < 1000 {
        format!("{total_ms}ms")
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// Outcome of the initial build, collected from pipeline events.
#[derive(Debug)]
pub struct BuildSummary {
    dest: PathBuf,
    compiled: Vec<(String, u64, Duration)>,
    failed: Vec<PathBuf>,
    total: Option<usize>,
}

impl BuildSummary {
    /// Output names are shown relative to `dest`.
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self {
            dest: dest.into(),
            compiled: Vec::new(),
            failed: Vec::new(),
            total: None,
        }
    }

    /// Record one event. Everything after `build` is ignored.
    pub fn record(&mut self, event: &PipelineEvent) {
        if self.is_complete() {
            return;
        }
        match event {
            PipelineEvent::Compile {
                output, duration, ..
            } => {
                let size = fs::metadata(output).map(|meta| meta.len()).unwrap_or(0);
                self.compiled.push((self.display_name(output), size, *duration));
            }
            PipelineEvent::Error { entry, .. } => self.failed.push(entry.clone()),
            PipelineEvent::Build { files } => self.total = Some(files.len()),
            _ => {}
        }
    }

    /// Whether the initial build has finished.
    pub fn is_complete(&self) -> bool {
        self.total.is_some()
    }

    pub fn compiled(&self) -> usize {
        self.compiled.len()
    }

    pub fn failed(&self) -> usize {
        self.failed.len()
    }

    pub fn total(&self) -> usize {
        self.total.unwrap_or(self.compiled.len() + self.failed.len())
    }

    fn display_name(&self, output: &Path) -> String {
        output
            .strip_prefix(&self.dest)
            .unwrap_or(output)
            .display()
            .to_string()
    }

    /// Print the outputs table to stderr.
    pub fn print(&self, elapsed: Duration) {
        if self.compiled.is_empty() {
            return;
        }
        let width = (Term::stderr().size().1 as usize).min(80);
        let rule = "─".repeat(width);
        let mut compiled = self.compiled.clone();
        compiled.sort();

        eprintln!();
        for (name, size, duration) in &compiled {
            let size = format_size(*size);
            let duration = format!("({})", format_duration(*duration));
            if colors_enabled() {
                eprintln!(
                    "  {} {} {} {}",
                    "▸".blue(),
                    name.bright_white().bold(),
                    size.dimmed(),
                    duration.dimmed()
                );
            } else {
                eprintln!("  ▸ {name} {size} {duration}");
            }
        }
        eprintln!("{rule}");

        let total_size: u64 = compiled.iter().map(|(_, size, _)| size).sum();
        let footer = format!(
            "{} in {}",
            format_size(total_size),
            format_duration(elapsed)
        );
        if colors_enabled() {
            eprintln!("  {} {}", "Total:".bold(), footer.green());
        } else {
            eprintln!("  Total: {footer}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crawlpack::bundler::BundleError;
    use crawlpack::{BuildStage, EntryError};

    fn compile(output: &str) -> PipelineEvent {
        PipelineEvent::Compile {
            entry: PathBuf::from("/src/main.js"),
            output: PathBuf::from(output),
            duration: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1_048_576), "1.00 MB");
    }

    #[test]
    fn test_summary_stops_at_build() {
        let mut summary = BuildSummary::new("/out");
        summary.record(&compile("/out/a/main.js"));
        summary.record(&PipelineEvent::Error {
            entry: PathBuf::from("/src/b/main.js"),
            stage: BuildStage::Bundle,
            error: Arc::new(EntryError::Bundle(BundleError::SourceMap("bad".into()))),
        });
        assert!(!summary.is_complete());

        summary.record(&PipelineEvent::Build {
            files: vec![PathBuf::from("/src/a/main.js"), PathBuf::from("/src/b/main.js")],
        });
        summary.record(&compile("/out/a/main.js"));

        assert!(summary.is_complete());
        assert_eq!(summary.compiled(), 1);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.total(), 2);
        assert_eq!(summary.compiled[0].0, "a/main.js");
    }
}
