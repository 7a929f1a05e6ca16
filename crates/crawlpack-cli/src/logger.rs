//! Tracing subscriber setup.
//!
//! Pipeline progress is logged by the library through `tracing`; this module
//! decides what reaches the terminal.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const VERBOSE_FILTER: &str =
    "crawlpack=debug,crawlpack_bundler=debug,crawlpack_config=debug,crawlpack_cli=debug";
const QUIET_FILTER: &str = "crawlpack=error,crawlpack_cli=error";
const DEFAULT_FILTER: &str = "crawlpack=info,crawlpack_bundler=info,crawlpack_config=info";

/// Install the global subscriber. Call once, before anything logs.
///
/// `verbose` wins over `quiet`; with neither, `RUST_LOG` is honored and
/// falls back to info for the crawlpack crates.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color && crate::ui::should_use_color())
        .compact();

    tracing_subscriber::registry()
        .with(filter(verbose, quiet))
        .with(fmt_layer)
        .init();
}

fn filter(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_wins_over_quiet() {
        assert_eq!(filter(true, true).to_string(), EnvFilter::new(VERBOSE_FILTER).to_string());
        assert_eq!(filter(false, true).to_string(), EnvFilter::new(QUIET_FILTER).to_string());
    }
}
