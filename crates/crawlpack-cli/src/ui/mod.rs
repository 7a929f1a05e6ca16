//! Terminal output: status lines and the build summary.
//!
//! Everything is written to stderr so stdout stays free for `check`'s
//! output.

mod format;
mod messages;

pub use format::{BuildSummary, format_duration, format_size};
pub use messages::{error, info, success, warning};

/// Whether stderr should get ANSI colors.
///
/// `NO_COLOR` wins over `FORCE_COLOR`; otherwise colors follow whether a
/// user is attached to stderr.
pub fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::user_attended_stderr()
}

/// Apply `--no-color` and the environment to every later message.
pub fn init_colors(no_color: bool) {
    console::set_colors_enabled_stderr(!no_color && should_use_color());
}

pub(crate) fn colors_enabled() -> bool {
    console::colors_enabled_stderr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_no_color_overrides_force_color() {
        unsafe {
            std::env::set_var("NO_COLOR", "1");
            std::env::set_var("FORCE_COLOR", "1");
        }
        assert!(!should_use_color());
        unsafe {
            std::env::remove_var("NO_COLOR");
        }
        assert!(should_use_color());
        unsafe {
            std::env::remove_var("FORCE_COLOR");
        }
    }
}
