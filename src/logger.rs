//! Logging utilities with colored output.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - `debug!` macro, only printed with `--verbose`
//! - `status_success` / `status_error` for timestamped build outcomes
//!
//! # Example
//!
//! ```ignore
//! log!("serve"; "listening on {}", addr);
//! debug!("serve"; "handle url {}", url);
//! logger::status_success("built github.com/goplus/FlappyCalf");
//! ```

use crossterm::{
    execute,
    terminal::{Clear, ClearType},
};
use owo_colors::{AnsiColors, OwoColorize, Stream};
use std::{
    io::{Write, stdout},
    sync::atomic::{AtomicBool, Ordering},
    time::SystemTime,
};

use crate::utils::date::DateTimeUtc;

/// Global verbose flag (set by --verbose CLI argument)
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when --verbose is enabled)
///
/// # Usage
/// ```ignore
/// debug!("module"; "debug info: {}", value);
/// ```
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix
#[inline]
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let prefix = colorize_prefix(module, &module_lower);

    let mut stdout = stdout().lock();
    execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

/// Apply color to a module prefix based on module type
///
/// Colors follow `--color` (via `owo_colors::set_override`) and stdout TTY detection.
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> String {
    let prefix = format!("[{module}]");
    let color = match module_lower {
        "serve" => AnsiColors::BrightBlue,
        "reload" => AnsiColors::BrightGreen,
        "build" => AnsiColors::BrightMagenta,
        "error" => AnsiColors::BrightRed,
        _ => AnsiColors::BrightYellow,
    };
    prefix
        .if_supports_color(Stream::Stdout, |p| p.color(color).bold().to_string())
        .to_string()
}

// ============================================================================
// Build Status
// ============================================================================

/// Current UTC time formatted as HH:MM:SS
fn now() -> String {
    DateTimeUtc::from_system_time(SystemTime::now()).to_clock()
}

/// Format a status line: dimmed timestamp, symbol, message.
fn status_line(symbol: &str, message: &str) -> String {
    let timestamp = format!("[{}]", now());
    let timestamp = timestamp.if_supports_color(Stream::Stdout, |t| t.dimmed());
    if symbol.is_empty() {
        format!("{timestamp} {message}")
    } else {
        format!("{timestamp} {symbol} {message}")
    }
}

fn print_status(line: &str) {
    let mut stdout = stdout().lock();
    writeln!(stdout, "{line}").ok();
    stdout.flush().ok();
}

/// Build finished (✓ prefix, green).
pub fn status_success(message: &str) {
    let symbol = "✓".if_supports_color(Stream::Stdout, |s| s.green()).to_string();
    print_status(&status_line(&symbol, message));
}

/// Build reused from cache (dimmed, no symbol).
pub fn status_unchanged(message: &str) {
    let message = message.if_supports_color(Stream::Stdout, |m| m.dimmed()).to_string();
    print_status(&status_line("", &message));
}

/// Build failed (✗ prefix, red) with optional detail.
pub fn status_error(summary: &str, detail: &str) {
    let message = if detail.is_empty() {
        summary.to_string()
    } else {
        format!("{summary}\n{detail}")
    };
    let symbol = "✗".if_supports_color(Stream::Stdout, |s| s.red()).to_string();
    print_status(&status_line(&symbol, &message));
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_toggle() {
        set_verbose(true);
        assert!(is_verbose());
        set_verbose(false);
        assert!(!is_verbose());
    }

    #[test]
    fn test_status_line_without_symbol() {
        owo_colors::set_override(false);
        let line = status_line("", "cached github.com/x/y");
        assert!(line.starts_with('['));
        assert!(line.ends_with("] cached github.com/x/y"));
    }

    #[test]
    fn test_status_line_with_symbol() {
        owo_colors::set_override(false);
        let line = status_line("✓", "built");
        assert!(line.ends_with("] ✓ built"));
    }

    #[test]
    fn test_prefix_contains_module() {
        owo_colors::set_override(false);
        assert_eq!(colorize_prefix("serve", "serve"), "[serve]");
        assert_eq!(colorize_prefix("Build", "build"), "[Build]");
    }
}
