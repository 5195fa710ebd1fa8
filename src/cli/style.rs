//! Terminal styling helpers
//!
//! Output goes through `anstream`, which strips the escapes when the stream
//! is not a terminal.

use indicatif::ProgressStyle;
use owo_colors::OwoColorize;
use std::fmt::Display;

/// Check mark used for successful steps
pub const CHECK: &str = "✓";
/// Cross used for failed steps
pub const CROSS: &str = "✗";

/// Semantic styles for CLI output
pub trait Stylize: Display + Sized {
    /// De-emphasized secondary text
    fn muted(&self) -> String {
        self.dimmed().to_string()
    }

    /// Headings and names
    fn emphasis(&self) -> String {
        self.bold().to_string()
    }

    /// Identifiers such as branches and PR keys
    fn accent(&self) -> String {
        self.cyan().to_string()
    }

    /// Successful outcomes
    fn success(&self) -> String {
        self.green().to_string()
    }

    /// Outcomes that need attention
    fn warn(&self) -> String {
        self.yellow().to_string()
    }

    /// Failures
    fn failure(&self) -> String {
        self.red().bold().to_string()
    }
}

impl<T: Display> Stylize for T {}

/// Styled check mark
pub fn check() -> String {
    CHECK.success()
}

/// Spinner used while cycles are running
pub fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "])
}

/// Render `text` as a terminal hyperlink to `url` when stdout supports it
pub fn link(text: &str, url: &str) -> String {
    if supports_hyperlinks::on(supports_hyperlinks::Stream::Stdout) {
        terminal_link::Link::new(text, url).to_string()
    } else {
        text.to_string()
    }
}
