// SPDX-License-Identifier: AGPL-3.0-or-later
//! Operator-facing progress output
//!
//! Colour is a formatting capability handed to the [`Reporter`], not global
//! terminal state. `PlainStyle` is used for `--plain` and in tests.

use std::fmt;
use std::sync::Arc;

/// Semantic tone of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Heading,
    Step,
    Success,
    Warning,
    Failure,
    Info,
}

/// Formatting capability applied to reporter output
pub trait Style: Send + Sync {
    fn paint(&self, tone: Tone, text: &str) -> String;
}

/// No escape sequences at all
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainStyle;

impl Style for PlainStyle {
    fn paint(&self, _tone: Tone, text: &str) -> String {
        text.to_string()
    }
}

/// ANSI colour escapes
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiStyle;

impl Style for AnsiStyle {
    fn paint(&self, tone: Tone, text: &str) -> String {
        let code = match tone {
            Tone::Heading => "\x1b[1;97m",
            Tone::Step => "\x1b[94m",
            Tone::Success => "\x1b[92m",
            Tone::Warning => "\x1b[93m",
            Tone::Failure => "\x1b[91m",
            Tone::Info => "\x1b[97m",
        };
        format!("{}{}\x1b[0m", code, text)
    }
}

/// Non-fatal conditions surfaced to the operator after a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// Database port never accepted a connection within the timeout
    ReadinessTimeout { host: String, port: u16, waited_secs: u64 },
    /// Admin registration succeeded but printed no link
    BootstrapNoLinkFound,
    /// Installer script only passed a size check, no checksum exists for it
    InstallerUnverified { path: String },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::ReadinessTimeout { host, port, waited_secs } => write!(
                f,
                "Timeout waiting for the database at {}:{} after {}s. Check the db container logs.",
                host, port, waited_secs
            ),
            Advisory::BootstrapNoLinkFound => write!(
                f,
                "Could not find the registration link in the output. Please check the output above manually."
            ),
            Advisory::InstallerUnverified { path } => write!(
                f,
                "{} was only checked for size; no published checksum exists for the installer script.",
                path
            ),
        }
    }
}

/// Prints progress lines through an injected [`Style`]
#[derive(Clone)]
pub struct Reporter {
    style: Arc<dyn Style>,
}

impl Reporter {
    pub fn new(style: Arc<dyn Style>) -> Self {
        Self { style }
    }

    pub fn plain() -> Self {
        Self::new(Arc::new(PlainStyle))
    }

    pub fn ansi() -> Self {
        Self::new(Arc::new(AnsiStyle))
    }

    /// Format a line without printing it
    pub fn format(&self, tone: Tone, text: &str) -> String {
        let prefix = match tone {
            Tone::Step => "▶ ",
            Tone::Success => "✔ ",
            Tone::Warning => "⚠ ",
            Tone::Failure => "✖ ",
            Tone::Heading | Tone::Info => "",
        };
        self.style.paint(tone, &format!("{}{}", prefix, text))
    }

    pub fn heading(&self, text: &str) {
        println!("{}", self.format(Tone::Heading, text));
    }

    pub fn step(&self, description: &str) {
        println!("{}", self.format(Tone::Step, &format!("{}...", description)));
    }

    pub fn success(&self, text: &str) {
        println!("{}", self.format(Tone::Success, text));
    }

    pub fn warn(&self, text: &str) {
        println!("{}", self.format(Tone::Warning, text));
    }

    pub fn fail(&self, text: &str) {
        eprintln!("{}", self.format(Tone::Failure, text));
    }

    pub fn info(&self, text: &str) {
        println!("{}", self.format(Tone::Info, text));
    }

    pub fn advisory(&self, advisory: &Advisory) {
        self.warn(&advisory.to_string());
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::plain()
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_style_has_no_escapes() {
        let reporter = Reporter::plain();
        assert_eq!(reporter.format(Tone::Success, "Done!"), "✔ Done!");
        assert_eq!(reporter.format(Tone::Info, "text"), "text");
    }

    #[test]
    fn test_ansi_style_wraps_and_resets() {
        let reporter = Reporter::ansi();
        let line = reporter.format(Tone::Failure, "boom");
        assert!(line.starts_with("\x1b[91m"));
        assert!(line.ends_with("\x1b[0m"));
        assert!(line.contains("✖ boom"));
    }

    #[test]
    fn test_advisory_messages() {
        let advisory = Advisory::ReadinessTimeout {
            host: "db".to_string(),
            port: 3306,
            waited_secs: 60,
        };
        assert!(advisory.to_string().contains("db:3306"));
        assert!(Advisory::BootstrapNoLinkFound
            .to_string()
            .contains("check the output"));
    }
}
