//! Terminal output for the tale commands.
//!
//! Rendered passages, token dumps and normalized text go to stdout so they
//! can be piped. Progress and diagnostics go to stderr, colored when the
//! terminal supports it.

use console::{Style, Term};

pub(crate) struct Output {
    stdout: Term,
    stderr: Term,
    warning: Style,
    error: Style,
    heading: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            stdout: Term::stdout(),
            stderr: Term::stderr(),
            warning: Style::new().yellow(),
            error: Style::new().red(),
            heading: Style::new().cyan().bold(),
        }
    }

    /// Write a command result (passage, tokens, normalized text) to stdout.
    pub(crate) fn result(&self, text: &str) {
        let _ = self.stdout.write_line(text);
    }

    /// Progress note, shown with `--verbose`.
    pub(crate) fn info(&self, msg: &str) {
        let _ = self.stderr.write_line(msg);
    }

    /// Parse warning or recorded render error (yellow).
    pub(crate) fn warning(&self, msg: &str) {
        self.styled(&self.warning, msg);
    }

    /// Fatal command error (red).
    pub(crate) fn error(&self, msg: &str) {
        self.styled(&self.error, msg);
    }

    /// Header above a diagnostics list (cyan bold).
    pub(crate) fn heading(&self, msg: &str) {
        self.styled(&self.heading, msg);
    }

    fn styled(&self, style: &Style, msg: &str) {
        let _ = self.stderr.write_line(&style.apply_to(msg).to_string());
    }
}
