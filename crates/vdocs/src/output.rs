//! Colored terminal output on stderr.

use console::{Style, Term};

/// Width of separator lines.
const SEPARATOR_WIDTH: usize = 60;

/// Terminal output formatter.
pub(crate) struct Output {
    term: Term,
    ok: Style,
    warn: Style,
    err: Style,
    heading: Style,
}

impl Output {
    /// Create a formatter writing to stderr.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            ok: Style::new().green(),
            warn: Style::new().yellow(),
            err: Style::new().red().bold(),
            heading: Style::new().cyan().bold(),
        }
    }

    fn line(&self, msg: &str, style: Option<&Style>) {
        let _ = match style {
            Some(style) => self.term.write_line(&style.apply_to(msg).to_string()),
            None => self.term.write_line(msg),
        };
    }

    pub(crate) fn info(&self, msg: &str) {
        self.line(msg, None);
    }

    pub(crate) fn success(&self, msg: &str) {
        self.line(msg, Some(&self.ok));
    }

    pub(crate) fn warning(&self, msg: &str) {
        self.line(msg, Some(&self.warn));
    }

    pub(crate) fn error(&self, msg: &str) {
        self.line(msg, Some(&self.err));
    }

    /// Print a tenant heading.
    pub(crate) fn highlight(&self, msg: &str) {
        self.line(msg, Some(&self.heading));
    }

    pub(crate) fn separator(&self) {
        self.line(&"-".repeat(SEPARATOR_WIDTH), None);
    }
}
