//! Terminal output.
//!
//! Status lines go to stderr; stdout carries only the rewritten body or the
//! JSON report so it can be piped.

use console::{Style, Term};

/// Color of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tone {
    Plain,
    Good,
    Warn,
    Bad,
    Heading,
}

impl Tone {
    fn style(self) -> Style {
        match self {
            Self::Plain => Style::new(),
            Self::Good => Style::new().green(),
            Self::Warn => Style::new().yellow(),
            Self::Bad => Style::new().red(),
            Self::Heading => Style::new().cyan().bold(),
        }
    }
}

pub(crate) struct Output {
    stderr: Term,
    stdout: Term,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            stderr: Term::stderr(),
            stdout: Term::stdout(),
        }
    }

    /// Print one status line to stderr; write failures are ignored.
    pub(crate) fn status(&self, tone: Tone, msg: &str) {
        let _ = self
            .stderr
            .write_line(&tone.style().apply_to(msg).to_string());
    }

    /// Write `content` to stdout unstyled.
    pub(crate) fn body(&self, content: &str) -> std::io::Result<()> {
        self.stdout.write_str(content)?;
        self.stdout.flush()
    }
}
