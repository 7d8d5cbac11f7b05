//! Terminal output for the CLI front end.
//!
//! Status lines go to stderr; machine-readable output (post-message
//! envelopes) goes to stdout so it can be piped.

use crossterm::style::{Color, Stylize};

const LABEL_WARNING: &str = "warning:";
const LABEL_ERROR: &str = "error:";
const GLYPH_BULLET: &str = "•";
const INDENT: &str = "  ";

/// Injectable rendering interface used by the terminal host and CLI.
///
/// `Renderer` is the default terminal implementation; tests substitute a
/// recording sink.
pub trait RenderSink: Send + Sync {
    /// Render a titled section header.
    fn section(&self, title: &str);
    /// Render a lifecycle/activity line.
    fn activity(&self, text: &str);
    /// Render one key/value row under a section.
    fn field(&self, key: &str, value: &str);
    /// Render an indented detail line.
    fn detail(&self, text: &str);
    fn warn(&self, msg: &str);
    fn error(&self, msg: &str);
    /// Write one line of machine-readable output to stdout.
    fn output(&self, line: &str);
}

/// Colored (or plain) stderr/stdout renderer.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }
}

impl RenderSink for Renderer {
    fn section(&self, title: &str) {
        if self.color {
            eprintln!(
                "{} {}",
                GLYPH_BULLET.with(Color::DarkGrey),
                title.with(Color::Cyan).bold()
            );
        } else {
            eprintln!("{title}:");
        }
    }

    fn activity(&self, text: &str) {
        if self.color {
            eprintln!(
                "{} {}",
                GLYPH_BULLET.with(Color::DarkGrey),
                text.with(Color::Grey).bold()
            );
        } else {
            eprintln!("{text}");
        }
    }

    fn field(&self, key: &str, value: &str) {
        if self.color {
            eprintln!(
                "{INDENT}{} {}",
                format!("{key}:").with(Color::DarkGrey),
                value.with(Color::White)
            );
        } else {
            eprintln!("{INDENT}{key}: {value}");
        }
    }

    fn detail(&self, text: &str) {
        if self.color {
            eprintln!("{INDENT}{}", text.with(Color::White));
        } else {
            eprintln!("{INDENT}{text}");
        }
    }

    fn warn(&self, msg: &str) {
        if self.color {
            eprintln!("{} {msg}", LABEL_WARNING.with(Color::Yellow).bold());
        } else {
            eprintln!("{LABEL_WARNING} {msg}");
        }
    }

    fn error(&self, msg: &str) {
        if self.color {
            eprintln!("{} {msg}", LABEL_ERROR.with(Color::Red).bold());
        } else {
            eprintln!("{LABEL_ERROR} {msg}");
        }
    }

    fn output(&self, line: &str) {
        println!("{line}");
    }
}
