use crate::util::format::{green, red, yellow};

/// Sink for per-item progress lines. Backup and restore never print
/// directly, so callers decide where progress goes.
pub trait Reporter: Send + Sync {
    fn info(&self, message: &str);
    fn success(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Writes progress to stdout, warnings and errors to stderr.
pub struct ConsoleReporter {
    ansi: bool,
}

impl ConsoleReporter {
    pub fn new(ansi: bool) -> Self {
        Self { ansi }
    }

    fn paint(&self, color: fn(&str) -> String, s: &str) -> String {
        if self.ansi { color(s) } else { s.to_string() }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new(std::env::var_os("NO_COLOR").is_none())
    }
}

impl Reporter for ConsoleReporter {
    fn info(&self, message: &str) {
        println!("{message}");
    }

    fn success(&self, message: &str) {
        println!("{} {message}", self.paint(green, "✓"));
    }

    fn warn(&self, message: &str) {
        eprintln!("{} {message}", self.paint(yellow, "warning:"));
    }

    fn error(&self, message: &str) {
        eprintln!("{} {message}", self.paint(red, "✗"));
    }
}
