//! User-facing diagnostic messages.
//!
//! Errors that reach the terminal are rendered as a headline, a list of
//! context lines (one per failing file, cycle member, ...) and numbered
//! suggestions.

use std::fmt;
use std::path::PathBuf;

/// Common suggestion messages.
pub mod suggestions {
    pub const BUILD_FAILED: &str = "Run `metal build --verbose` to see every compiler invocation";

    pub const CYCLE: &str = "Break the cycle by removing one of the listed dependencies";

    pub const MODULE_CYCLE: &str =
        "Move the shared declarations into a third module both interfaces import";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic message with optional context and suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub severity: Severity,
    pub context: Vec<String>,
    pub suggestions: Vec<String>,
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Error,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(message)
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity = match (color, self.severity) {
            (true, Severity::Error) => "\x1b[1;31merror\x1b[0m".to_string(),
            (true, Severity::Warning) => "\x1b[1;33mwarning\x1b[0m".to_string(),
            (false, s) => s.to_string(),
        };

        output.push_str(&format!("{}: {}\n", severity, self.message));

        if let Some(ref path) = self.location {
            output.push_str(&format!("  --> {}\n", path.display()));
        }

        for ctx in &self.context {
            for (i, line) in ctx.lines().enumerate() {
                if i == 0 {
                    output.push_str(&format!("  - {}\n", line));
                } else {
                    output.push_str(&format!("    {}\n", line));
                }
            }
        }

        if !self.suggestions.is_empty() {
            output.push('\n');
            let help = if color { "\x1b[1;32mhelp\x1b[0m" } else { "help" };
            output.push_str(&format!("{}: consider:\n", help));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_formatting() {
        let diag = Diagnostic::error("2 of 3 compilations failed for target `linux-x64`")
            .with_context("src/main/c/a.c (exit status 1)\na.c:1: error: expected ';'")
            .with_context("src/main/c/b.c (exit status 1)")
            .with_suggestion(suggestions::BUILD_FAILED);

        let output = diag.format(false);
        assert!(output.starts_with("error: 2 of 3 compilations failed"));
        assert!(output.contains("  - src/main/c/a.c (exit status 1)\n"));
        assert!(output.contains("    a.c:1: error: expected ';'\n"));
        assert!(output.contains("help: consider:"));
        assert!(output.contains("1. Run `metal build --verbose`"));
    }

    #[test]
    fn test_warning_without_suggestions() {
        let diag = Diagnostic::warning("unit `boot` has no sources").with_location("src/boot");
        let output = diag.to_string();
        assert!(output.starts_with("warning: unit `boot` has no sources"));
        assert!(output.contains("--> src/boot"));
        assert!(!output.contains("help"));
    }
}
