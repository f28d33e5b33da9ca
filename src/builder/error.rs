//! Error taxonomy of planning and dispatch.
//!
//! Everything except `CompileFailed` is raised while resolving a target's
//! schedule, before any compiler process is spawned. `CompileFailed` is
//! raised at a stage barrier and carries every failing action of the stage.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Why a single compile action failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileFailure {
    /// Unit the action belongs to
    pub unit: String,
    /// Source file being compiled
    pub file: PathBuf,
    /// Exit code of the compiler, `None` if it could not be spawned or was killed
    pub status: Option<i32>,
    /// Captured compiler output, or the spawn error
    pub diagnostics: String,
    /// The action was cancelled rather than failing on its own
    pub cancelled: bool,
}

impl CompileFailure {
    fn describe(&self) -> String {
        let status = match (self.cancelled, self.status) {
            (true, _) => "cancelled".to_string(),
            (false, Some(code)) => format!("exit status {}", code),
            (false, None) => "failed to run".to_string(),
        };
        let mut line = format!("{} [{}] ({})", self.file.display(), self.unit, status);
        let diagnostics = self.diagnostics.trim_end();
        if !diagnostics.is_empty() {
            line.push('\n');
            line.push_str(diagnostics);
        }
        line
    }
}

/// Errors produced while planning or dispatching compilation.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("dependency cycle detected: {}", .units.join(" -> "))]
    Cycle { units: Vec<String> },

    #[error("module import cycle in unit `{unit}`: {}", .modules.join(" -> "))]
    ModuleCycle { unit: String, modules: Vec<String> },

    #[error("unit `{name}` referenced by `{referenced_by}` is not declared")]
    UnknownUnit { name: String, referenced_by: String },

    #[error("unit `{0}` is declared more than once")]
    DuplicateUnit(String),

    #[error("invalid source pattern `{pattern}` in unit `{unit}`: {message}")]
    InvalidPattern {
        unit: String,
        pattern: String,
        message: String,
    },

    #[error("declared source `{}` of unit `{unit}` does not exist", .path.display())]
    MissingSource { unit: String, path: PathBuf },

    #[error(
        "`{}` and `{}` would both be compiled to `{}`",
        .first.display(),
        .second.display(),
        .output.display()
    )]
    DuplicateOutput {
        output: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("{} of {total} compilation(s) failed for target `{target}`", .failures.len())]
    CompileFailed {
        target: String,
        total: usize,
        failures: Vec<CompileFailure>,
    },

    #[error("failed to {action} `{}`: {err}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },
}

impl BuildError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        BuildError::Io {
            action,
            path: path.into(),
            err,
        }
    }

    /// Whether this error was raised before any compiler process ran.
    pub fn is_resolution_error(&self) -> bool {
        !matches!(self, BuildError::CompileFailed { .. } | BuildError::Io { .. })
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            BuildError::Cycle { .. } => diag.with_suggestion(suggestions::CYCLE),
            BuildError::ModuleCycle { .. } => diag.with_suggestion(suggestions::MODULE_CYCLE),
            BuildError::UnknownUnit { name, .. } => {
                diag.with_suggestion(format!("Declare `[units.{}]` in Metal.toml", name))
            }
            BuildError::MissingSource { path, .. } => diag.with_location(path.clone()),
            BuildError::DuplicateOutput { .. } => {
                diag.with_suggestion("Rename one of the sources so their stems differ")
            }
            BuildError::CompileFailed { failures, .. } => failures
                .iter()
                .fold(diag, |d, f| d.with_context(f.describe()))
                .with_suggestion(suggestions::BUILD_FAILED),
            BuildError::DuplicateUnit(_)
            | BuildError::InvalidPattern { .. }
            | BuildError::Io { .. } => diag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message() {
        let err = BuildError::Cycle {
            units: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle detected: a -> b -> a");
        assert!(err.is_resolution_error());
    }

    #[test]
    fn test_compile_failed_lists_every_file() {
        let failure = |file: &str| CompileFailure {
            unit: "main".into(),
            file: PathBuf::from(file),
            status: Some(1),
            diagnostics: format!("{}: error: boom", file),
            cancelled: false,
        };
        let err = BuildError::CompileFailed {
            target: "linux-x64".into(),
            total: 3,
            failures: vec![failure("a.c"), failure("b.c")],
        };

        assert_eq!(
            err.to_string(),
            "2 of 3 compilation(s) failed for target `linux-x64`"
        );
        assert!(!err.is_resolution_error());

        let rendered = err.to_diagnostic().format(false);
        assert!(rendered.contains("a.c [main] (exit status 1)"));
        assert!(rendered.contains("b.c [main] (exit status 1)"));
        assert!(rendered.contains("b.c: error: boom"));
    }

    #[test]
    fn test_spawn_failure_description() {
        let failure = CompileFailure {
            unit: "main".into(),
            file: PathBuf::from("main.c"),
            status: None,
            diagnostics: "failed to spawn `nope`".into(),
            cancelled: false,
        };
        assert!(failure.describe().contains("(failed to run)"));
    }
}
