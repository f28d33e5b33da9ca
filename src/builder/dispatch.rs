//! Compiler process dispatch.
//!
//! Runs the actions handed to it as independent compiler processes on a
//! bounded pool and joins them before returning. A failing action never
//! stops its siblings; every failure is collected.

use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::{Context, Result};

use crate::builder::error::{BuildError, CompileFailure};
use crate::builder::plan::{ActionGroup, CompileAction};
use crate::builder::toolchain::Toolchain;
use crate::util::process::{Cancellation, ProcessBuilder, ProcessOutcome};

/// Outcome of one batch of actions.
#[derive(Debug, Default)]
pub struct CompileResult {
    /// Outputs of the actions that succeeded, in action order
    pub outputs: Vec<PathBuf>,
    /// Every action that failed or was cancelled, in action order
    pub failures: Vec<CompileFailure>,
}

impl CompileResult {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn extend(&mut self, other: CompileResult) {
        self.outputs.extend(other.outputs);
        self.failures.extend(other.failures);
    }
}

/// Runs compile actions on a bounded worker pool.
pub struct Dispatcher<'a> {
    toolchain: &'a dyn Toolchain,
    pool: rayon::ThreadPool,
    cancel: Cancellation,
}

impl<'a> Dispatcher<'a> {
    /// Create a dispatcher with `jobs` workers (default: CPU count).
    pub fn new(
        toolchain: &'a dyn Toolchain,
        jobs: Option<usize>,
        cancel: Cancellation,
    ) -> Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("metal-worker-{}", i));
        if let Some(jobs) = jobs {
            builder = builder.num_threads(jobs.max(1));
        }
        let pool = builder
            .build()
            .context("failed to create compile worker pool")?;
        Ok(Dispatcher {
            toolchain,
            pool,
            cancel,
        })
    }

    pub fn jobs(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancel
    }

    /// Clear the output tree of each group, then create the parent
    /// directory of every output.
    pub fn prepare<'g>(
        &self,
        groups: impl IntoIterator<Item = &'g ActionGroup>,
    ) -> Result<(), BuildError> {
        for group in groups {
            if group.output_dir.exists() {
                tracing::debug!("removing {}", group.output_dir.display());
                std::fs::remove_dir_all(&group.output_dir)
                    .map_err(|e| BuildError::io("remove", &group.output_dir, e))?;
            }
            for output in group.outputs() {
                if let Some(parent) = output.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| BuildError::io("create directory", parent, e))?;
                }
            }
        }
        Ok(())
    }

    /// Run `actions` concurrently and wait for all of them.
    ///
    /// `on_finish` is called from the worker once an action is done,
    /// successful or not.
    pub fn run(
        &self,
        actions: &[&CompileAction],
        on_finish: &(dyn Fn(&CompileAction) + Sync),
    ) -> CompileResult {
        let (tx, rx) = mpsc::channel();
        self.pool.scope(|scope| {
            for (index, action) in actions.iter().enumerate() {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let result = self.compile(action);
                    on_finish(action);
                    // The receiver outlives the scope.
                    let _ = tx.send((index, result));
                });
            }
        });
        drop(tx);

        let mut results: Vec<_> = rx.into_iter().collect();
        results.sort_by_key(|(index, _)| *index);

        let mut outcome = CompileResult::default();
        for (_, result) in results {
            match result {
                Ok(output) => outcome.outputs.push(output),
                Err(failure) => outcome.failures.push(failure),
            }
        }
        outcome
    }

    fn compile(&self, action: &CompileAction) -> Result<PathBuf, CompileFailure> {
        let failure = |status: Option<i32>, diagnostics: String, cancelled: bool| CompileFailure {
            unit: action.unit.clone(),
            file: action.source.clone(),
            status,
            diagnostics,
            cancelled,
        };

        if self.cancel.is_cancelled() {
            return Err(failure(None, String::new(), true));
        }

        let spec = self.toolchain.compile_command(action);
        let mut cmd = ProcessBuilder::new(&spec.program)
            .args(&spec.args)
            .cwd(&action.working_dir);
        for (key, value) in &spec.env {
            cmd = cmd.env(key, value);
        }
        tracing::debug!("{}", cmd.display_command());

        match cmd.exec_with_cancel(&self.cancel) {
            Ok(ProcessOutcome::Finished(output)) => {
                let mut diagnostics = String::from_utf8_lossy(&output.stdout).into_owned();
                diagnostics.push_str(&String::from_utf8_lossy(&output.stderr));
                if output.status.success() {
                    if !diagnostics.trim().is_empty() {
                        tracing::debug!("{}:\n{}", action.source.display(), diagnostics.trim_end());
                    }
                    Ok(action.output.clone())
                } else {
                    Err(failure(output.status.code(), diagnostics, false))
                }
            }
            Ok(ProcessOutcome::Cancelled) => Err(failure(None, String::new(), true)),
            Err(e) => Err(failure(None, format!("{:#}", e), false)),
        }
    }
}
