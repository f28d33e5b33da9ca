//! Schedule executor with progress reporting.
//!
//! Stages run one after another. Inside a stage, every group that is not up
//! to date is cleared and its actions are dispatched wave by wave; the stage
//! is the barrier at which failures are reported.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::builder::dispatch::{CompileResult, Dispatcher};
use crate::builder::error::{BuildError, CompileFailure};
use crate::builder::fingerprint::{is_fresh, GroupFingerprint};
use crate::builder::plan::{ActionGroup, CompileAction, Schedule};
use crate::builder::toolchain::Toolchain;
use crate::core::language::PhaseKind;
use crate::core::target::Target;

/// What happened to one target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub target: Target,
    /// Actions that ran and succeeded
    pub compiled: usize,
    /// Actions skipped because their group was up to date
    pub fresh: usize,
    /// Every object and BMI of the schedule, sorted
    pub outputs: Vec<PathBuf>,
}

/// Runs a [`Schedule`] through a [`Dispatcher`].
pub struct BuildExecutor<'a> {
    dispatcher: &'a Dispatcher<'a>,
    toolchain: &'a dyn Toolchain,
    verbose: bool,
    force: bool,
}

impl<'a> BuildExecutor<'a> {
    pub fn new(dispatcher: &'a Dispatcher<'a>, toolchain: &'a dyn Toolchain) -> Self {
        BuildExecutor {
            dispatcher,
            toolchain,
            verbose: false,
            force: false,
        }
    }

    /// Enable verbose output.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Rebuild groups even when they are up to date.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Execute every stage of `schedule`.
    ///
    /// Stops after the first stage with a failing action and returns
    /// `BuildError::CompileFailed` carrying all failures of that stage.
    pub fn execute(&self, schedule: &Schedule) -> Result<TargetReport> {
        let start = Instant::now();
        let total = schedule.action_count();
        let pb = if !self.verbose && total > 1 {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let mut report = TargetReport {
            target: schedule.target.clone(),
            compiled: 0,
            fresh: 0,
            outputs: Vec::new(),
        };

        for (index, stage) in schedule.stages.iter().enumerate() {
            let mut pending: Vec<(&ActionGroup, GroupFingerprint)> = Vec::new();
            for group in stage.groups() {
                let current = GroupFingerprint::compute(group, self.toolchain)?;
                if !self.force && is_fresh(group, &current) {
                    tracing::debug!(
                        "`{}` {} for `{}` is up to date",
                        group.unit,
                        group.language,
                        group.target
                    );
                    report.fresh += group.actions.len();
                    report.outputs.extend(group.outputs().map(Path::to_path_buf));
                    if let Some(pb) = &pb {
                        pb.inc(group.actions.len() as u64);
                    }
                    continue;
                }
                pending.push((group, current));
            }
            if pending.is_empty() {
                continue;
            }

            for (group, _) in &pending {
                tracing::info!(
                    "{} `{}` {} for `{}` ({} file(s))",
                    match group.phase {
                        PhaseKind::Precompile => "precompiling",
                        PhaseKind::Compile => "compiling",
                    },
                    group.unit,
                    group.language,
                    group.target,
                    group.actions.len()
                );
                GroupFingerprint::remove(&group.fingerprint_file)?;
            }
            self.dispatcher.prepare(pending.iter().map(|(g, _)| *g))?;

            let (result, dispatched) = self.run_waves(&pending, pb.as_ref());
            tracing::debug!(
                "stage {}/{} finished: {} ok, {} failed",
                index + 1,
                schedule.stages.len(),
                result.outputs.len(),
                result.failures.len()
            );

            let produced: HashSet<&Path> = result.outputs.iter().map(PathBuf::as_path).collect();
            for (group, current) in &pending {
                if group.outputs().all(|o| produced.contains(o)) {
                    current.save(&group.fingerprint_file)?;
                }
            }

            report.compiled += result.outputs.len();
            report.outputs.extend(result.outputs.iter().cloned());

            if !result.is_success() {
                if let Some(pb) = &pb {
                    pb.abandon();
                }
                return Err(BuildError::CompileFailed {
                    target: schedule.target.to_string(),
                    total: dispatched,
                    failures: result.failures,
                }
                .into());
            }
        }

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        report.outputs.sort();
        tracing::info!(
            "finished `{}`: {} compiled, {} up to date in {:.2}s",
            schedule.target,
            report.compiled,
            report.fresh,
            start.elapsed().as_secs_f64()
        );
        Ok(report)
    }

    /// Dispatch the actions of `pending` one wave at a time. A wave with a
    /// failure ends the stage and every action of a later wave is reported
    /// as cancelled. Returns the merged result and the number of actions
    /// accounted for.
    fn run_waves(
        &self,
        pending: &[(&ActionGroup, GroupFingerprint)],
        pb: Option<&ProgressBar>,
    ) -> (CompileResult, usize) {
        let waves = pending
            .iter()
            .flat_map(|(g, _)| g.actions.iter().map(|a| a.wave))
            .max()
            .map_or(0, |w| w + 1);

        let on_finish = |action: &CompileAction| {
            if let Some(pb) = pb {
                pb.inc(1);
                if let Some(name) = action.source.file_name() {
                    pb.set_message(name.to_string_lossy().into_owned());
                }
            }
        };

        let mut result = CompileResult::default();
        let mut dispatched = 0;
        for wave in 0..waves {
            let actions: Vec<&CompileAction> = pending
                .iter()
                .flat_map(|(g, _)| g.actions.iter())
                .filter(|a| a.wave == wave)
                .collect();
            if actions.is_empty() {
                continue;
            }
            dispatched += actions.len();
            let outcome = self.dispatcher.run(&actions, &on_finish);
            let failed = !outcome.is_success();
            result.extend(outcome);
            if failed {
                let skipped: Vec<&CompileAction> = pending
                    .iter()
                    .flat_map(|(g, _)| g.actions.iter())
                    .filter(|a| a.wave > wave)
                    .collect();
                dispatched += skipped.len();
                if let Some(pb) = pb {
                    pb.inc(skipped.len() as u64);
                }
                result.failures.extend(skipped.into_iter().map(|action| CompileFailure {
                    unit: action.unit.clone(),
                    file: action.source.clone(),
                    status: None,
                    diagnostics: String::new(),
                    cancelled: true,
                }));
                break;
            }
        }
        (result, dispatched)
    }
}
