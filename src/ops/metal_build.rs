//! Implementation of `metal build` and `metal plan`.

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use crate::builder::commands::CommandEmitter;
use crate::builder::dispatch::Dispatcher;
use crate::builder::executor::{BuildExecutor, TargetReport};
use crate::builder::plan::Schedule;
use crate::builder::toolchain::detect_toolchain;
use crate::core::project::Project;
use crate::core::target::Target;
use crate::ops::metal_commands::write_merged_commands;
use crate::util::config::ToolchainSettings;
use crate::util::fs::remove_if_exists;
use crate::util::process::Cancellation;

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Targets to build (empty = configured defaults)
    pub targets: Vec<String>,

    /// Units to build, with the units they import from (empty = all)
    pub units: Vec<String>,

    /// Number of parallel compiler processes
    pub jobs: Option<usize>,

    /// Rebuild up-to-date groups
    pub force: bool,

    /// Verbose output
    pub verbose: bool,

    /// Compiler overrides from the command line
    pub toolchain: ToolchainSettings,

    /// Set to abort the build
    pub cancel: Cancellation,
}

/// Result of a build.
#[derive(Debug, Default, Serialize)]
pub struct BuildReport {
    pub targets: Vec<TargetReport>,
}

impl BuildReport {
    pub fn compiled(&self) -> usize {
        self.targets.iter().map(|t| t.compiled).sum()
    }

    pub fn fresh(&self) -> usize {
        self.targets.iter().map(|t| t.fresh).sum()
    }

    pub fn outputs(&self) -> impl Iterator<Item = &PathBuf> {
        self.targets.iter().flat_map(|t| t.outputs.iter())
    }
}

/// Plan one target with every unit of the project.
pub fn plan(project: &Project, target: &Target) -> Result<Schedule> {
    plan_units(project, target, &[])
}

/// Plan one target, restricted to `units` when not empty.
pub fn plan_units(project: &Project, target: &Target, units: &[String]) -> Result<Schedule> {
    let filter = (!units.is_empty()).then_some(units);
    Ok(project.planner().plan(target, filter)?)
}

/// Build the project for every requested target.
///
/// Every target is planned before any compiler runs, so resolution errors
/// never leave a partial build behind.
pub fn build(project: &Project, opts: &BuildOptions) -> Result<BuildReport> {
    let targets = project.targets(&opts.targets);
    let schedules = targets
        .iter()
        .map(|target| plan_units(project, target, &opts.units))
        .collect::<Result<Vec<_>>>()?;

    let mut settings = project.toolchain_settings();
    settings.merge(opts.toolchain.clone());
    let toolchain = detect_toolchain(&settings);

    let dispatcher = Dispatcher::new(&toolchain, opts.jobs.or(project.jobs()), opts.cancel.clone())?;
    tracing::debug!("dispatching with {} worker(s)", dispatcher.jobs());

    for schedule in &schedules {
        for stale in schedule.stale_artifacts(project.layout()) {
            tracing::debug!("removing stale {}", stale.display());
            remove_if_exists(&stale)?;
        }
    }

    let emitter = CommandEmitter::new(&toolchain);
    for schedule in &schedules {
        emitter.write_schedule(schedule)?;
    }
    write_merged_commands(project, &schedules)?;

    let executor = BuildExecutor::new(&dispatcher, &toolchain)
        .verbose(opts.verbose)
        .force(opts.force);

    let mut report = BuildReport::default();
    for schedule in &schedules {
        if schedule.is_empty() {
            tracing::info!("nothing to compile for `{}`", schedule.target);
        }
        report.targets.push(executor.execute(schedule)?);
    }
    Ok(report)
}
