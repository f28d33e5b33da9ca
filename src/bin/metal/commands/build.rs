//! `metal build` command

use anyhow::Result;

use crate::cli::{BuildArgs, GlobalArgs};
use crate::commands::load_project;
use metal::ops::{build, BuildOptions};
use metal::util::config::ToolchainSettings;
use metal::util::Cancellation;

pub fn execute(global: &GlobalArgs, args: BuildArgs) -> Result<()> {
    let project = load_project(global)?;

    // Ctrl-C kills running compilers; their actions are reported as cancelled.
    let cancel = Cancellation::new();
    let handle = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nCancelling...");
        handle.cancel();
    })
    .ok();

    let opts = BuildOptions {
        targets: args.targets,
        units: args.units,
        jobs: args.jobs,
        force: args.force,
        verbose: global.verbose,
        toolchain: ToolchainSettings {
            cc: args.cc,
            cxx: args.cxx,
        },
        cancel,
    };

    let report = build(&project, &opts)?;

    for target in &report.targets {
        if global.verbose {
            for output in &target.outputs {
                eprintln!("    Artifact {}", output.display());
            }
        }
        eprintln!(
            "    Finished `{}`: {} compiled, {} up to date",
            target.target, target.compiled, target.fresh
        );
    }

    Ok(())
}
