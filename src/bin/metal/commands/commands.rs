//! `metal commands` command

use anyhow::Result;

use crate::cli::{CommandsArgs, GlobalArgs};
use crate::commands::load_project;
use metal::ops::{emit_commands, CommandsOptions};
use metal::util::config::ToolchainSettings;

pub fn execute(global: &GlobalArgs, args: CommandsArgs) -> Result<()> {
    let project = load_project(global)?;

    let opts = CommandsOptions {
        targets: args.targets,
        units: args.units,
        toolchain: ToolchainSettings {
            cc: args.cc,
            cxx: args.cxx,
        },
    };

    let written = emit_commands(&project, &opts)?;
    for path in &written {
        eprintln!("       Wrote {}", path.display());
    }

    Ok(())
}
