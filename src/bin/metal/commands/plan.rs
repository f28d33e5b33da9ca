//! `metal plan` command

use anyhow::Result;

use crate::cli::{GlobalArgs, PlanArgs};
use crate::commands::load_project;
use metal::core::Target;
use metal::ops::plan_units;

pub fn execute(global: &GlobalArgs, args: PlanArgs) -> Result<()> {
    let project = load_project(global)?;

    let target = match args.target {
        Some(name) => Target::from(name),
        None => project
            .default_targets()
            .into_iter()
            .next()
            .unwrap_or_else(Target::host),
    };

    let schedule = plan_units(&project, &target, &args.units)?;
    println!("{}", serde_json::to_string_pretty(&schedule)?);

    Ok(())
}
