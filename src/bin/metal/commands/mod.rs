//! Command implementations

pub mod build;
pub mod clean;
pub mod commands;
pub mod completions;
pub mod plan;

use anyhow::Result;

use crate::cli::GlobalArgs;
use metal::core::Project;
use metal::util::GlobalContext;

/// Locate and load the project the command operates on.
pub fn load_project(global: &GlobalArgs) -> Result<Project> {
    let ctx = GlobalContext::new()?;

    let manifest_path = match &global.manifest_path {
        Some(path) => path.clone(),
        None => ctx.find_manifest()?,
    };
    Project::load(&manifest_path, &ctx)
}
