//! `metal clean` command

use anyhow::Result;

use crate::cli::{CleanArgs, GlobalArgs};
use crate::commands::load_project;
use metal::ops::clean;

pub fn execute(global: &GlobalArgs, _args: CleanArgs) -> Result<()> {
    let project = load_project(global)?;

    if let Some(removed) = clean(&project)? {
        eprintln!("     Removed {}", removed.display());
    }

    Ok(())
}
