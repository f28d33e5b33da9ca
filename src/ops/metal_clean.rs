//! Implementation of `metal clean`.

use std::path::PathBuf;

use anyhow::Result;

use crate::core::project::Project;
use crate::util::fs::remove_dir_all_if_exists;

/// Remove the build root. Returns the removed directory, or `None` when
/// there was nothing to remove.
pub fn clean(project: &Project) -> Result<Option<PathBuf>> {
    let root = project.layout().root();
    if !root.exists() {
        tracing::debug!("{} does not exist", root.display());
        return Ok(None);
    }
    remove_dir_all_if_exists(root)?;
    tracing::debug!("removed {}", root.display());
    Ok(Some(root.to_path_buf()))
}
