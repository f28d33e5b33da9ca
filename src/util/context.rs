//! Global context for Metal operations.
//!
//! Provides centralized access to the working directory and configuration
//! locations.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::manifest::MANIFEST_NAME;
use crate::util::config::{self, Config};

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global Metal data (~/.metal/), if one exists
    home: Option<PathBuf>,
}

impl GlobalContext {
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        GlobalContext {
            cwd,
            home: config::global_config_dir(),
        }
    }

    /// Replace the global configuration directory.
    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.home.as_ref().map(|h| h.join("config.toml"))
    }

    /// Load the merged global and project configuration for `project_root`.
    pub fn load_config(&self, project_root: &Path) -> Config {
        config::load_config(
            self.config_path().as_deref(),
            &config::project_config_path(project_root),
        )
    }

    /// Find `Metal.toml` starting from cwd and searching upward.
    pub fn find_manifest(&self) -> Result<PathBuf> {
        let mut current = self.cwd.clone();
        loop {
            let candidate = current.join(MANIFEST_NAME);
            if candidate.is_file() {
                return Ok(candidate);
            }
            if !current.pop() {
                bail!(
                    "could not find `{}` in `{}` or any parent directory",
                    MANIFEST_NAME,
                    self.cwd.display()
                );
            }
        }
    }
}
