//! Configuration file support for Metal.
//!
//! Metal supports two configuration file locations:
//! - Global: `~/.metal/config.toml` - User-wide defaults
//! - Project: `.metal/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config. Both take precedence
//! over the `[build]` and `[toolchain]` tables of the project manifest.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Metal configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,

    /// Compiler overrides
    pub toolchain: ToolchainSettings,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Default number of parallel compiler processes (None = CPU count)
    pub jobs: Option<usize>,

    /// Targets built when none are given on the command line
    pub targets: Vec<String>,
}

/// Compiler driver selection.
///
/// Shared by the config files and the `[toolchain]` table of `Metal.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// Driver for C and assembler sources (e.g., /usr/bin/clang)
    pub cc: Option<PathBuf>,

    /// Driver for C++ sources and module interfaces (e.g., /usr/bin/clang++)
    pub cxx: Option<PathBuf>,
}

impl ToolchainSettings {
    /// Merge another settings table into this one (other takes precedence).
    pub fn merge(&mut self, other: ToolchainSettings) {
        if other.cc.is_some() {
            self.cc = other.cc;
        }
        if other.cxx.is_some() {
            self.cxx = other.cxx;
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.build.jobs.is_some() {
            self.build.jobs = other.build.jobs;
        }
        if !other.build.targets.is_empty() {
            self.build.targets = other.build.targets;
        }
        self.toolchain.merge(other.toolchain);
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.metal/config.toml)
/// 2. Global config (~/.metal/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }

    config.merge(Config::load_or_default(project_path));

    config
}

/// Get the global metal config directory (~/.metal).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".metal"))
}

/// Get the project config path (.metal/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".metal").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.build.jobs.is_none());
        assert!(config.build.targets.is_empty());
        assert!(config.toolchain.cc.is_none());
    }

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        std::fs::write(
            &config_path,
            r#"
[build]
jobs = 8
targets = ["linux-x64", "linux-arm64"]

[toolchain]
cc = "/usr/bin/clang-18"
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.build.jobs, Some(8));
        assert_eq!(config.build.targets, vec!["linux-x64", "linux-arm64"]);
        assert_eq!(config.toolchain.cc, Some(PathBuf::from("/usr/bin/clang-18")));
        assert!(config.toolchain.cxx.is_none());
    }

    #[test]
    fn test_invalid_config_falls_back_to_default() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(&config_path, "[build]\njobs = \"many\"\n").unwrap();

        assert!(Config::load(&config_path).is_err());
        assert_eq!(Config::load_or_default(&config_path), Config::default());
    }

    #[test]
    fn test_load_config_precedence() {
        let tmp = TempDir::new().unwrap();
        let global_path = tmp.path().join("global.toml");
        let project_path = tmp.path().join("project.toml");

        std::fs::write(
            &global_path,
            r#"
[build]
jobs = 2
targets = ["linux-x64"]

[toolchain]
cc = "/usr/bin/gcc"
cxx = "/usr/bin/g++"
"#,
        )
        .unwrap();

        std::fs::write(
            &project_path,
            r#"
[build]
jobs = 16

[toolchain]
cc = "/usr/bin/clang"
"#,
        )
        .unwrap();

        let config = load_config(Some(&global_path), &project_path);

        assert_eq!(config.build.jobs, Some(16));
        assert_eq!(config.build.targets, vec!["linux-x64"]);
        assert_eq!(config.toolchain.cc, Some(PathBuf::from("/usr/bin/clang")));
        assert_eq!(config.toolchain.cxx, Some(PathBuf::from("/usr/bin/g++")));
    }

    #[test]
    fn test_missing_files_yield_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(None, &tmp.path().join("nope.toml"));
        assert_eq!(config, Config::default());
    }
}
