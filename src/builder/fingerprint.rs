//! Group fingerprints for incremental builds.
//!
//! A group is skipped when nothing that reaches its compiler has changed:
//! the driver, every assembled command line, every source, and every file
//! under the directories it includes or imports from. Upstream BMIs live in
//! import directories, so rebuilding a producer invalidates its importers.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::plan::ActionGroup;
use crate::builder::toolchain::Toolchain;
use crate::util::fs::{files_under, write_string};
use crate::util::hash::Fingerprint;

/// Stored fingerprint of one (unit, language, target) group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupFingerprint {
    /// Toolchain name
    pub compiler: String,
    /// Hash of every input
    pub hash: String,
}

impl GroupFingerprint {
    /// Fingerprint the current inputs of `group`.
    pub fn compute(group: &ActionGroup, toolchain: &dyn Toolchain) -> Result<Self> {
        let mut fp = Fingerprint::new();
        fp.update_str(toolchain.name());

        let mut dirs: BTreeSet<&Path> = BTreeSet::new();
        for action in &group.actions {
            let argv = toolchain.compile_command(action).argv();
            fp.update_strs(argv.iter().map(String::as_str));
            fp.update_file(&action.source)?;
            dirs.extend(action.include_paths.iter().map(PathBuf::as_path));
            dirs.extend(action.import_paths.iter().map(PathBuf::as_path));
        }

        // The group's own BMIs are outputs, not inputs.
        for dir in dirs.into_iter().filter(|d| *d != group.output_dir.as_path()) {
            for file in files_under(dir) {
                fp.update_str(&file.to_string_lossy());
                fp.update_file(&file)?;
            }
        }

        Ok(GroupFingerprint {
            compiler: toolchain.name().to_string(),
            hash: fp.finish(),
        })
    }

    /// Load a stored fingerprint; anything unreadable counts as absent.
    pub fn load(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(fp) => Some(fp),
            Err(e) => {
                tracing::debug!("ignoring corrupt fingerprint {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        write_string(path, &content)
    }

    /// Forget the stored fingerprint of a group.
    pub fn remove(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("failed to remove fingerprint: {}", path.display()))
            }
        }
    }
}

/// Whether `group` can be skipped: its stored fingerprint equals `current`
/// and every output it would produce is on disk.
pub fn is_fresh(group: &ActionGroup, current: &GroupFingerprint) -> bool {
    match GroupFingerprint::load(&group.fingerprint_file) {
        Some(stored) if stored == *current => group.outputs().all(Path::exists),
        _ => false,
    }
}
