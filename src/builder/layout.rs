//! Output layout under the build root.
//!
//! ```text
//! <build-root>/
//!   obj/<unit>/<lang>/<target>/<relative>.o
//!   bmi/<unit>/ixx/<target>/<relative>.pcm
//!   commands/<unit>/<lang>/<target>/commands.json
//!   fingerprints/<unit>/<lang>/<target>.json
//!   compile_commands.json
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::core::language::Language;
use crate::core::target::Target;
use crate::util::fs::subdirectories;

pub const COMMANDS_FILE: &str = "commands.json";
pub const MERGED_COMMANDS_FILE: &str = "compile_commands.json";

/// Directory layout of everything the build writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Layout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every output of one (unit, language, target) group.
    /// BMIs for module interfaces, objects for everything else.
    pub fn output_dir(&self, unit: &str, language: Language, target: &Target) -> PathBuf {
        let kind = match language {
            Language::Ixx => "bmi",
            _ => "obj",
        };
        self.group_path(kind, unit, language, target)
    }

    /// Import directory consumers add for `unit`'s module interfaces.
    pub fn bmi_dir(&self, unit: &str, target: &Target) -> PathBuf {
        self.output_dir(unit, Language::Ixx, target)
    }

    /// Output file of one source: the relative path with its extension
    /// swapped, inside the group's output directory.
    pub fn output_path(
        &self,
        unit: &str,
        language: Language,
        target: &Target,
        relative: &Path,
    ) -> PathBuf {
        let ext = match language {
            Language::Ixx => "pcm",
            _ => "o",
        };
        self.output_dir(unit, language, target)
            .join(relative)
            .with_extension(ext)
    }

    pub fn commands_file(&self, unit: &str, language: Language, target: &Target) -> PathBuf {
        self.group_path("commands", unit, language, target)
            .join(COMMANDS_FILE)
    }

    pub fn fingerprint_file(&self, unit: &str, language: Language, target: &Target) -> PathBuf {
        self.root
            .join("fingerprints")
            .join(unit)
            .join(language.as_str())
            .join(format!("{}.json", target))
    }

    pub fn merged_commands_file(&self) -> PathBuf {
        self.root.join(MERGED_COMMANDS_FILE)
    }

    /// Everything written for one (unit, language, target) group: the
    /// output directory, the commands directory and the fingerprint.
    pub fn group_artifacts(&self, unit: &str, language: Language, target: &Target) -> Vec<PathBuf> {
        vec![
            self.output_dir(unit, language, target),
            self.group_path("commands", unit, language, target),
            self.fingerprint_file(unit, language, target),
        ]
    }

    /// Units that have anything on disk under the build root.
    pub fn units_on_disk(&self) -> BTreeSet<String> {
        ["obj", "bmi", "commands", "fingerprints"]
            .iter()
            .flat_map(|kind| subdirectories(&self.root.join(kind)))
            .collect()
    }

    fn group_path(&self, kind: &str, unit: &str, language: Language, target: &Target) -> PathBuf {
        self.root
            .join(kind)
            .join(unit)
            .join(language.as_str())
            .join(target.as_str())
    }
}
