//! Units: named groups of sources compiled together.
//!
//! Sources of unit `U` live in `src/U/<language>` below the project root,
//! headers in `src/U/cpp`. A unit may also declare extra sources anywhere in
//! the project; those must exist.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::builder::error::BuildError;
use crate::core::language::Language;
use crate::core::target::{Target, TargetSet};
use crate::util::fs::{is_inside, relative_path, to_slash};

/// Directory below `src/<unit>` holding the unit's headers.
pub const HEADER_DIR: &str = "cpp";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A source file selected for compilation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    /// Path relative to the language source root, or to the project root
    /// for declared additions outside it. Determines the output path.
    pub relative: PathBuf,
    /// Absolute path of the file
    pub path: PathBuf,
}

/// A named logical component of the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub name: String,
    /// Project root the conventional layout is resolved against
    pub root: PathBuf,
    /// Options appended after the language mode flags, in declared order
    pub compile_options: Vec<String>,
    /// Targets this unit builds for; empty means every target
    pub targets: TargetSet,
    /// Include patterns, relative to each language root. Empty selects all.
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    /// Declared additions per language
    pub extra_sources: BTreeMap<Language, Vec<PathBuf>>,
    /// Extra header directories the unit provides to includers
    pub headers: Vec<PathBuf>,
    /// Prebuilt module directories the unit provides to importers
    pub modules: Vec<PathBuf>,
}

impl Unit {
    pub fn new(name: impl Into<String>, root: &Path) -> Self {
        Unit {
            name: name.into(),
            root: root.to_path_buf(),
            compile_options: Vec::new(),
            targets: TargetSet::all(),
            includes: Vec::new(),
            excludes: Vec::new(),
            extra_sources: BTreeMap::new(),
            headers: Vec::new(),
            modules: Vec::new(),
        }
    }

    /// `src/<unit>`
    pub fn src_dir(&self) -> PathBuf {
        self.root.join("src").join(&self.name)
    }

    /// `src/<unit>/<language>`
    pub fn source_root(&self, language: Language) -> PathBuf {
        self.src_dir().join(language.as_str())
    }

    /// `src/<unit>/cpp`
    pub fn header_dir(&self) -> PathBuf {
        self.src_dir().join(HEADER_DIR)
    }

    pub fn is_active(&self, target: &Target) -> bool {
        self.targets.allows(target)
    }

    /// Add an extra source file for `language`. Relative paths are taken
    /// against the project root.
    pub fn add_source(&mut self, language: Language, path: impl Into<PathBuf>) {
        self.extra_sources
            .entry(language)
            .or_default()
            .push(path.into());
    }

    /// Collect the sources of `language` built for `target`, sorted by
    /// relative path.
    ///
    /// Conventional sources are filtered by extension and by the unit's
    /// include/exclude patterns, with `{target}` replaced by the target
    /// name. Declared additions bypass the filters but must exist.
    pub fn sources(&self, language: Language, target: &Target) -> Result<Vec<SourceFile>, BuildError> {
        let includes = self.compile_patterns(&self.includes, target)?;
        let excludes = self.compile_patterns(&self.excludes, target)?;

        let source_root = self.source_root(language);
        let mut sources = Vec::new();

        if source_root.is_dir() {
            for entry in WalkDir::new(&source_root)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let path = entry.path();
                if !language.matches_extension(path) {
                    continue;
                }
                let relative = relative_path(&source_root, path);
                let candidate = to_slash(&relative);

                let included = includes.is_empty()
                    || includes.iter().any(|p| p.matches_with(&candidate, MATCH_OPTIONS));
                let excluded = excludes.iter().any(|p| p.matches_with(&candidate, MATCH_OPTIONS));
                if included && !excluded {
                    sources.push(SourceFile {
                        relative,
                        path: path.to_path_buf(),
                    });
                }
            }
        }

        for declared in self.extra_sources.get(&language).into_iter().flatten() {
            let path = if declared.is_absolute() {
                declared.clone()
            } else {
                self.root.join(declared)
            };
            if !path.is_file() {
                return Err(BuildError::MissingSource {
                    unit: self.name.clone(),
                    path,
                });
            }
            sources.push(SourceFile {
                relative: self.relative_for_addition(&source_root, &path),
                path,
            });
        }

        sources.sort();
        sources.dedup_by(|a, b| a.path == b.path);
        Ok(sources)
    }

    fn relative_for_addition(&self, source_root: &Path, path: &Path) -> PathBuf {
        if is_inside(path, source_root) {
            relative_path(source_root, path)
        } else if is_inside(path, &self.root) {
            relative_path(&self.root, path)
        } else {
            path.file_name().map(PathBuf::from).unwrap_or_else(|| path.to_path_buf())
        }
    }

    fn compile_patterns(&self, patterns: &[String], target: &Target) -> Result<Vec<Pattern>, BuildError> {
        patterns
            .iter()
            .map(|raw| {
                let expanded = raw.replace("{target}", target.as_str());
                Pattern::new(&expanded).map_err(|e| BuildError::InvalidPattern {
                    unit: self.name.clone(),
                    pattern: raw.clone(),
                    message: e.msg.to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn relatives(sources: &[SourceFile]) -> Vec<String> {
        sources.iter().map(|s| to_slash(&s.relative)).collect()
    }

    #[test]
    fn test_conventional_layout() {
        let unit = Unit::new("main", Path::new("/project"));
        assert_eq!(unit.source_root(Language::Ixx), Path::new("/project/src/main/ixx"));
        assert_eq!(unit.header_dir(), Path::new("/project/src/main/cpp"));
    }

    #[test]
    fn test_sources_filtered_by_extension() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "src/main/cxx/main.cxx");
        touch(tmp.path(), "src/main/cxx/util/strings.cpp");
        touch(tmp.path(), "src/main/cxx/notes.txt");

        let unit = Unit::new("main", tmp.path());
        let sources = unit.sources(Language::Cxx, &Target::from("linux-x64")).unwrap();
        assert_eq!(relatives(&sources), vec!["main.cxx", "util/strings.cpp"]);
        assert!(sources[0].path.is_absolute());
    }

    #[test]
    fn test_missing_language_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        let unit = Unit::new("main", tmp.path());
        assert!(unit.sources(Language::Asm, &Target::from("linux-x64")).unwrap().is_empty());
    }

    #[test]
    fn test_target_pattern_substitution() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "src/main/asm/linux-x64/start.s");
        touch(tmp.path(), "src/main/asm/macos-arm64/start.s");

        let mut unit = Unit::new("main", tmp.path());
        unit.includes = vec!["{target}/*".to_string()];

        let linux = unit.sources(Language::Asm, &Target::from("linux-x64")).unwrap();
        assert_eq!(relatives(&linux), vec!["linux-x64/start.s"]);

        let windows = unit.sources(Language::Asm, &Target::from("windows-x64")).unwrap();
        assert!(windows.is_empty());
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "src/main/c/main.c");
        touch(tmp.path(), "src/main/c/generated/table.c");

        let mut unit = Unit::new("main", tmp.path());
        unit.includes = vec!["**/*.c".to_string()];
        unit.excludes = vec!["generated/**".to_string()];

        let sources = unit.sources(Language::C, &Target::from("linux-x64")).unwrap();
        assert_eq!(relatives(&sources), vec!["main.c"]);
    }

    #[test]
    fn test_declared_addition() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "boot/start.s");

        let mut unit = Unit::new("main", tmp.path());
        unit.add_source(Language::Asm, "boot/start.s");

        let sources = unit.sources(Language::Asm, &Target::from("linux-x64")).unwrap();
        assert_eq!(relatives(&sources), vec!["boot/start.s"]);
    }

    #[test]
    fn test_declared_addition_inside_root_is_not_duplicated() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "src/main/c/main.c");

        let mut unit = Unit::new("main", tmp.path());
        unit.add_source(Language::C, "src/main/c/main.c");

        let sources = unit.sources(Language::C, &Target::from("linux-x64")).unwrap();
        assert_eq!(relatives(&sources), vec!["main.c"]);
    }

    #[test]
    fn test_missing_declared_addition() {
        let tmp = TempDir::new().unwrap();
        let mut unit = Unit::new("main", tmp.path());
        unit.add_source(Language::C, "gone.c");

        let err = unit.sources(Language::C, &Target::from("linux-x64")).unwrap_err();
        assert!(matches!(err, BuildError::MissingSource { ref unit, .. } if unit == "main"));
    }

    #[test]
    fn test_invalid_pattern() {
        let tmp = TempDir::new().unwrap();
        let mut unit = Unit::new("main", tmp.path());
        unit.includes = vec!["[".to_string()];
        let err = unit.sources(Language::C, &Target::from("linux-x64")).unwrap_err();
        assert!(matches!(err, BuildError::InvalidPattern { .. }));
    }
}
