//! Metal.toml manifest parsing and schema.
//!
//! The manifest declares every compilation unit of a project and the
//! capability edges between them. Edges are written on the consumer:
//! `[units.test] importable = ["main"]` makes `main` a producer of
//! importable BMIs for `test`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::builder::error::BuildError;
use crate::builder::graph::{GraphBuilder, UnitGraph};
use crate::core::capability::{Capability, CapabilityEdge};
use crate::core::language::Language;
use crate::core::target::TargetSet;
use crate::core::unit::Unit;
use crate::util::config::ToolchainSettings;

/// File name of the project manifest.
pub const MANIFEST_NAME: &str = "Metal.toml";

/// `[project]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectMetadata {
    pub name: String,

    /// Build root, relative to the manifest directory
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

/// `[build]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildSettings {
    /// Targets built when none are configured elsewhere
    pub targets: Vec<String>,

    /// Options placed before every unit's own options
    pub compile_options: Vec<String>,

    pub jobs: Option<usize>,
}

/// A capability edge as written in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EdgeSpec {
    /// `"main"`: public edge from unit `main`
    Name(String),
    /// `{ unit = "main", export = false }`
    Detailed {
        unit: String,
        #[serde(default = "default_true")]
        export: bool,
    },
}

fn default_true() -> bool {
    true
}

impl EdgeSpec {
    pub fn unit(&self) -> &str {
        match self {
            EdgeSpec::Name(unit) => unit,
            EdgeSpec::Detailed { unit, .. } => unit,
        }
    }

    pub fn is_exported(&self) -> bool {
        match self {
            EdgeSpec::Name(_) => true,
            EdgeSpec::Detailed { export, .. } => *export,
        }
    }
}

/// `[units.<name>]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct UnitSpec {
    pub compile_options: Vec<String>,

    /// Targets the unit is built for; empty means all
    pub targets: Vec<String>,

    pub include: Vec<String>,
    pub exclude: Vec<String>,

    /// Extra includable directories this unit provides
    pub headers: Vec<PathBuf>,

    /// Extra importable directories this unit provides
    pub modules: Vec<PathBuf>,

    /// Declared additions outside the conventional source directories
    pub sources: BTreeMap<Language, Vec<PathBuf>>,

    pub includable: Vec<EdgeSpec>,
    pub importable: Vec<EdgeSpec>,
    pub commands: Vec<EdgeSpec>,
}

impl UnitSpec {
    fn edges(&self) -> [(Capability, &[EdgeSpec]); 3] {
        [
            (Capability::Includable, self.includable.as_slice()),
            (Capability::Importable, self.importable.as_slice()),
            (Capability::CompileCommands, self.commands.as_slice()),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    project: ProjectMetadata,

    #[serde(default)]
    build: BuildSettings,

    #[serde(default)]
    toolchain: ToolchainSettings,

    #[serde(default)]
    units: BTreeMap<String, UnitSpec>,
}

/// The parsed Metal.toml manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub project: ProjectMetadata,
    pub build: BuildSettings,
    pub toolchain: ToolchainSettings,
    pub units: BTreeMap<String, UnitSpec>,

    /// Directory containing the manifest
    pub manifest_dir: PathBuf,
}

impl Manifest {
    /// Load a manifest from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;

        Self::parse(&content, path)
    }

    /// Parse manifest content.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let raw: RawManifest = toml::from_str(content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        for name in raw.units.keys() {
            validate_unit_name(name)?;
        }
        if raw.units.is_empty() {
            tracing::warn!("{} declares no units", path.display());
        }

        let manifest_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();

        Ok(Manifest {
            project: raw.project,
            build: raw.build,
            toolchain: raw.toolchain,
            units: raw.units,
            manifest_dir,
        })
    }

    pub fn name(&self) -> &str {
        &self.project.name
    }

    /// Absolute build root.
    pub fn build_dir(&self) -> PathBuf {
        self.manifest_dir.join(&self.project.build_dir)
    }

    /// Declare every unit and edge, then freeze the graph.
    pub fn to_graph(&self) -> Result<UnitGraph, BuildError> {
        let mut builder = GraphBuilder::new();
        for (name, spec) in &self.units {
            builder.add_unit(self.unit(name, spec))?;
        }
        for (consumer, spec) in &self.units {
            for (kind, edges) in spec.edges() {
                for edge in edges {
                    let mut declared = CapabilityEdge::new(edge.unit(), kind, consumer.as_str());
                    if !edge.is_exported() {
                        declared = declared.private();
                    }
                    builder.add_edge(declared);
                }
            }
        }
        builder.freeze()
    }

    fn unit(&self, name: &str, spec: &UnitSpec) -> Unit {
        let mut unit = Unit::new(name, &self.manifest_dir);
        unit.compile_options = spec.compile_options.clone();
        unit.targets = TargetSet::only(spec.targets.iter().map(String::as_str));
        unit.includes = spec.include.clone();
        unit.excludes = spec.exclude.clone();
        unit.headers = spec.headers.clone();
        unit.modules = spec.modules.clone();
        for (&language, paths) in &spec.sources {
            for path in paths {
                unit.add_source(language, path);
            }
        }
        unit
    }
}

/// Unit names become path segments of every output.
fn validate_unit_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        bail!(
            "invalid unit name `{}`: only ASCII letters, digits, `-` and `_` are allowed",
            name
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::target::Target;
    use tempfile::TempDir;

    const FULL: &str = r#"
[project]
name = "hello"

[build]
targets = ["linux-x64"]
compile-options = ["-g"]
jobs = 4

[toolchain]
cc = "/opt/llvm/bin/clang"

[units.main]
compile-options = ["-std=c++20"]
include = ["**/*"]
exclude = ["legacy/**"]
headers = ["third_party/include"]
modules = ["prebuilt/bmi"]
sources = { asm = ["boot/start.s"] }

[units.test]
targets = ["linux-x64", "macos-arm64"]
includable = ["main"]
importable = ["main", { unit = "util", export = false }]
commands = ["main"]

[units.util]
"#;

    fn parse(content: &str) -> Manifest {
        Manifest::parse(content, Path::new("/project/Metal.toml")).unwrap()
    }

    #[test]
    fn test_parse_full_manifest() {
        let manifest = parse(FULL);
        assert_eq!(manifest.name(), "hello");
        assert_eq!(manifest.build_dir(), PathBuf::from("/project/build"));
        assert_eq!(manifest.build.targets, vec!["linux-x64"]);
        assert_eq!(manifest.build.compile_options, vec!["-g"]);
        assert_eq!(manifest.build.jobs, Some(4));
        assert_eq!(manifest.toolchain.cc, Some(PathBuf::from("/opt/llvm/bin/clang")));
        assert_eq!(manifest.toolchain.cxx, None);

        let main = &manifest.units["main"];
        assert_eq!(main.compile_options, vec!["-std=c++20"]);
        assert_eq!(main.sources[&Language::Asm], vec![PathBuf::from("boot/start.s")]);

        let test = &manifest.units["test"];
        assert_eq!(test.importable[0], EdgeSpec::Name("main".into()));
        assert!(!test.importable[1].is_exported());
        assert_eq!(test.importable[1].unit(), "util");
    }

    #[test]
    fn test_to_graph() {
        let manifest = parse(FULL);
        let graph = manifest.to_graph().unwrap();
        assert_eq!(graph.len(), 3);

        let main = graph.unit("main").unwrap();
        assert_eq!(main.root, PathBuf::from("/project"));
        assert_eq!(main.headers, vec![PathBuf::from("third_party/include")]);
        assert!(main.is_active(&Target::from("windows-x64")));

        let test = graph.unit("test").unwrap();
        assert!(test.is_active(&Target::from("macos-arm64")));
        assert!(!test.is_active(&Target::from("windows-x64")));

        let importable = graph.edges_into("test", Capability::Importable);
        assert_eq!(importable.len(), 2);
        assert_eq!(importable[0].producer, "main");
        assert!(importable[0].is_exported());
        assert_eq!(importable[1].producer, "util");
        assert!(!importable[1].is_exported());
        assert_eq!(graph.edges_into("test", Capability::CompileCommands).len(), 1);
    }

    #[test]
    fn test_defaults() {
        let manifest = parse("[project]\nname = \"x\"\n\n[units.main]\n");
        assert_eq!(manifest.build_dir(), PathBuf::from("/project/build"));
        assert!(manifest.build.targets.is_empty());
        assert!(manifest.units["main"].include.is_empty());
    }

    #[test]
    fn test_custom_build_dir() {
        let manifest = parse("[project]\nname = \"x\"\nbuild-dir = \"out/metal\"\n");
        assert_eq!(manifest.build_dir(), PathBuf::from("/project/out/metal"));
    }

    #[test]
    fn test_unknown_edge_target() {
        let manifest = parse("[project]\nname = \"x\"\n\n[units.test]\nimportable = [\"main\"]\n");
        let err = manifest.to_graph().unwrap_err();
        assert!(matches!(
            err,
            BuildError::UnknownUnit { ref name, ref referenced_by } if name == "main" && referenced_by == "test"
        ));
    }

    #[test]
    fn test_unknown_unit_field_is_rejected() {
        let result = Manifest::parse(
            "[project]\nname = \"x\"\n\n[units.main]\nsauces = []\n",
            Path::new("Metal.toml"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_unit_name() {
        let err = Manifest::parse(
            "[project]\nname = \"x\"\n\n[units.\"a/b\"]\n",
            Path::new("Metal.toml"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid unit name"));
    }

    #[test]
    fn test_missing_project_table() {
        assert!(Manifest::parse("[units.main]\n", Path::new("Metal.toml")).is_err());
    }

    #[test]
    fn test_load_manifest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(MANIFEST_NAME);
        std::fs::write(
            &path,
            "[project]\nname = \"demo\"\n\n[units.main]\ncompile-options = [\"-std=c++20\"]\n",
        )
        .unwrap();

        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.name(), "demo");
        assert_eq!(manifest.manifest_dir, tmp.path());
        assert_eq!(manifest.units["main"].compile_options, vec!["-std=c++20"]);
    }
}
