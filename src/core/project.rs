//! A loaded project: manifest, frozen unit graph and settings.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::builder::graph::UnitGraph;
use crate::builder::layout::Layout;
use crate::builder::plan::Planner;
use crate::core::manifest::Manifest;
use crate::core::target::Target;
use crate::util::config::{Config, ToolchainSettings};
use crate::util::context::GlobalContext;

/// Everything an operation needs to know about a project.
#[derive(Debug)]
pub struct Project {
    root: PathBuf,
    manifest: Manifest,
    graph: UnitGraph,
    layout: Layout,
    config: Config,
}

impl Project {
    /// Load the project whose manifest is at `manifest_path`.
    ///
    /// The unit graph is declared and frozen here, so a manifest naming an
    /// undeclared unit fails before anything is planned.
    pub fn load(manifest_path: &Path, gctx: &GlobalContext) -> Result<Self> {
        let manifest_path = if manifest_path.is_absolute() {
            manifest_path.to_path_buf()
        } else {
            gctx.cwd().join(manifest_path)
        };
        let manifest = Manifest::load(&manifest_path)?;
        let root = manifest.manifest_dir.clone();
        let graph = manifest.to_graph()?;
        let layout = Layout::new(manifest.build_dir());
        let config = gctx.load_config(&root);

        tracing::debug!(
            "loaded project `{}` with {} unit(s) from {}",
            manifest.name(),
            graph.len(),
            manifest_path.display()
        );

        Ok(Project {
            root,
            manifest,
            graph,
            layout,
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn graph(&self) -> &UnitGraph {
        &self.graph
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Targets to build when none are requested explicitly.
    ///
    /// Config files win over the manifest; with neither, the host target.
    pub fn default_targets(&self) -> Vec<Target> {
        let names = if !self.config.build.targets.is_empty() {
            &self.config.build.targets
        } else {
            &self.manifest.build.targets
        };
        if names.is_empty() {
            vec![Target::host()]
        } else {
            names.iter().map(|n| Target::from(n.as_str())).collect()
        }
    }

    /// Requested targets, or the defaults when none are given.
    pub fn targets(&self, requested: &[String]) -> Vec<Target> {
        if requested.is_empty() {
            self.default_targets()
        } else {
            requested.iter().map(|n| Target::from(n.as_str())).collect()
        }
    }

    /// Compiler settings of the manifest overridden by the config files.
    pub fn toolchain_settings(&self) -> ToolchainSettings {
        let mut settings = self.manifest.toolchain.clone();
        settings.merge(self.config.toolchain.clone());
        settings
    }

    pub fn jobs(&self) -> Option<usize> {
        self.config.build.jobs.or(self.manifest.build.jobs)
    }

    /// A planner rooted at the project directory.
    pub fn planner(&self) -> Planner<'_> {
        Planner::new(&self.graph, &self.layout, &self.root)
            .with_base_options(self.manifest.build.compile_options.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestProject;

    fn load(project: &TestProject) -> Project {
        let gctx = GlobalContext::with_cwd(project.root().to_path_buf()).with_home(None);
        Project::load(&project.manifest_path(), &gctx).unwrap()
    }

    #[test]
    fn test_load() {
        let project = TestProject::new();
        project.manifest(
            "[project]\nname = \"hello\"\n\n[build]\ncompile-options = [\"-g\"]\n\n[units.main]\n",
        );

        let loaded = load(&project);
        assert_eq!(loaded.root(), project.root());
        assert_eq!(loaded.layout().root(), project.path("build"));
        assert_eq!(loaded.graph().len(), 1);
        assert_eq!(loaded.default_targets(), vec![Target::host()]);
    }

    #[test]
    fn test_relative_manifest_path() {
        let project = TestProject::new();
        project.manifest("[project]\nname = \"hello\"\n");
        let gctx = GlobalContext::with_cwd(project.root().to_path_buf()).with_home(None);

        let loaded = Project::load(Path::new("Metal.toml"), &gctx).unwrap();
        assert_eq!(loaded.root(), project.root());
    }

    #[test]
    fn test_target_precedence() {
        let project = TestProject::new();
        project
            .manifest("[project]\nname = \"hello\"\n\n[build]\ntargets = [\"linux-x64\"]\n")
            .file(".metal/config.toml", "[build]\ntargets = [\"macos-arm64\"]\njobs = 2\n");

        let loaded = load(&project);
        assert_eq!(loaded.default_targets(), vec![Target::from("macos-arm64")]);
        assert_eq!(
            loaded.targets(&["windows-x64".to_string()]),
            vec![Target::from("windows-x64")]
        );
        assert_eq!(loaded.jobs(), Some(2));
    }

    #[test]
    fn test_toolchain_precedence() {
        let project = TestProject::new();
        project
            .manifest("[project]\nname = \"hello\"\n\n[toolchain]\ncc = \"gcc-cc\"\ncxx = \"manifest-cxx\"\n")
            .file(".metal/config.toml", "[toolchain]\ncxx = \"config-cxx\"\n");

        let settings = load(&project).toolchain_settings();
        assert_eq!(settings.cc, Some(PathBuf::from("gcc-cc")));
        assert_eq!(settings.cxx, Some(PathBuf::from("config-cxx")));
    }

    #[test]
    fn test_unknown_unit_fails_to_load() {
        let project = TestProject::new();
        project.manifest("[project]\nname = \"hello\"\n\n[units.test]\nincludable = [\"main\"]\n");
        let gctx = GlobalContext::with_cwd(project.root().to_path_buf()).with_home(None);

        let err = Project::load(&project.manifest_path(), &gctx).unwrap_err();
        assert!(err.to_string().contains("`main`"));
    }
}
