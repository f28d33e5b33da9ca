//! Implementation of `metal commands`.

use std::path::PathBuf;

use anyhow::Result;

use crate::builder::commands::{merge_command_files, CommandEmitter};
use crate::builder::graph::SearchPaths;
use crate::builder::plan::Schedule;
use crate::builder::toolchain::detect_toolchain;
use crate::core::project::Project;
use crate::ops::metal_build::plan_units;
use crate::util::config::ToolchainSettings;

/// Options for the commands command.
#[derive(Debug, Clone, Default)]
pub struct CommandsOptions {
    /// Targets to emit for (empty = configured defaults)
    pub targets: Vec<String>,

    /// Units to emit for (empty = all)
    pub units: Vec<String>,

    /// Compiler overrides from the command line
    pub toolchain: ToolchainSettings,
}

/// Write the commands file of every group without compiling anything,
/// followed by the merged `compile_commands.json`.
///
/// Returns every file written, the merged database last.
pub fn emit_commands(project: &Project, opts: &CommandsOptions) -> Result<Vec<PathBuf>> {
    let schedules = project
        .targets(&opts.targets)
        .iter()
        .map(|target| plan_units(project, target, &opts.units))
        .collect::<Result<Vec<_>>>()?;

    let mut settings = project.toolchain_settings();
    settings.merge(opts.toolchain.clone());
    let toolchain = detect_toolchain(&settings);
    let emitter = CommandEmitter::new(&toolchain);

    let mut written = Vec::new();
    for schedule in &schedules {
        written.extend(emitter.write_schedule(schedule)?);
    }
    written.push(write_merged_commands(project, &schedules)?);
    Ok(written)
}

/// Merge the commands files reachable through each scheduled unit's
/// CompileCommands capability into `<build-root>/compile_commands.json`.
pub fn write_merged_commands(project: &Project, schedules: &[Schedule]) -> Result<PathBuf> {
    let files: SearchPaths = schedules
        .iter()
        .flat_map(|s| s.commands.values().flatten().cloned())
        .collect();

    let out = project.layout().merged_commands_file();
    let count = merge_command_files(files.as_slice(), &out)?;
    tracing::info!("wrote {} compile command(s) to {}", count, out.display());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::commands::read_records;
    use crate::test_support::TestProject;
    use crate::util::context::GlobalContext;

    fn load(project: &TestProject) -> Project {
        let gctx = GlobalContext::with_cwd(project.root().to_path_buf()).with_home(None);
        Project::load(&project.manifest_path(), &gctx).unwrap()
    }

    fn options() -> CommandsOptions {
        CommandsOptions {
            targets: vec!["linux-x64".to_string()],
            toolchain: ToolchainSettings {
                cc: Some(PathBuf::from("/opt/llvm/bin/clang")),
                cxx: Some(PathBuf::from("/opt/llvm/bin/clang++")),
            },
            ..CommandsOptions::default()
        }
    }

    #[test]
    fn test_emit_without_compiling() {
        let project = TestProject::new();
        project
            .manifest(
                "[project]\nname = \"hello\"\n\n[units.main]\ncompile-options = [\"-std=c++20\"]\n",
            )
            .file("src/main/ixx/greet.ixx", "export module greet;\n")
            .file("src/main/cxx/main.cxx", "import greet;\n");
        let loaded = load(&project);

        let written = emit_commands(&loaded, &options()).unwrap();
        assert_eq!(
            written,
            vec![
                project.path("build/commands/main/ixx/linux-x64/commands.json"),
                project.path("build/commands/main/cxx/linux-x64/commands.json"),
                project.path("build/compile_commands.json"),
            ]
        );
        assert!(!project.exists("build/obj"));
        assert!(!project.exists("build/bmi"));

        let records = read_records(&written[1]).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.directory, project.root().display().to_string());
        assert_eq!(record.arguments[0], "/opt/llvm/bin/clang++");
        assert!(record.arguments.contains(&"-std=c++20".to_string()));
        assert_eq!(
            record.output,
            project.path("build/obj/main/cxx/linux-x64/main.o").display().to_string()
        );

        let merged = read_records(&written[2]).unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merged_follows_commands_edges() {
        let project = TestProject::new();
        project
            .manifest(
                "[project]\nname = \"hello\"\n\n[units.lib]\n\n[units.app]\ncommands = [\"lib\"]\n",
            )
            .file("src/lib/c/lib.c", "int lib;\n")
            .file("src/app/c/app.c", "int app;\n");
        let loaded = load(&project);

        let written = emit_commands(&loaded, &options()).unwrap();
        let merged = read_records(written.last().unwrap()).unwrap();
        let files: Vec<_> = merged.iter().map(|r| r.file.clone()).collect();
        assert_eq!(
            files,
            vec![
                project.path("src/app/c/app.c").display().to_string(),
                project.path("src/lib/c/lib.c").display().to_string(),
            ]
        );
    }
}
