//! Toolchain abstraction for the compiler driver.
//!
//! A toolchain turns a [`CompileAction`] into the exact command line that is
//! both executed by the dispatcher and recorded by the command emitter.

use std::path::{Path, PathBuf};

use crate::builder::plan::{CompileAction, ModuleFile};
use crate::core::language::Language;
use crate::util::config::ToolchainSettings;
use crate::util::process::find_executable;

/// A command to execute, with program, arguments, and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// The program to run (e.g., "clang", "/usr/bin/clang++")
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
    /// Environment variables to set
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program followed by its arguments, as recorded in compile commands.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.display().to_string());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

/// Trait for toolchain implementations.
pub trait Toolchain: Send + Sync {
    /// Short name for logs and fingerprints.
    fn name(&self) -> &str;

    /// Driver used for sources of `language`.
    fn driver(&self, language: Language) -> &Path;

    /// Flags selecting the source language and what to produce.
    fn mode_flags(&self, language: Language) -> Vec<String>;

    fn include_flag(&self, dir: &Path) -> String {
        format!("-I{}", dir.display())
    }

    /// One prebuilt-module-path per directory, then one module-file
    /// mapping per known interface.
    fn import_flags(&self, dirs: &[PathBuf], module_files: &[ModuleFile]) -> Vec<String> {
        let paths = dirs
            .iter()
            .map(|d| format!("-fprebuilt-module-path={}", d.display()));
        let files = module_files
            .iter()
            .map(|m| format!("-fmodule-file={}={}", m.name, m.bmi.display()));
        paths.chain(files).collect()
    }

    fn output_flag(&self, output: &Path) -> String {
        format!("--output={}", output.display())
    }

    /// Assemble the command for one action.
    ///
    /// Order is fixed: mode flags, options, include flags, import flags
    /// (module-enabled languages only), output flag, source.
    fn compile_command(&self, action: &CompileAction) -> CommandSpec {
        let mut cmd = CommandSpec::new(self.driver(action.language))
            .args(self.mode_flags(action.language))
            .args(action.options.iter().cloned())
            .args(action.include_paths.iter().map(|d| self.include_flag(d)));

        if action.language.is_module_enabled() {
            cmd = cmd.args(self.import_flags(&action.import_paths, &action.module_files));
        }

        cmd.arg(self.output_flag(&action.output))
            .arg(action.source.display().to_string())
    }
}

/// A clang-style driver pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClangToolchain {
    /// Driver for C and assembler
    pub cc: PathBuf,
    /// Driver for C++ and module interfaces
    pub cxx: PathBuf,
}

impl ClangToolchain {
    pub fn new(cc: impl Into<PathBuf>, cxx: impl Into<PathBuf>) -> Self {
        ClangToolchain {
            cc: cc.into(),
            cxx: cxx.into(),
        }
    }
}

impl Toolchain for ClangToolchain {
    fn name(&self) -> &str {
        "clang"
    }

    fn driver(&self, language: Language) -> &Path {
        match language {
            Language::C | Language::Asm => &self.cc,
            Language::Cxx | Language::Ixx => &self.cxx,
        }
    }

    fn mode_flags(&self, language: Language) -> Vec<String> {
        let flags: [&str; 2] = match language {
            Language::C => ["--language=c", "--compile"],
            Language::Cxx => ["--language=c++", "--compile"],
            Language::Ixx => ["--language=c++-module", "--precompile"],
            Language::Asm => ["--language=assembler", "--compile"],
        };
        flags.iter().map(|f| f.to_string()).collect()
    }
}

/// Pick the compiler drivers.
///
/// Priority for each driver:
/// 1. Configured value (CLI, config files, manifest, already merged)
/// 2. Environment variable (`CC`, `CXX`)
/// 3. `clang` / `clang++`
///
/// Bare names are resolved through PATH; a name that cannot be found is
/// kept as is and fails when spawned.
pub fn detect_toolchain(settings: &ToolchainSettings) -> ClangToolchain {
    let cc = pick_driver(settings.cc.as_deref(), "CC", "clang");
    let cxx = pick_driver(settings.cxx.as_deref(), "CXX", "clang++");
    tracing::debug!("using cc={} cxx={}", cc.display(), cxx.display());
    ClangToolchain::new(cc, cxx)
}

fn pick_driver(configured: Option<&Path>, env: &str, fallback: &str) -> PathBuf {
    let requested = configured
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(env).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(fallback));

    if requested.components().count() > 1 || requested.is_absolute() {
        return requested;
    }

    let name = requested.to_string_lossy();
    match find_executable(&name) {
        Some(found) => found,
        None => {
            tracing::warn!("compiler `{}` not found in PATH", name);
            requested
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::language::PhaseKind;
    use crate::core::target::Target;

    fn action(language: Language) -> CompileAction {
        CompileAction {
            unit: "main".into(),
            target: Target::from("linux-x64"),
            language,
            phase: language.phase(),
            wave: 0,
            source: PathBuf::from("/p/src/main/x/a.src"),
            output: PathBuf::from("/p/build/obj/main/x/linux-x64/a.o"),
            working_dir: PathBuf::from("/p"),
            options: vec!["-g".into(), "-O1".into()],
            include_paths: vec![PathBuf::from("/p/src/main/cpp"), PathBuf::from("/p/extra")],
            import_paths: vec![PathBuf::from("/p/build/bmi/main/ixx/linux-x64")],
            module_files: vec![ModuleFile {
                name: "greet".into(),
                bmi: PathBuf::from("/p/build/bmi/main/ixx/linux-x64/greet.pcm"),
            }],
        }
    }

    #[test]
    fn test_argument_order() {
        let tc = ClangToolchain::new("/usr/bin/clang", "/usr/bin/clang++");
        let cmd = tc.compile_command(&action(Language::Cxx));

        assert_eq!(cmd.program, PathBuf::from("/usr/bin/clang++"));
        assert_eq!(
            cmd.args,
            vec![
                "--language=c++",
                "--compile",
                "-g",
                "-O1",
                "-I/p/src/main/cpp",
                "-I/p/extra",
                "-fprebuilt-module-path=/p/build/bmi/main/ixx/linux-x64",
                "-fmodule-file=greet=/p/build/bmi/main/ixx/linux-x64/greet.pcm",
                "--output=/p/build/obj/main/x/linux-x64/a.o",
                "/p/src/main/x/a.src",
            ]
        );
    }

    #[test]
    fn test_c_and_asm_never_get_import_flags() {
        let tc = ClangToolchain::new("clang", "clang++");
        for language in [Language::C, Language::Asm] {
            let cmd = tc.compile_command(&action(language));
            assert_eq!(cmd.program, PathBuf::from("clang"));
            assert!(!cmd.args.iter().any(|a| a.starts_with("-fprebuilt")));
            assert!(!cmd.args.iter().any(|a| a.starts_with("-fmodule-file")));
        }
    }

    #[test]
    fn test_precompile_mode() {
        let tc = ClangToolchain::new("clang", "clang++");
        let cmd = tc.compile_command(&action(Language::Ixx));
        assert_eq!(&cmd.args[..2], ["--language=c++-module", "--precompile"]);
        assert_eq!(action(Language::Ixx).phase, PhaseKind::Precompile);
    }

    #[test]
    fn test_asm_mode() {
        let tc = ClangToolchain::new("clang", "clang++");
        let cmd = tc.compile_command(&action(Language::Asm));
        assert_eq!(cmd.args[0], "--language=assembler");
    }

    #[test]
    fn test_argv() {
        let cmd = CommandSpec::new("clang").arg("--compile").arg("a.c");
        assert_eq!(cmd.argv(), vec!["clang", "--compile", "a.c"]);
    }

    #[test]
    fn test_configured_path_is_kept() {
        let settings = ToolchainSettings {
            cc: Some(PathBuf::from("/opt/llvm/bin/clang")),
            cxx: Some(PathBuf::from("/opt/llvm/bin/clang++")),
        };
        let tc = detect_toolchain(&settings);
        assert_eq!(tc.cc, PathBuf::from("/opt/llvm/bin/clang"));
        assert_eq!(tc.cxx, PathBuf::from("/opt/llvm/bin/clang++"));
    }

    #[test]
    fn test_unknown_name_is_kept() {
        let settings = ToolchainSettings {
            cc: Some(PathBuf::from("no-such-compiler-xyz")),
            cxx: Some(PathBuf::from("no-such-compiler-xyz++")),
        };
        let tc = detect_toolchain(&settings);
        assert_eq!(tc.cc, PathBuf::from("no-such-compiler-xyz"));
    }
}
