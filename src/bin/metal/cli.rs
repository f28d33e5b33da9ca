//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Metal - a parallel compilation orchestrator for C, C++ modules and assembler
#[derive(Parser)]
#[command(name = "metal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Path to Metal.toml (default: search upward from the current directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub manifest_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
pub struct GlobalArgs {
    pub verbose: bool,
    pub manifest_path: Option<PathBuf>,
}

impl Cli {
    pub fn global(&self) -> GlobalArgs {
        GlobalArgs {
            verbose: self.verbose,
            manifest_path: self.manifest_path.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile every unit for the selected targets
    Build(BuildArgs),

    /// Write compile-command files without compiling
    Commands(CommandsArgs),

    /// Print the compile schedule of a target as JSON
    Plan(PlanArgs),

    /// Remove the build directory
    Clean(CleanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Targets to build (default: configured targets, else the host)
    #[arg(short, long = "target", value_name = "TARGET")]
    pub targets: Vec<String>,

    /// Units to build, with the units they import from
    #[arg(short, long = "unit", value_name = "UNIT")]
    pub units: Vec<String>,

    /// Number of parallel compiler processes
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Rebuild everything, ignoring fingerprints
    #[arg(long)]
    pub force: bool,

    /// C and assembler compiler driver
    #[arg(long, env = "METAL_CC", value_name = "PATH")]
    pub cc: Option<PathBuf>,

    /// C++ compiler driver
    #[arg(long, env = "METAL_CXX", value_name = "PATH")]
    pub cxx: Option<PathBuf>,
}

#[derive(Args)]
pub struct CommandsArgs {
    /// Targets to emit for
    #[arg(short, long = "target", value_name = "TARGET")]
    pub targets: Vec<String>,

    /// Units to emit for
    #[arg(short, long = "unit", value_name = "UNIT")]
    pub units: Vec<String>,

    /// C and assembler compiler driver
    #[arg(long, env = "METAL_CC", value_name = "PATH")]
    pub cc: Option<PathBuf>,

    /// C++ compiler driver
    #[arg(long, env = "METAL_CXX", value_name = "PATH")]
    pub cxx: Option<PathBuf>,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Target to plan (default: the first configured target)
    #[arg(short, long, value_name = "TARGET")]
    pub target: Option<String>,

    /// Units to plan
    #[arg(short, long = "unit", value_name = "UNIT")]
    pub units: Vec<String>,
}

#[derive(Args)]
pub struct CleanArgs {}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
