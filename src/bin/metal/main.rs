//! Metal CLI - parallel compilation of C, C++ modules and assembler

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use metal::util::diagnostic::{emit, Diagnostic};
use metal::BuildError;

fn main() {
    let cli = Cli::parse();
    let color = !cli.no_color && std::io::stderr().is_terminal();

    if let Err(e) = run(cli) {
        match e.downcast_ref::<BuildError>() {
            Some(build_error) => emit(&build_error.to_diagnostic(), color),
            None => emit(&Diagnostic::error(format!("{:#}", e)), color),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("metal=debug")
    } else {
        EnvFilter::new("metal=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let global = cli.global();
    match cli.command {
        Commands::Build(args) => commands::build::execute(&global, args),
        Commands::Commands(args) => commands::commands::execute(&global, args),
        Commands::Plan(args) => commands::plan::execute(&global, args),
        Commands::Clean(args) => commands::clean::execute(&global, args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
