//! High-level operations.
//!
//! This module contains the implementation of Metal commands.

pub mod metal_build;
pub mod metal_clean;
pub mod metal_commands;

pub use metal_build::{build, plan, plan_units, BuildOptions, BuildReport};
pub use metal_clean::clean;
pub use metal_commands::{emit_commands, write_merged_commands, CommandsOptions};
