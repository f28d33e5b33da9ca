//! Compilation orchestration.
//!
//! This module resolves capability search paths over the unit graph, plans
//! per-target schedules, dispatches compiler processes and records the
//! commands it runs.

pub mod commands;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod fingerprint;
pub mod graph;
pub mod layout;
pub mod modules;
pub mod plan;
pub mod toolchain;

pub use commands::{CommandEmitter, CompileCommandRecord};
pub use dispatch::{CompileResult, Dispatcher};
pub use error::{BuildError, CompileFailure};
pub use executor::{BuildExecutor, TargetReport};
pub use graph::{GraphBuilder, UnitGraph};
pub use layout::Layout;
pub use plan::{CompileAction, Planner, Schedule};
pub use toolchain::{detect_toolchain, ClangToolchain, CommandSpec, Toolchain};
