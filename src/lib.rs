//! Metal - a parallel compilation orchestrator for C, C++ modules and assembler
//!
//! This crate provides the library behind the `metal` binary: the unit
//! graph and capability resolution, per-target planning, process dispatch
//! and compile-command emission.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Test utilities for metal unit tests.
///
/// Only available when running tests. Provides temporary project trees and
/// a fake compiler driver.
#[cfg(test)]
pub mod test_support;

pub use builder::BuildError;
pub use core::{Manifest, Project, Target};
pub use util::context::GlobalContext;
