//! Core data structures for Metal.
//!
//! This module contains the declarative model of a project:
//! - Compilation units and their sources
//! - Capabilities and the edges that carry them between units
//! - Languages, phases and build targets
//! - The `Metal.toml` manifest and the loaded project

pub mod capability;
pub mod language;
pub mod manifest;
pub mod project;
pub mod target;
pub mod unit;

pub use capability::{Capability, CapabilityEdge, Visibility};
pub use language::{Language, PhaseKind};
pub use manifest::{Manifest, MANIFEST_NAME};
pub use project::Project;
pub use target::{Target, TargetSet};
pub use unit::Unit;
