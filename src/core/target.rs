//! Build targets and the variant filter.
//!
//! A target is an opaque toolchain/platform variant name such as
//! `linux-x64`. Units may restrict themselves to a subset of targets;
//! a unit that is not active for a target is simply left out of that
//! target's schedule.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::unit::Unit;

/// A named toolchain/platform variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Target(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The target describing the machine we are running on, e.g. `linux-x64`.
    pub fn host() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "macos",
            "windows" => "windows",
            "linux" => "linux",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "x64",
            "aarch64" => "arm64",
            "x86" => "x86",
            other => other,
        };
        Target(format!("{}-{}", os, arch))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Target(s.to_string())
    }
}

impl From<String> for Target {
    fn from(s: String) -> Self {
        Target(s)
    }
}

/// The set of targets a unit is enabled for. Empty means every target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetSet(BTreeSet<Target>);

impl TargetSet {
    /// A set that allows every target.
    pub fn all() -> Self {
        TargetSet(BTreeSet::new())
    }

    /// A set restricted to the given targets.
    pub fn only<I, T>(targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Target>,
    {
        TargetSet(targets.into_iter().map(Into::into).collect())
    }

    pub fn allows(&self, target: &Target) -> bool {
        self.0.is_empty() || self.0.contains(target)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.0.iter()
    }
}

/// Whether `unit` takes part in the build for `target`.
pub fn is_active(unit: &Unit, target: &Target) -> bool {
    unit.targets.allows(target)
}
