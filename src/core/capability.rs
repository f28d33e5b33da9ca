//! Capability-typed dependency edges between units.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a dependency edge exposes from its producer to its consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// Header directories, consumed as include paths
    Includable,
    /// Module interface (BMI) directories, consumed as import paths
    Importable,
    /// Compile-command files for external tooling
    CompileCommands,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::Includable,
        Capability::Importable,
        Capability::CompileCommands,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Includable => "includable",
            Capability::Importable => "importable",
            Capability::CompileCommands => "compile-commands",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a consumer republishes what it receives through an edge.
///
/// Public edges form the implicit chain: a unit that consumes another
/// unit's headers publicly hands those headers on to its own consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// A directed `producer --kind--> consumer` relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityEdge {
    pub producer: String,
    pub kind: Capability,
    pub consumer: String,
    #[serde(default)]
    pub visibility: Visibility,
}

impl CapabilityEdge {
    pub fn new(producer: impl Into<String>, kind: Capability, consumer: impl Into<String>) -> Self {
        CapabilityEdge {
            producer: producer.into(),
            kind,
            consumer: consumer.into(),
            visibility: Visibility::Public,
        }
    }

    /// Mark the edge as consumed but not republished.
    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    pub fn is_exported(&self) -> bool {
        self.visibility == Visibility::Public
    }
}

impl fmt::Display for CapabilityEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} --{}--> {}", self.producer, self.kind, self.consumer)
    }
}
