//! Source languages and the compile phase each one belongs to.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Language of a source file.
///
/// The lowercase name doubles as the source directory name under
/// `src/<unit>/` and as the language segment of every output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// C translation units
    C,
    /// C++ translation units, including module implementation units
    #[serde(alias = "cpp", alias = "c++")]
    Cxx,
    /// C++ module interface units, precompiled to BMIs
    #[serde(alias = "cppm")]
    Ixx,
    /// Assembler sources
    #[serde(alias = "s")]
    Asm,
}

impl Language {
    /// Every language, in the order their outputs are planned.
    pub const ALL: [Language; 4] = [Language::Ixx, Language::C, Language::Cxx, Language::Asm];

    /// Get the language name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cxx => "cxx",
            Language::Ixx => "ixx",
            Language::Asm => "asm",
        }
    }

    /// File extensions recognised in the conventional source directory.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::C => &["c"],
            Language::Cxx => &["cxx", "cpp", "cc", "c++", "C"],
            Language::Ixx => &["ixx", "cppm", "mpp", "ccm"],
            Language::Asm => &["s", "S", "asm"],
        }
    }

    /// Check whether a path carries one of this language's extensions.
    pub fn matches_extension(&self, path: &Path) -> bool {
        let Some(ext) = path.extension() else {
            return false;
        };
        let ext = ext.to_string_lossy();
        self.extensions().iter().any(|e| *e == ext)
    }

    /// Whether sources of this language may `import` C++ modules.
    pub fn is_module_enabled(&self) -> bool {
        matches!(self, Language::Cxx | Language::Ixx)
    }

    /// The phase this language's sources are compiled in.
    pub fn phase(&self) -> PhaseKind {
        match self {
            Language::Ixx => PhaseKind::Precompile,
            _ => PhaseKind::Compile,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "c" => Ok(Language::C),
            "cxx" | "cpp" | "c++" => Ok(Language::Cxx),
            "ixx" | "cppm" => Ok(Language::Ixx),
            "asm" | "s" => Ok(Language::Asm),
            _ => Err(format!(
                "invalid language '{}', valid values: c, cxx, ixx, asm",
                s
            )),
        }
    }
}

/// Ordered stage of a unit's pipeline.
///
/// Precompile turns module interfaces into BMIs; Compile turns everything
/// else into objects and may import the BMIs of the precompile phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Precompile,
    Compile,
}

impl PhaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Precompile => "precompile",
            PhaseKind::Compile => "compile",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
