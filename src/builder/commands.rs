//! Compile-command records for external tooling.
//!
//! One record per compile action, written per (unit, language, target) group
//! to `commands/<unit>/<lang>/<target>/commands.json`. Records are a pure
//! projection of the action through the same argument builder the
//! dispatcher uses, so they are written whether or not the action runs.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::builder::error::BuildError;
use crate::builder::plan::{ActionGroup, CompileAction, Schedule};
use crate::builder::toolchain::Toolchain;

/// `compile_commands.json` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileCommandRecord {
    pub directory: String,
    pub file: String,
    pub arguments: Vec<String>,
    pub output: String,
}

/// Projects compile actions into command records.
pub struct CommandEmitter<'a> {
    toolchain: &'a dyn Toolchain,
}

impl<'a> CommandEmitter<'a> {
    pub fn new(toolchain: &'a dyn Toolchain) -> Self {
        CommandEmitter { toolchain }
    }

    pub fn record(&self, action: &CompileAction) -> CompileCommandRecord {
        CompileCommandRecord {
            directory: action.working_dir.display().to_string(),
            file: action.source.display().to_string(),
            arguments: self.toolchain.compile_command(action).argv(),
            output: action.output.display().to_string(),
        }
    }

    /// One record per action, in action order.
    pub fn emit(&self, actions: &[CompileAction]) -> Vec<CompileCommandRecord> {
        actions.iter().map(|a| self.record(a)).collect()
    }

    /// Write a group's records to its commands file.
    pub fn write_group(&self, group: &ActionGroup) -> Result<PathBuf, BuildError> {
        write_records(&group.commands_file, &self.emit(&group.actions))?;
        Ok(group.commands_file.clone())
    }

    /// Write the commands file of every group in the schedule.
    pub fn write_schedule(&self, schedule: &Schedule) -> Result<Vec<PathBuf>, BuildError> {
        let files = schedule
            .groups()
            .map(|g| self.write_group(g))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(
            "wrote {} commands file(s) for `{}`",
            files.len(),
            schedule.target
        );
        Ok(files)
    }
}

pub fn write_records(path: &Path, records: &[CompileCommandRecord]) -> Result<(), BuildError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BuildError::io("create directory", parent, e))?;
    }
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| BuildError::io("serialize", path, io::Error::other(e)))?;
    std::fs::write(path, json).map_err(|e| BuildError::io("write", path, e))
}

pub fn read_records(path: &Path) -> Result<Vec<CompileCommandRecord>, BuildError> {
    let contents = std::fs::read_to_string(path).map_err(|e| BuildError::io("read", path, e))?;
    serde_json::from_str(&contents)
        .map_err(|e| BuildError::io("parse", path, io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// Concatenate command files into one database at `out`.
///
/// Files that do not exist are skipped; a record already seen for the same
/// (file, output) pair is dropped. Returns the number of records written.
pub fn merge_command_files(files: &[PathBuf], out: &Path) -> Result<usize, BuildError> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for file in files {
        if !file.is_file() {
            tracing::debug!("skipping missing commands file {}", file.display());
            continue;
        }
        for record in read_records(file)? {
            if seen.insert((record.file.clone(), record.output.clone())) {
                merged.push(record);
            }
        }
    }
    write_records(out, &merged)?;
    Ok(merged.len())
}
