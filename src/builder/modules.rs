//! C++ module interface scanning.
//!
//! Interfaces are scanned for their `export module` declaration and their
//! `import` declarations. Imports between interfaces of the same unit order
//! their precompilation into waves; a cycle among them is rejected before
//! any compiler runs.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use regex::Regex;
use serde::Serialize;

use crate::builder::error::BuildError;

static BLOCK_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/\*[\s\S]*?\*/").unwrap());
static LINE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"//[^\n]*").unwrap());
static MODULE_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*export\s+module\s+([A-Za-z_][\w.]*(?::[A-Za-z_][\w.]*)?)\s*;").unwrap()
});
static IMPORT_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:export\s+)?import\s+([A-Za-z_][\w.]*(?::[A-Za-z_][\w.]*)?|:[A-Za-z_][\w.]*)\s*;")
        .unwrap()
});

/// What a module interface source declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInterface {
    /// Logical module name; the file stem when no declaration is found
    pub name: String,
    pub source: PathBuf,
    /// Named modules imported, partitions expanded to `primary:part`
    pub imports: Vec<String>,
}

/// A module interface together with where its BMI lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleRecord {
    pub name: String,
    pub source: PathBuf,
    pub bmi: PathBuf,
    /// Directory consumers add to their import paths
    pub import_dir: PathBuf,
    /// Precompile wave within the owning unit
    pub wave: usize,
}

/// Parse a module interface's declarations out of its text.
pub fn parse_interface(source: &Path, text: &str) -> ModuleInterface {
    let text = BLOCK_COMMENT.replace_all(text, " ");
    let text = LINE_COMMENT.replace_all(&text, "");

    let name = MODULE_DECL
        .captures(&text)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| {
            source
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
    let primary = name.split(':').next().unwrap_or(&name).to_string();

    let mut imports: Vec<String> = Vec::new();
    for captures in IMPORT_DECL.captures_iter(&text) {
        let imported = &captures[1];
        let imported = if imported.starts_with(':') {
            format!("{}{}", primary, imported)
        } else {
            imported.to_string()
        };
        if !imports.contains(&imported) {
            imports.push(imported);
        }
    }

    ModuleInterface {
        name,
        source: source.to_path_buf(),
        imports,
    }
}

/// Read and parse a module interface source.
pub fn scan_interface(source: &Path) -> Result<ModuleInterface, BuildError> {
    let text = std::fs::read_to_string(source).map_err(|e| BuildError::io("read", source, e))?;
    Ok(parse_interface(source, &text))
}

/// Order the interfaces of one unit by their imports of each other.
///
/// Returns the wave of each interface, keyed by module name: interfaces
/// importing nothing from the unit are in wave 0, the others one wave
/// after the deepest interface they import. Fails with `ModuleCycle` when
/// the imports form a cycle.
pub fn order_interfaces(
    unit: &str,
    interfaces: &[ModuleInterface],
) -> Result<BTreeMap<String, usize>, BuildError> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
    for interface in interfaces {
        nodes
            .entry(interface.name.as_str())
            .or_insert_with(|| graph.add_node(interface.name.as_str()));
    }
    for interface in interfaces {
        let importer = nodes[interface.name.as_str()];
        for imported in &interface.imports {
            if let Some(&dependency) = nodes.get(imported.as_str()) {
                graph.update_edge(dependency, importer, ());
            }
        }
    }

    for scc in tarjan_scc(&graph) {
        let self_loop = scc.len() == 1 && graph.contains_edge(scc[0], scc[0]);
        if scc.len() > 1 || self_loop {
            return Err(BuildError::ModuleCycle {
                unit: unit.to_string(),
                modules: cycle_path(&graph, &scc),
            });
        }
    }

    let order = toposort(&graph, None).map_err(|cycle| BuildError::ModuleCycle {
        unit: unit.to_string(),
        modules: vec![graph[cycle.node_id()].to_string()],
    })?;

    let mut waves: HashMap<NodeIndex, usize> = HashMap::new();
    for node in order {
        let wave = graph
            .neighbors_directed(node, petgraph::Direction::Incoming)
            .map(|dep| waves.get(&dep).copied().unwrap_or(0) + 1)
            .max()
            .unwrap_or(0);
        waves.insert(node, wave);
    }

    Ok(waves
        .into_iter()
        .map(|(node, wave)| (graph[node].to_string(), wave))
        .collect())
}

/// A concrete `a -> b -> a` path through one strongly connected component.
fn cycle_path(graph: &DiGraph<&str, ()>, scc: &[NodeIndex]) -> Vec<String> {
    let Some(&start) = scc.iter().min_by_key(|n| graph[**n]) else {
        return Vec::new();
    };

    let mut path = vec![start];
    let mut current = start;
    loop {
        // Within an SCC every node has a successor inside it; prefer closing
        // the loop, otherwise step to the first unvisited member.
        let successors: Vec<NodeIndex> = graph
            .neighbors(current)
            .filter(|n| scc.contains(n))
            .collect();
        if successors.contains(&start) {
            path.push(start);
            break;
        }
        match successors.into_iter().find(|n| !path.contains(n)) {
            Some(next) => {
                path.push(next);
                current = next;
            }
            None => {
                path.push(start);
                break;
            }
        }
    }

    path.into_iter().map(|n| graph[n].to_string()).collect()
}
