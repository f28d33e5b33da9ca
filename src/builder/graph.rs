//! The capability dependency graph.
//!
//! Units and capability edges are appended to a [`GraphBuilder`] while the
//! project is being declared. [`GraphBuilder::freeze`] validates the
//! declarations and produces an immutable [`UnitGraph`]; search paths are
//! only ever resolved against a frozen graph.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::builder::error::BuildError;
use crate::core::capability::{Capability, CapabilityEdge};
use crate::core::unit::Unit;

/// Collects unit and edge declarations.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    units: Vec<Unit>,
    edges: Vec<CapabilityEdge>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a unit. Names must be unique.
    pub fn add_unit(&mut self, unit: Unit) -> Result<&mut Self, BuildError> {
        if self.units.iter().any(|u| u.name == unit.name) {
            return Err(BuildError::DuplicateUnit(unit.name));
        }
        self.units.push(unit);
        Ok(self)
    }

    /// Declare an edge. Units are referenced by name and checked on freeze.
    pub fn add_edge(&mut self, edge: CapabilityEdge) -> &mut Self {
        self.edges.push(edge);
        self
    }

    /// Shorthand for a public edge.
    pub fn depend(
        &mut self,
        producer: impl Into<String>,
        kind: Capability,
        consumer: impl Into<String>,
    ) -> &mut Self {
        self.add_edge(CapabilityEdge::new(producer, kind, consumer))
    }

    /// Finish declaration and build the immutable graph.
    pub fn freeze(self) -> Result<UnitGraph, BuildError> {
        let mut graph = DiGraph::new();
        let mut index = BTreeMap::new();

        for unit in self.units {
            let name = unit.name.clone();
            let node = graph.add_node(unit);
            index.insert(name, node);
        }

        for edge in self.edges {
            let lookup = |name: &str, other: &str| {
                index
                    .get(name)
                    .copied()
                    .ok_or_else(|| BuildError::UnknownUnit {
                        name: name.to_string(),
                        referenced_by: other.to_string(),
                    })
            };
            let from = lookup(&edge.producer, &edge.consumer)?;
            let to = lookup(&edge.consumer, &edge.producer)?;
            graph.add_edge(from, to, edge);
        }

        tracing::debug!(
            "froze unit graph with {} unit(s) and {} edge(s)",
            graph.node_count(),
            graph.edge_count()
        );

        Ok(UnitGraph { graph, index })
    }
}

/// Frozen graph of units connected by `producer -> consumer` edges.
#[derive(Debug, Clone)]
pub struct UnitGraph {
    graph: DiGraph<Unit, CapabilityEdge>,
    index: BTreeMap<String, NodeIndex>,
}

impl UnitGraph {
    pub fn unit(&self, name: &str) -> Option<&Unit> {
        self.index.get(name).map(|&n| &self.graph[n])
    }

    /// Look up a unit, reporting who asked for it when it is missing.
    pub fn require(&self, name: &str, referenced_by: &str) -> Result<&Unit, BuildError> {
        self.unit(name).ok_or_else(|| BuildError::UnknownUnit {
            name: name.to_string(),
            referenced_by: referenced_by.to_string(),
        })
    }

    /// Units in declaration order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.graph.node_weights()
    }

    /// Edges in declaration order.
    pub fn edges(&self) -> impl Iterator<Item = &CapabilityEdge> {
        self.graph.edge_weights()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Edges of `kind` consumed by `consumer`, in declaration order.
    pub fn edges_into(&self, consumer: &str, kind: Capability) -> Vec<&CapabilityEdge> {
        let Some(&node) = self.index.get(consumer) else {
            return Vec::new();
        };
        let mut edges: Vec<(EdgeIndex, &CapabilityEdge)> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .filter(|e| e.weight().kind == kind)
            .map(|e| (e.id(), e.weight()))
            .collect();
        edges.sort_by_key(|(id, _)| *id);
        edges.into_iter().map(|(_, e)| e).collect()
    }

    /// `names` plus every unit they reach backwards through edges of the
    /// given kinds, in any visibility.
    pub fn closure(
        &self,
        names: &[String],
        kinds: &[Capability],
    ) -> Result<BTreeSet<String>, BuildError> {
        let mut closure = BTreeSet::new();
        let mut stack = Vec::new();
        for name in names {
            self.require(name, "--unit")?;
            stack.push(name.clone());
        }
        while let Some(name) = stack.pop() {
            if !closure.insert(name.clone()) {
                continue;
            }
            for kind in kinds {
                for edge in self.edges_into(&name, *kind) {
                    stack.push(edge.producer.clone());
                }
            }
        }
        Ok(closure)
    }
}

/// An insertion-ordered set of search paths, deduplicated by path value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPaths {
    paths: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
}

impl SearchPaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `path` unless already present. Returns whether it was added.
    pub fn insert(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.seen.contains(&path) {
            return false;
        }
        self.seen.insert(path.clone());
        self.paths.push(path);
        true
    }

    pub fn extend<I, P>(&mut self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        for path in paths {
            self.insert(path);
        }
    }

    /// Put `path` first, moving it if already present.
    pub fn prepend(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if self.seen.contains(&path) {
            self.paths.retain(|p| *p != path);
        } else {
            self.seen.insert(path.clone());
        }
        self.paths.insert(0, path);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.seen.contains(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn as_slice(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn into_vec(self) -> Vec<PathBuf> {
        self.paths
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for SearchPaths {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        let mut paths = SearchPaths::new();
        paths.extend(iter);
        paths
    }
}

/// What a unit hands out through each capability, for one target.
pub trait CapabilityProvider {
    /// Paths `unit` publishes to consumers of `kind`.
    fn provided(&self, unit: &Unit, kind: Capability) -> Vec<PathBuf>;

    /// Paths `unit` always sees itself, ahead of anything consumed.
    fn defaults(&self, unit: &Unit, kind: Capability) -> Vec<PathBuf>;
}

/// Resolves consumer search paths against a frozen graph.
///
/// Results are cached per `(consumer, kind)`; the cache lives as long as the
/// resolver, which is scoped to a single target.
pub struct SearchPathResolver<'g, P> {
    graph: &'g UnitGraph,
    provider: P,
    cache: RefCell<HashMap<(String, Capability), SearchPaths>>,
}

impl<'g, P: CapabilityProvider> SearchPathResolver<'g, P> {
    pub fn new(graph: &'g UnitGraph, provider: P) -> Self {
        SearchPathResolver {
            graph,
            provider,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// The flattened search paths `consumer` sees for `kind`: its own
    /// defaults, then what each direct producer publishes, in edge order.
    pub fn resolve(&self, consumer: &str, kind: Capability) -> Result<SearchPaths, BuildError> {
        let key = (consumer.to_string(), kind);
        if let Some(hit) = self.cache.borrow().get(&key) {
            return Ok(hit.clone());
        }

        let unit = self.graph.require(consumer, "search path query")?;
        let mut paths: SearchPaths = self.provider.defaults(unit, kind).into_iter().collect();

        let mut visiting = vec![consumer.to_string()];
        for edge in self.graph.edges_into(consumer, kind) {
            paths.extend(self.published(&edge.producer, kind, &mut visiting)?.into_vec());
        }

        tracing::debug!("resolved {} {} path(s) for `{}`", paths.len(), kind, consumer);
        self.cache.borrow_mut().insert(key, paths.clone());
        Ok(paths)
    }

    /// What `unit` publishes: its own provided paths plus everything it
    /// consumes through exported edges.
    fn published(
        &self,
        name: &str,
        kind: Capability,
        visiting: &mut Vec<String>,
    ) -> Result<SearchPaths, BuildError> {
        if let Some(pos) = visiting.iter().position(|v| v == name) {
            let mut units = visiting[pos..].to_vec();
            units.push(name.to_string());
            return Err(BuildError::Cycle { units });
        }

        let unit = self.graph.require(name, &visiting[visiting.len() - 1])?;
        visiting.push(name.to_string());

        let mut paths: SearchPaths = self.provider.provided(unit, kind).into_iter().collect();
        for edge in self.graph.edges_into(name, kind) {
            if edge.is_exported() {
                paths.extend(self.published(&edge.producer, kind, visiting)?.into_vec());
            }
        }

        visiting.pop();
        Ok(paths)
    }
}
