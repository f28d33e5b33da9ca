//! Build plan generation.
//!
//! A [`Schedule`] describes every compile action needed to build one target,
//! grouped per (unit, language) and sequenced into stages. Stages are the
//! topological levels of the phase graph: a unit's precompile phase comes
//! before its compile phase, and a producer's precompile phase comes before
//! both phases of every unit importing it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use crate::builder::error::BuildError;
use crate::builder::graph::{CapabilityProvider, SearchPathResolver, SearchPaths, UnitGraph};
use crate::builder::layout::Layout;
use crate::builder::modules::{order_interfaces, scan_interface, ModuleRecord};
use crate::core::capability::Capability;
use crate::core::language::{Language, PhaseKind};
use crate::core::target::Target;
use crate::core::unit::{SourceFile, Unit};

/// A `-fmodule-file=NAME=BMI` mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleFile {
    pub name: String,
    pub bmi: PathBuf,
}

/// One source file compiled for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileAction {
    pub unit: String,
    pub target: Target,
    pub language: Language,
    pub phase: PhaseKind,
    /// Position within the unit's precompile phase; always 0 when compiling
    pub wave: usize,
    pub source: PathBuf,
    pub output: PathBuf,
    pub working_dir: PathBuf,
    /// Project-wide options followed by the unit's own, in declared order
    pub options: Vec<String>,
    pub include_paths: Vec<PathBuf>,
    pub import_paths: Vec<PathBuf>,
    pub module_files: Vec<ModuleFile>,
}

/// All actions of one (unit, language, target).
///
/// The group is the unit of output cleanup, command emission and
/// up-to-date checking.
#[derive(Debug, Clone, Serialize)]
pub struct ActionGroup {
    pub unit: String,
    pub language: Language,
    pub target: Target,
    pub phase: PhaseKind,
    pub output_dir: PathBuf,
    pub commands_file: PathBuf,
    pub fingerprint_file: PathBuf,
    pub actions: Vec<CompileAction>,
}

impl ActionGroup {
    pub fn outputs(&self) -> impl Iterator<Item = &Path> {
        self.actions.iter().map(|a| a.output.as_path())
    }
}

/// One phase of one unit.
#[derive(Debug, Clone, Serialize)]
pub struct Phase {
    pub unit: String,
    pub kind: PhaseKind,
    pub groups: Vec<ActionGroup>,
}

/// Phases that may run together. Every stage waits for the previous one.
#[derive(Debug, Clone, Serialize)]
pub struct Stage {
    pub phases: Vec<Phase>,
}

impl Stage {
    pub fn groups(&self) -> impl Iterator<Item = &ActionGroup> {
        self.phases.iter().flat_map(|p| p.groups.iter())
    }

    pub fn action_count(&self) -> usize {
        self.groups().map(|g| g.actions.len()).sum()
    }
}

/// The complete plan for one target.
#[derive(Debug, Clone, Serialize)]
pub struct Schedule {
    pub target: Target,
    pub stages: Vec<Stage>,
    /// Module interfaces known to this target, by unit
    pub modules: BTreeMap<String, Vec<ModuleRecord>>,
    /// CompileCommands search paths of every scheduled unit
    pub commands: BTreeMap<String, Vec<PathBuf>>,
    /// Units this schedule speaks for; `None` means the whole project
    #[serde(skip)]
    pub scope: Option<BTreeSet<String>>,
}

impl Schedule {
    pub fn groups(&self) -> impl Iterator<Item = &ActionGroup> {
        self.stages.iter().flat_map(|s| s.groups())
    }

    pub fn actions(&self) -> impl Iterator<Item = &CompileAction> {
        self.groups().flat_map(|g| g.actions.iter())
    }

    pub fn action_count(&self) -> usize {
        self.stages.iter().map(|s| s.action_count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.action_count() == 0
    }

    /// Whether a group of `unit` in `language` is planned.
    pub fn contains(&self, unit: &str, language: Language) -> bool {
        self.groups().any(|g| g.unit == unit && g.language == language)
    }

    /// Leftovers of earlier runs for this target: the artifacts of every
    /// in-scope (unit, language) on disk that is no longer planned.
    pub fn stale_artifacts(&self, layout: &Layout) -> Vec<PathBuf> {
        layout
            .units_on_disk()
            .into_iter()
            .filter(|unit| self.scope.as_ref().map_or(true, |scope| scope.contains(unit)))
            .flat_map(|unit| {
                Language::ALL
                    .into_iter()
                    .filter(|&language| !self.contains(&unit, language))
                    .flat_map(|language| layout.group_artifacts(&unit, language, &self.target))
                    .collect::<Vec<_>>()
            })
            .filter(|path| path.exists())
            .collect()
    }
}

/// Sources of one unit for one target, by language.
type Inventory = BTreeMap<String, BTreeMap<Language, Vec<SourceFile>>>;

/// Capability provider for a single target.
struct TargetProvider<'a> {
    layout: &'a Layout,
    target: &'a Target,
    inventory: &'a Inventory,
}

impl TargetProvider<'_> {
    fn languages(&self, unit: &Unit) -> Vec<Language> {
        self.inventory
            .get(&unit.name)
            .map(|langs| langs.keys().copied().collect())
            .unwrap_or_default()
    }
}

impl CapabilityProvider for TargetProvider<'_> {
    fn provided(&self, unit: &Unit, kind: Capability) -> Vec<PathBuf> {
        match kind {
            Capability::Includable => {
                let mut dirs = vec![unit.header_dir()];
                dirs.extend(unit.headers.iter().map(|h| unit.root.join(h)));
                dirs
            }
            Capability::Importable => {
                let mut dirs = Vec::new();
                if self.languages(unit).contains(&Language::Ixx) {
                    dirs.push(self.layout.bmi_dir(&unit.name, self.target));
                }
                dirs.extend(unit.modules.iter().map(|m| unit.root.join(m)));
                dirs
            }
            Capability::CompileCommands => self
                .languages(unit)
                .into_iter()
                .map(|lang| self.layout.commands_file(&unit.name, lang, self.target))
                .collect(),
        }
    }

    fn defaults(&self, unit: &Unit, kind: Capability) -> Vec<PathBuf> {
        match kind {
            Capability::Importable => Vec::new(),
            _ => self.provided(unit, kind),
        }
    }
}

/// Turns a frozen unit graph into per-target schedules.
pub struct Planner<'a> {
    graph: &'a UnitGraph,
    layout: &'a Layout,
    working_dir: &'a Path,
    base_options: Vec<String>,
}

impl<'a> Planner<'a> {
    pub fn new(graph: &'a UnitGraph, layout: &'a Layout, working_dir: &'a Path) -> Self {
        Planner {
            graph,
            layout,
            working_dir,
            base_options: Vec::new(),
        }
    }

    /// Options placed ahead of every unit's own options.
    pub fn with_base_options(mut self, options: Vec<String>) -> Self {
        self.base_options = options;
        self
    }

    /// Plan `target`. With `units`, only those units and the producers they
    /// import from are scheduled.
    pub fn plan(&self, target: &Target, units: Option<&[String]>) -> Result<Schedule, BuildError> {
        let selected: BTreeSet<String> = match units {
            Some(names) => self.graph.closure(names, &[Capability::Importable])?,
            None => self.graph.units().map(|u| u.name.clone()).collect(),
        };
        let relevant: BTreeSet<String> = match units {
            Some(names) => self.graph.closure(names, &Capability::ALL)?,
            None => selected.clone(),
        };

        let mut inventory = Inventory::new();
        for unit in self.graph.units() {
            if !relevant.contains(&unit.name) {
                continue;
            }
            if !unit.is_active(target) {
                tracing::debug!("unit `{}` is not enabled for `{}`", unit.name, target);
                continue;
            }
            let mut by_language = BTreeMap::new();
            for language in Language::ALL {
                let sources = unit.sources(language, target)?;
                if !sources.is_empty() {
                    by_language.insert(language, sources);
                }
            }
            inventory.insert(unit.name.clone(), by_language);
        }

        let modules = self.module_records(target, &inventory)?;
        let by_dir: HashMap<&Path, &[ModuleRecord]> = modules
            .values()
            .filter_map(|records| {
                records
                    .first()
                    .map(|r| (r.import_dir.as_path(), records.as_slice()))
            })
            .collect();
        let owners: HashMap<PathBuf, &str> = modules
            .keys()
            .map(|unit| (self.layout.bmi_dir(unit, target), unit.as_str()))
            .collect();

        let provider = TargetProvider {
            layout: self.layout,
            target,
            inventory: &inventory,
        };
        let resolver = SearchPathResolver::new(self.graph, provider);

        let mut phases: Vec<Phase> = Vec::new();
        let mut producers: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut commands = BTreeMap::new();
        for unit in self.graph.units() {
            if !selected.contains(&unit.name) {
                continue;
            }
            let Some(sources) = inventory.get(&unit.name) else {
                continue;
            };

            let includes = resolver.resolve(&unit.name, Capability::Includable)?;
            let imports = resolver.resolve(&unit.name, Capability::Importable)?;
            // Every unit whose BMIs reach this one, however indirectly
            producers.insert(
                unit.name.clone(),
                imports
                    .iter()
                    .filter_map(|dir| owners.get(dir.as_path()))
                    .filter(|owner| **owner != unit.name)
                    .map(|owner| owner.to_string())
                    .collect(),
            );
            commands.insert(
                unit.name.clone(),
                resolver
                    .resolve(&unit.name, Capability::CompileCommands)?
                    .into_vec(),
            );

            let own_modules = modules.get(&unit.name).map(Vec::as_slice).unwrap_or(&[]);
            let mut precompile = Vec::new();
            let mut compile = Vec::new();
            for (&language, files) in sources {
                let group = self.group(
                    unit,
                    language,
                    target,
                    files,
                    &includes,
                    &imports,
                    own_modules,
                    &by_dir,
                );
                match language.phase() {
                    PhaseKind::Precompile => precompile.push(group),
                    PhaseKind::Compile => compile.push(group),
                }
            }

            for (kind, groups) in [
                (PhaseKind::Precompile, precompile),
                (PhaseKind::Compile, compile),
            ] {
                if !groups.is_empty() {
                    phases.push(Phase {
                        unit: unit.name.clone(),
                        kind,
                        groups,
                    });
                }
            }
        }

        check_unique_outputs(&phases)?;
        let stages = stage(phases, &producers)?;

        let schedule = Schedule {
            target: target.clone(),
            stages,
            modules,
            commands,
            scope: units.map(|_| selected),
        };
        tracing::debug!(
            "planned {} action(s) in {} stage(s) for `{}`",
            schedule.action_count(),
            schedule.stages.len(),
            target
        );
        Ok(schedule)
    }

    /// Scan every unit's module interfaces and order them.
    fn module_records(
        &self,
        target: &Target,
        inventory: &Inventory,
    ) -> Result<BTreeMap<String, Vec<ModuleRecord>>, BuildError> {
        let mut records = BTreeMap::new();
        for (unit, by_language) in inventory {
            let Some(interfaces) = by_language.get(&Language::Ixx) else {
                continue;
            };
            let scanned = interfaces
                .iter()
                .map(|file| scan_interface(&file.path))
                .collect::<Result<Vec<_>, _>>()?;
            let waves = order_interfaces(unit, &scanned)?;

            let import_dir = self.layout.bmi_dir(unit, target);
            let mut unit_records: Vec<ModuleRecord> = scanned
                .into_iter()
                .zip(interfaces)
                .map(|(interface, file)| ModuleRecord {
                    wave: waves.get(&interface.name).copied().unwrap_or(0),
                    bmi: self
                        .layout
                        .output_path(unit, Language::Ixx, target, &file.relative),
                    import_dir: import_dir.clone(),
                    source: interface.source,
                    name: interface.name,
                })
                .collect();
            unit_records.sort_by(|a, b| a.name.cmp(&b.name));
            records.insert(unit.clone(), unit_records);
        }
        Ok(records)
    }

    #[allow(clippy::too_many_arguments)]
    fn group(
        &self,
        unit: &Unit,
        language: Language,
        target: &Target,
        files: &[SourceFile],
        includes: &SearchPaths,
        imports: &SearchPaths,
        own_modules: &[ModuleRecord],
        by_dir: &HashMap<&Path, &[ModuleRecord]>,
    ) -> ActionGroup {
        let own_dir = self.layout.bmi_dir(&unit.name, target);
        let mut options = self.base_options.clone();
        options.extend(unit.compile_options.iter().cloned());

        let mut actions: Vec<CompileAction> = files
            .iter()
            .map(|file| {
                let output = self
                    .layout
                    .output_path(&unit.name, language, target, &file.relative);

                // Interfaces see their own unit's BMIs only once an earlier
                // wave has produced them.
                let wave = match language {
                    Language::Ixx => own_modules
                        .iter()
                        .find(|r| r.source == file.path)
                        .map(|r| r.wave)
                        .unwrap_or(0),
                    _ => 0,
                };
                let visible_own = |record: &ModuleRecord| match language {
                    Language::Ixx => record.wave < wave,
                    _ => true,
                };

                let (import_paths, module_files) = if !language.is_module_enabled() {
                    (Vec::new(), Vec::new())
                } else {
                    let mut paths = imports.clone();
                    if own_modules.iter().any(visible_own) {
                        paths.prepend(own_dir.clone());
                    }
                    let mut module_files = Vec::new();
                    for dir in paths.iter() {
                        let records = by_dir.get(dir.as_path()).copied().unwrap_or(&[]);
                        for record in records {
                            if *dir == own_dir && !visible_own(record) {
                                continue;
                            }
                            module_files.push(ModuleFile {
                                name: record.name.clone(),
                                bmi: record.bmi.clone(),
                            });
                        }
                    }
                    (paths.into_vec(), module_files)
                };

                CompileAction {
                    unit: unit.name.clone(),
                    target: target.clone(),
                    language,
                    phase: language.phase(),
                    wave,
                    source: file.path.clone(),
                    output,
                    working_dir: self.working_dir.to_path_buf(),
                    options: options.clone(),
                    include_paths: includes.as_slice().to_vec(),
                    import_paths,
                    module_files,
                }
            })
            .collect();
        actions.sort_by_key(|a| a.wave);

        ActionGroup {
            unit: unit.name.clone(),
            language,
            target: target.clone(),
            phase: language.phase(),
            output_dir: self.layout.output_dir(&unit.name, language, target),
            commands_file: self.layout.commands_file(&unit.name, language, target),
            fingerprint_file: self.layout.fingerprint_file(&unit.name, language, target),
            actions,
        }
    }
}

/// Sequence phases into stages by their longest dependency chain.
///
/// `producers` maps each unit to the units whose BMIs it imports.
fn stage(
    phases: Vec<Phase>,
    producers: &BTreeMap<String, BTreeSet<String>>,
) -> Result<Vec<Stage>, BuildError> {
    let mut graph: DiGraph<(String, PhaseKind), ()> = DiGraph::new();
    let mut nodes: HashMap<(String, PhaseKind), NodeIndex> = HashMap::new();
    for phase in &phases {
        let key = (phase.unit.clone(), phase.kind);
        nodes.insert(key.clone(), graph.add_node(key));
    }

    let precompile = |unit: &str| nodes.get(&(unit.to_string(), PhaseKind::Precompile)).copied();
    let compile = |unit: &str| nodes.get(&(unit.to_string(), PhaseKind::Compile)).copied();

    let mut edges = Vec::new();
    for phase in &phases {
        if phase.kind != PhaseKind::Precompile {
            continue;
        }
        if let (Some(from), Some(to)) = (precompile(&phase.unit), compile(&phase.unit)) {
            edges.push((from, to));
        }
    }
    for (consumer, owners) in producers {
        for from in owners.iter().filter_map(|owner| precompile(owner)) {
            for to in [precompile(consumer), compile(consumer)]
                .into_iter()
                .flatten()
            {
                edges.push((from, to));
            }
        }
    }
    for (from, to) in edges {
        graph.update_edge(from, to, ());
    }

    let order = toposort(&graph, None).map_err(|cycle| BuildError::Cycle {
        units: phase_cycle(&graph, cycle.node_id()),
    })?;

    let mut levels: HashMap<NodeIndex, usize> = HashMap::new();
    for node in &order {
        let level = graph
            .neighbors_directed(*node, petgraph::Direction::Incoming)
            .map(|dep| levels.get(&dep).copied().unwrap_or(0) + 1)
            .max()
            .unwrap_or(0);
        levels.insert(*node, level);
    }

    let depth = levels.values().copied().max().map_or(0, |d| d + 1);
    let mut stages: Vec<Stage> = (0..depth).map(|_| Stage { phases: Vec::new() }).collect();
    for phase in phases {
        let node = nodes[&(phase.unit.clone(), phase.kind)];
        stages[levels[&node]].phases.push(phase);
    }
    Ok(stages)
}

/// Units taking part in a phase-graph cycle, first one repeated at the end.
fn phase_cycle(graph: &DiGraph<(String, PhaseKind), ()>, culprit: NodeIndex) -> Vec<String> {
    let mut units: Vec<String> = tarjan_scc(graph)
        .into_iter()
        .find(|scc| scc.len() > 1)
        .unwrap_or_else(|| vec![culprit])
        .into_iter()
        .map(|n| graph[n].0.clone())
        .collect();
    units.sort();
    units.dedup();
    if let Some(first) = units.first().cloned() {
        units.push(first);
    }
    units
}

fn check_unique_outputs(phases: &[Phase]) -> Result<(), BuildError> {
    let mut seen: HashMap<&Path, &Path> = HashMap::new();
    for action in phases
        .iter()
        .flat_map(|p| p.groups.iter())
        .flat_map(|g| g.actions.iter())
    {
        if let Some(first) = seen.insert(&action.output, &action.source) {
            return Err(BuildError::DuplicateOutput {
                output: action.output.clone(),
                first: first.to_path_buf(),
                second: action.source.clone(),
            });
        }
    }
    Ok(())
}
