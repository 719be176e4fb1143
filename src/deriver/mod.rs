//! Chunk graph derivation
//!
//! Walks the module graph from every entry and populates a fresh
//! [`ChunkGraph`]:
//!
//! 1. one entrypoint and one chunk per entry, in `depend_on` order
//! 2. a fixpoint over the group DAG computing, per group, the runtime it
//!    executes in and the modules guaranteed loaded on every path into it
//!    (the minimal available set)
//! 3. module placement: a group only receives modules its available set
//!    lacks, so nothing is duplicated below an ancestor that loads it
//! 4. group linking and cleanup of groups that contribute nothing

mod entries;

use std::collections::VecDeque;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use tracing::{debug, info, trace, warn};

use crate::chunk::{ChunkGroupKind, EntryOptions};
use crate::chunk_graph::ChunkGraph;
use crate::error::GraphResult;
use crate::graph::{ConnectionState, ModuleGraph};
use crate::runtime::RuntimeSpec;
use crate::ukey::{BlockId, ChunkGroupUkey, ChunkUkey, DependencyId, ModuleId, UkeyIndexSet};

pub use entries::{validate_entries, EntryData};

type ModuleSet = FxHashSet<ModuleId>;

/// Where a group's traversal starts
#[derive(Debug, Clone)]
enum Root {
    Modules(Vec<ModuleId>),
    Block(BlockId),
}

/// Per-group derivation state
#[derive(Debug)]
struct GroupState {
    /// Chunk receiving the group's modules
    chunk: ChunkUkey,
    roots: Vec<Root>,
    runtime: RuntimeSpec,
    /// Entrypoints have a fixed runtime and available set
    is_entry: bool,
    /// `None` until some parent has been processed
    min_available: Option<ModuleSet>,
    /// Result of the last traversal
    content: Vec<ModuleId>,
    post_order: Vec<ModuleId>,
    available: ModuleSet,
    /// Groups reached through async blocks, accumulated over traversals
    children: UkeyIndexSet<ChunkGroupUkey>,
    processed: bool,
}

impl GroupState {
    fn new(chunk: ChunkUkey, roots: Vec<Root>, runtime: RuntimeSpec, is_entry: bool) -> Self {
        Self {
            chunk,
            roots,
            runtime,
            is_entry,
            min_available: if is_entry { Some(ModuleSet::default()) } else { None },
            content: Vec::new(),
            post_order: Vec::new(),
            available: ModuleSet::default(),
            children: UkeyIndexSet::default(),
            processed: false,
        }
    }
}

/// Output of one group traversal
#[derive(Default)]
struct Visit {
    content: Vec<ModuleId>,
    post_order: Vec<ModuleId>,
    blocks: Vec<(Option<ModuleId>, BlockId)>,
}

enum Step {
    Enter(ModuleId, bool),
    Leave(ModuleId),
    Block(BlockId),
    Async(Option<ModuleId>, BlockId),
}

/// Derive a chunk graph from `module_graph` for the given entries.
///
/// A failure leaves nothing behind; callers retry by deriving again.
pub fn derive_chunk_graph(module_graph: &mut ModuleGraph, entries: &[EntryData]) -> GraphResult<ChunkGraph> {
    let order = validate_entries(entries)?;
    let mut deriver = GraphDeriver {
        module_graph,
        chunk_graph: ChunkGraph::new(),
        groups: IndexMap::new(),
        queue: VecDeque::new(),
        queued: FxHashSet::default(),
    };
    deriver.setup_entries(entries, &order)?;
    deriver.run_fixpoint()?;
    deriver.place_modules();
    deriver.link_groups();
    deriver.cleanup_groups();
    deriver.assign_chunk_runtimes();

    let chunk_graph = deriver.chunk_graph;
    debug_assert!(chunk_graph.check_consistency().is_ok());
    info!(
        "derived {} chunks in {} chunk groups",
        chunk_graph.chunk_count(),
        chunk_graph.chunk_groups().count()
    );
    Ok(chunk_graph)
}

struct GraphDeriver<'a> {
    module_graph: &'a mut ModuleGraph,
    chunk_graph: ChunkGraph,
    groups: IndexMap<ChunkGroupUkey, GroupState>,
    queue: VecDeque<ChunkGroupUkey>,
    queued: FxHashSet<ChunkGroupUkey>,
}

impl<'a> GraphDeriver<'a> {
    fn enqueue(&mut self, group: ChunkGroupUkey) {
        if self.queued.insert(group) {
            self.queue.push_back(group);
        }
    }

    // ---------------------------------------------------------------------
    // Entries
    // ---------------------------------------------------------------------

    fn setup_entries(&mut self, entries: &[EntryData], order: &[usize]) -> GraphResult<()> {
        for &idx in order {
            let entry = &entries[idx];
            debug!("setting up entry '{}'", entry.name);

            let mut options = entry.options.clone();
            options.name = Some(entry.name.clone());
            if options.runtime.as_deref() == Some(entry.name.as_str()) {
                options.runtime = None;
            }

            let entrypoint = self.chunk_graph.add_entrypoint(options.clone(), true);
            let chunk = self.chunk_graph.add_chunk(Some(entry.name.clone()));
            self.chunk_graph.connect_chunk_and_group(chunk, entrypoint);
            self.chunk_graph
                .chunk_group_mut(entrypoint)
                .set_entrypoint_chunk(chunk);
            for &module in &entry.modules {
                self.chunk_graph
                    .connect_chunk_and_entry_module(chunk, module, entrypoint);
            }

            let (runtime, min_available) = if options.depend_on.is_empty() {
                let runtime_chunk = match &options.runtime {
                    Some(name) => self.shared_runtime_chunk(name, entrypoint),
                    None => chunk,
                };
                self.chunk_graph
                    .chunk_group_mut(entrypoint)
                    .set_runtime_chunk(runtime_chunk);
                (RuntimeSpec::single(entry.runtime_name()), ModuleSet::default())
            } else {
                // runtime and loaded modules come from the entries depended on
                let mut runtime = RuntimeSpec::Set(Default::default());
                let mut available: Option<ModuleSet> = None;
                for target in &options.depend_on {
                    let Some(parent) = self.chunk_graph.entrypoint(target) else {
                        continue;
                    };
                    self.chunk_graph.connect_chunk_groups(parent, entrypoint);
                    let state = &self.groups[&parent];
                    runtime = runtime.merge(&state.runtime);
                    available = Some(match available {
                        None => state.available.clone(),
                        Some(set) => set.intersection(&state.available).copied().collect(),
                    });
                }
                (runtime, available.unwrap_or_default())
            };

            let mut state =
                GroupState::new(chunk, vec![Root::Modules(entry.modules.clone())], runtime, true);
            state.min_available = Some(min_available);
            self.groups.insert(entrypoint, state);
            // entries later in the order may depend on this one
            self.process_group(entrypoint)?;
        }
        Ok(())
    }

    /// Create or reuse the runtime chunk `name`, shared by every entry naming it
    fn shared_runtime_chunk(&mut self, name: &str, entrypoint: ChunkGroupUkey) -> ChunkUkey {
        let chunk = self.chunk_graph.add_chunk(Some(name.to_string()));
        self.chunk_graph.chunk_mut(chunk).prevent_integration = true;
        self.chunk_graph.unshift_chunk_into_group(chunk, entrypoint);
        trace!("runtime chunk '{}' shared with {:?}", name, entrypoint);
        chunk
    }

    // ---------------------------------------------------------------------
    // Fixpoint
    // ---------------------------------------------------------------------

    fn run_fixpoint(&mut self) -> GraphResult<()> {
        let mut rounds = 0usize;
        while let Some(group) = self.queue.pop_front() {
            self.queued.remove(&group);
            rounds += 1;
            self.process_group(group)?;
        }
        debug!("availability fixpoint reached after {} group visits", rounds);
        Ok(())
    }

    /// Traverse `group` with its current runtime and available set, then
    /// push the result into every child it reaches.
    fn process_group(&mut self, group: ChunkGroupUkey) -> GraphResult<()> {
        let (visit, runtime) = {
            let state = &self.groups[&group];
            let Some(min_available) = state.min_available.as_ref() else {
                return Ok(());
            };
            (
                self.traverse(&state.roots, &state.runtime, min_available),
                state.runtime.clone(),
            )
        };

        let mut children = UkeyIndexSet::default();
        for (origin, block) in visit.blocks.iter().copied() {
            children.insert(self.group_for_block(group, origin, block)?);
        }

        let state = &mut self.groups[&group];
        let mut available = state.min_available.clone().unwrap_or_default();
        available.extend(visit.content.iter().copied());
        state.content = visit.content;
        state.post_order = visit.post_order;
        state.available = available.clone();
        state.children.extend(children.iter().copied());
        state.processed = true;

        for child in state.children.clone() {
            let child_state = &mut self.groups[&child];
            if child_state.is_entry {
                if !child_state.processed {
                    self.enqueue(child);
                }
                continue;
            }

            let runtime = child_state.runtime.merge(&runtime);
            let min_available = match &child_state.min_available {
                None => available.clone(),
                Some(current) => current.intersection(&available).copied().collect(),
            };
            let changed = !child_state.processed
                || runtime != child_state.runtime
                || child_state.min_available.as_ref() != Some(&min_available);
            if changed {
                trace!(
                    "{:?} -> {:?}: {} modules available",
                    group,
                    child,
                    min_available.len()
                );
                child_state.runtime = runtime;
                child_state.min_available = Some(min_available);
                self.enqueue(child);
            }
        }
        Ok(())
    }

    fn dependency_steps(&self, dependencies: &[DependencyId], runtime: &RuntimeSpec, steps: &mut Vec<Step>) {
        for (target, state) in self.module_graph.dependency_targets(dependencies, runtime) {
            match state {
                ConnectionState::Never => {}
                ConnectionState::TransitiveOnly => steps.push(Step::Enter(target, false)),
                ConnectionState::Always | ConnectionState::Circular => {
                    steps.push(Step::Enter(target, true))
                }
            }
        }
    }

    fn block_steps(&self, origin: Option<ModuleId>, blocks: &[BlockId], steps: &mut Vec<Step>) {
        for &block in blocks {
            if self.module_graph.block(block).is_async_boundary() {
                steps.push(Step::Async(origin, block));
            } else {
                steps.push(Step::Block(block));
            }
        }
    }

    /// Depth-first walk from `roots`, stopping at available modules and
    /// async boundaries. Transitive-only targets are walked through but not
    /// added.
    fn traverse(&self, roots: &[Root], runtime: &RuntimeSpec, available: &ModuleSet) -> Visit {
        let mut visit = Visit::default();
        let mut added = ModuleSet::default();
        let mut expanded = ModuleSet::default();
        let mut seen_blocks: UkeyIndexSet<BlockId> = UkeyIndexSet::default();

        let mut initial = Vec::new();
        for root in roots {
            match root {
                Root::Modules(modules) => {
                    initial.extend(modules.iter().map(|m| Step::Enter(*m, true)))
                }
                Root::Block(block) => initial.push(Step::Block(*block)),
            }
        }
        let mut stack: Vec<Step> = initial.into_iter().rev().collect();

        while let Some(step) = stack.pop() {
            let mut next = Vec::new();
            match step {
                Step::Enter(module, add) => {
                    if available.contains(&module) {
                        continue;
                    }
                    let newly_added = add && added.insert(module);
                    if newly_added {
                        visit.content.push(module);
                    }
                    if expanded.insert(module) {
                        if newly_added {
                            stack.push(Step::Leave(module));
                        }
                        let m = self.module_graph.module(module);
                        self.dependency_steps(&m.dependencies, runtime, &mut next);
                        self.block_steps(Some(module), &m.blocks, &mut next);
                    } else if newly_added {
                        visit.post_order.push(module);
                    }
                }
                Step::Leave(module) => visit.post_order.push(module),
                Step::Block(block) => {
                    let b = self.module_graph.block(block);
                    self.dependency_steps(&b.dependencies, runtime, &mut next);
                    self.block_steps(Some(b.module), &b.blocks, &mut next);
                }
                Step::Async(origin, block) => {
                    if seen_blocks.insert(block) {
                        visit.blocks.push((origin, block));
                    }
                }
            }
            stack.extend(next.into_iter().rev());
        }
        visit
    }

    // ---------------------------------------------------------------------
    // Groups for async blocks
    // ---------------------------------------------------------------------

    fn group_for_block(
        &mut self,
        parent: ChunkGroupUkey,
        origin: Option<ModuleId>,
        block: BlockId,
    ) -> GraphResult<ChunkGroupUkey> {
        if let Some(existing) = self.chunk_graph.block_chunk_group(block) {
            return Ok(existing);
        }
        let b = self.module_graph.block(block).clone();

        let group = match &b.entry_options {
            Some(entry_options) => self.async_entrypoint_for_block(block, entry_options)?,
            None => self.chunk_group_for_block(block)?,
        };

        self.chunk_graph.set_block_chunk_group(block, group);
        self.chunk_graph
            .chunk_group_mut(group)
            .add_origin(origin, b.loc.clone(), b.request.clone());
        trace!("{:?} reaches {:?} through {:?}", parent, group, block);
        Ok(group)
    }

    fn chunk_group_for_block(&mut self, block: BlockId) -> GraphResult<ChunkGroupUkey> {
        let mut options = self
            .module_graph
            .block(block)
            .group_options
            .clone()
            .unwrap_or_default();

        if let Some(name) = options.name.clone() {
            if let Some(existing) = self.chunk_graph.named_chunk_group(&name) {
                if !self.chunk_graph.chunk_group(existing).is_entrypoint() {
                    self.chunk_graph.chunk_group_mut(existing).add_options(&options)?;
                    if let Some(state) = self.groups.get_mut(&existing) {
                        state.roots.push(Root::Block(block));
                        state.processed = false;
                    }
                    self.enqueue_if_reached(existing);
                    return Ok(existing);
                }
                warn!(
                    "async chunk '{}' is named after an entrypoint; loading it as a separate chunk",
                    name
                );
                options.name = None;
            }
        }

        let name = options.name.clone();
        let group = self.chunk_graph.add_chunk_group(options);
        let chunk = self.chunk_graph.add_chunk(name);
        self.chunk_graph.connect_chunk_and_group(chunk, group);
        self.groups.insert(
            group,
            GroupState::new(
                chunk,
                vec![Root::Block(block)],
                RuntimeSpec::Set(Default::default()),
                false,
            ),
        );
        debug!("created chunk group {:?} for {:?}", group, block);
        Ok(group)
    }

    fn enqueue_if_reached(&mut self, group: ChunkGroupUkey) {
        if self
            .groups
            .get(&group)
            .is_some_and(|state| state.min_available.is_some())
        {
            self.enqueue(group);
        }
    }

    /// Blocks carrying entry options start a new (non-initial) entrypoint
    /// with its own runtime chunk.
    fn async_entrypoint_for_block(
        &mut self,
        block: BlockId,
        entry_options: &EntryOptions,
    ) -> GraphResult<ChunkGroupUkey> {
        let modules: Vec<ModuleId> = self
            .module_graph
            .dependency_targets(&self.module_graph.block(block).dependencies, &RuntimeSpec::All)
            .into_iter()
            .filter(|(_, state)| state.is_active())
            .map(|(module, _)| module)
            .collect();

        let mut entry_options = entry_options.clone();
        if let Some(name) = entry_options.name.clone() {
            if let Some(existing) = self.chunk_graph.named_chunk_group(&name) {
                let existing_group = self.chunk_graph.chunk_group(existing);
                if matches!(existing_group.kind, ChunkGroupKind::Entrypoint { initial: false, .. }) {
                    self.extend_async_entrypoint(existing, modules);
                    return Ok(existing);
                }
                warn!(
                    "async entrypoint '{}' clashes with an existing chunk group; emitting it unnamed",
                    name
                );
                entry_options.name = None;
            }
        }

        let entrypoint = self
            .chunk_graph
            .add_entrypoint(entry_options.clone(), false);
        let chunk = self.chunk_graph.add_chunk(entry_options.name.clone());
        self.chunk_graph.connect_chunk_and_group(chunk, entrypoint);
        {
            let group = self.chunk_graph.chunk_group_mut(entrypoint);
            group.set_entrypoint_chunk(chunk);
            group.set_runtime_chunk(chunk);
        }
        for &module in &modules {
            self.chunk_graph
                .connect_chunk_and_entry_module(chunk, module, entrypoint);
        }

        let runtime_name = entry_options
            .runtime
            .clone()
            .or_else(|| entry_options.name.clone())
            .unwrap_or_else(|| self.chunk_graph.chunk(chunk).display_name());
        self.groups.insert(
            entrypoint,
            GroupState::new(
                chunk,
                vec![Root::Modules(modules)],
                RuntimeSpec::single(runtime_name),
                true,
            ),
        );
        debug!("created async entrypoint {:?} for {:?}", entrypoint, block);
        Ok(entrypoint)
    }

    /// A same-named worker block reuses the entrypoint; its targets become
    /// additional entry modules and traversal roots.
    fn extend_async_entrypoint(&mut self, entrypoint: ChunkGroupUkey, modules: Vec<ModuleId>) {
        let Some(state) = self.groups.get_mut(&entrypoint) else {
            return;
        };
        let chunk = state.chunk;
        for &module in &modules {
            self.chunk_graph
                .connect_chunk_and_entry_module(chunk, module, entrypoint);
        }
        state.roots.push(Root::Modules(modules));
        state.processed = false;
        self.enqueue_if_reached(entrypoint);
    }

    // ---------------------------------------------------------------------
    // Materialization
    // ---------------------------------------------------------------------

    fn place_modules(&mut self) {
        let mut pre_counter = 0;
        let mut post_counter = 0;
        for (&group, state) in &self.groups {
            if state.min_available.is_none() {
                continue;
            }
            for &module in &state.content {
                self.chunk_graph.connect_chunk_and_module(state.chunk, module);
            }

            let chunk_group = self.chunk_graph.chunk_group_mut(group);
            for (index, &module) in state.content.iter().enumerate() {
                chunk_group.set_module_pre_order_index(module, index);
                if self.module_graph.set_pre_order_index_if_unset(module, pre_counter) {
                    pre_counter += 1;
                }
            }
            for (index, &module) in state.post_order.iter().enumerate() {
                chunk_group.set_module_post_order_index(module, index);
                if self.module_graph.set_post_order_index_if_unset(module, post_counter) {
                    post_counter += 1;
                }
            }
        }
    }

    /// Link each group to the children it reached, skipping children that
    /// add nothing to what the parent already provides.
    fn link_groups(&mut self) {
        for (&parent, state) in &self.groups {
            if state.min_available.is_none() {
                continue;
            }
            for &child in &state.children {
                let child_state = &self.groups[&child];
                if child_state.is_entry {
                    self.chunk_graph.add_async_entrypoint_to(parent, child);
                    continue;
                }
                let contributes = child_state
                    .content
                    .iter()
                    .any(|module| !state.available.contains(module));
                if contributes || !child_state.children.is_empty() {
                    self.chunk_graph.connect_chunk_groups(parent, child);
                } else {
                    trace!("{:?} adds nothing below {:?}; not linked", child, parent);
                }
            }
        }
    }

    /// Remove non-entry groups without parents, and chunks left without groups
    fn cleanup_groups(&mut self) {
        loop {
            let orphans: Vec<ChunkGroupUkey> = self
                .chunk_graph
                .chunk_groups()
                .filter(|group| !group.is_entrypoint() && group.parent_count() == 0)
                .map(|group| group.ukey)
                .collect();
            if orphans.is_empty() {
                break;
            }
            for group in orphans {
                let chunks = self.chunk_graph.chunk_group(group).chunks().to_vec();
                debug!("removing unused chunk group {:?}", group);
                self.chunk_graph.remove_chunk_group(group);
                self.groups.shift_remove(&group);
                for chunk in chunks {
                    if self.chunk_graph.chunk(chunk).group_count() == 0 {
                        self.chunk_graph.remove_chunk(chunk);
                    }
                }
            }
        }
    }

    /// A chunk runs in every runtime of the groups containing it
    fn assign_chunk_runtimes(&mut self) {
        for chunk in self.chunk_graph.chunk_ukeys() {
            let runtime = self
                .chunk_graph
                .chunk(chunk)
                .groups()
                .filter_map(|group| self.groups.get(&group))
                .fold(RuntimeSpec::Set(Default::default()), |acc, state| {
                    acc.merge(&state.runtime)
                });
            self.chunk_graph.chunk_mut(chunk).runtime = runtime;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkGroupOptions;
    use crate::graph::{ActivationCondition, AsyncBlock, Dependency, DependencyParent, Module};

    fn module(mg: &mut ModuleGraph, id: &str) -> ModuleId {
        mg.add_module(Module::new(id, 10))
    }

    fn import(mg: &mut ModuleGraph, from: ModuleId, to: ModuleId) {
        let dep = mg.add_dependency(Dependency::new(DependencyParent::Module(from), "./x"));
        mg.connect(Some(from), dep, to);
    }

    fn dynamic_import(mg: &mut ModuleGraph, from: ModuleId, to: ModuleId, name: Option<&str>) -> BlockId {
        let options = match name {
            Some(name) => ChunkGroupOptions::named(name),
            None => ChunkGroupOptions::default(),
        };
        let block = mg.add_block(AsyncBlock::new(from).with_group_options(options));
        let dep = mg.add_dependency(Dependency::new(DependencyParent::Block(block), "./lazy"));
        mg.connect(Some(from), dep, to);
        block
    }

    fn chunk_modules(mg: &ModuleGraph, cg: &ChunkGraph, name: &str) -> Vec<String> {
        let chunk = cg.named_chunk(name).unwrap();
        cg.chunk_module_identifiers(chunk, mg)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_sync_imports_share_the_entry_chunk() {
        let mut mg = ModuleGraph::new();
        let index = module(&mut mg, "index");
        let util = module(&mut mg, "util");
        import(&mut mg, index, util);
        let cg = derive_chunk_graph(&mut mg, &[EntryData::new("main", vec![index])]).unwrap();
        assert_eq!(chunk_modules(&mg, &cg, "main"), vec!["index", "util"]);
        assert_eq!(cg.chunk_count(), 1);
        let entry = cg.entrypoint("main").unwrap();
        assert_eq!(
            cg.chunk_group(entry).get_runtime_chunk(cg.chunk_groups_by_ukey()),
            cg.named_chunk("main")
        );
    }

    #[test]
    fn test_dynamic_import_creates_child_group() {
        let mut mg = ModuleGraph::new();
        let index = module(&mut mg, "index");
        let lazy = module(&mut mg, "lazy");
        let block = dynamic_import(&mut mg, index, lazy, Some("lazy"));
        let cg = derive_chunk_graph(&mut mg, &[EntryData::new("main", vec![index])]).unwrap();

        assert_eq!(chunk_modules(&mg, &cg, "main"), vec!["index"]);
        assert_eq!(chunk_modules(&mg, &cg, "lazy"), vec!["lazy"]);
        let entry = cg.entrypoint("main").unwrap();
        let group = cg.block_chunk_group(block).unwrap();
        assert!(cg.chunk_group(entry).has_child(group));
        assert_eq!(cg.chunk_group(group).origins()[0].module, Some(index));
    }

    #[test]
    fn test_available_modules_are_not_duplicated() {
        let mut mg = ModuleGraph::new();
        let index = module(&mut mg, "index");
        let shared = module(&mut mg, "shared");
        let lazy = module(&mut mg, "lazy");
        import(&mut mg, index, shared);
        dynamic_import(&mut mg, index, lazy, Some("lazy"));
        import(&mut mg, lazy, shared);
        let cg = derive_chunk_graph(&mut mg, &[EntryData::new("main", vec![index])]).unwrap();
        assert_eq!(chunk_modules(&mg, &cg, "lazy"), vec!["lazy"]);
    }

    #[test]
    fn test_import_of_loaded_module_is_dropped() {
        let mut mg = ModuleGraph::new();
        let index = module(&mut mg, "index");
        let util = module(&mut mg, "util");
        import(&mut mg, index, util);
        dynamic_import(&mut mg, index, util, Some("again"));
        let cg = derive_chunk_graph(&mut mg, &[EntryData::new("main", vec![index])]).unwrap();
        assert!(cg.named_chunk("again").is_none());
        assert!(cg.named_chunk_group("again").is_none());
        assert_eq!(cg.chunk_count(), 1);
    }

    #[test]
    fn test_same_named_blocks_reuse_group() {
        let mut mg = ModuleGraph::new();
        let index = module(&mut mg, "index");
        let a = module(&mut mg, "a");
        let b = module(&mut mg, "b");
        dynamic_import(&mut mg, index, a, Some("pages"));
        dynamic_import(&mut mg, index, b, Some("pages"));
        let cg = derive_chunk_graph(&mut mg, &[EntryData::new("main", vec![index])]).unwrap();
        assert_eq!(chunk_modules(&mg, &cg, "pages"), vec!["a", "b"]);
        assert_eq!(cg.chunk_count(), 2);
    }

    #[test]
    fn test_transitive_only_walks_through() {
        let mut mg = ModuleGraph::new();
        let index = module(&mut mg, "index");
        let reexport = module(&mut mg, "reexport");
        let leaf = module(&mut mg, "leaf");
        let dep = mg.add_dependency(
            Dependency::new(DependencyParent::Module(index), "./reexport")
                .with_condition(ActivationCondition::TransitiveOnly),
        );
        mg.connect(Some(index), dep, reexport);
        import(&mut mg, reexport, leaf);
        let cg = derive_chunk_graph(&mut mg, &[EntryData::new("main", vec![index])]).unwrap();
        assert_eq!(chunk_modules(&mg, &cg, "main"), vec!["index", "leaf"]);
    }

    #[test]
    fn test_runtime_conditional_dependency() {
        let mut mg = ModuleGraph::new();
        let web = module(&mut mg, "web");
        let node = module(&mut mg, "node");
        let polyfill = module(&mut mg, "polyfill");
        for from in [web, node] {
            let dep = mg.add_dependency(
                Dependency::new(DependencyParent::Module(from), "./polyfill").with_condition(
                    ActivationCondition::Runtimes(RuntimeSpec::single("web")),
                ),
            );
            mg.connect(Some(from), dep, polyfill);
        }
        let cg = derive_chunk_graph(
            &mut mg,
            &[EntryData::new("web", vec![web]), EntryData::new("node", vec![node])],
        )
        .unwrap();
        assert_eq!(chunk_modules(&mg, &cg, "web"), vec!["polyfill", "web"]);
        assert_eq!(chunk_modules(&mg, &cg, "node"), vec!["node"]);
        assert_eq!(
            cg.chunk(cg.named_chunk("web").unwrap()).runtime,
            RuntimeSpec::single("web")
        );
    }

    #[test]
    fn test_shared_runtime_chunk() {
        let mut mg = ModuleGraph::new();
        let a = module(&mut mg, "a");
        let b = module(&mut mg, "b");
        let cg = derive_chunk_graph(
            &mut mg,
            &[
                EntryData::new("a", vec![a]).runtime("runtime"),
                EntryData::new("b", vec![b]).runtime("runtime"),
            ],
        )
        .unwrap();
        let runtime = cg.named_chunk("runtime").unwrap();
        assert!(cg.chunk(runtime).prevent_integration);
        for name in ["a", "b"] {
            let entry = cg.entrypoint(name).unwrap();
            assert_eq!(cg.chunk_group(entry).chunks()[0], runtime);
            assert_eq!(cg.chunk_group(entry).own_runtime_chunk(), Some(runtime));
        }
        assert_eq!(cg.chunk(runtime).runtime, RuntimeSpec::single("runtime"));
    }

    #[test]
    fn test_async_entrypoint_is_recorded_not_linked() {
        let mut mg = ModuleGraph::new();
        let index = module(&mut mg, "index");
        let worker = module(&mut mg, "worker");
        let block = mg.add_block(AsyncBlock::new(index).with_entry_options(EntryOptions {
            name: Some("worker".into()),
            ..Default::default()
        }));
        let dep = mg.add_dependency(Dependency::new(DependencyParent::Block(block), "./worker"));
        mg.connect(Some(index), dep, worker);

        let cg = derive_chunk_graph(&mut mg, &[EntryData::new("main", vec![index])]).unwrap();
        let main = cg.entrypoint("main").unwrap();
        let worker_group = cg.named_chunk_group("worker").unwrap();
        assert!(!cg.chunk_group(main).has_child(worker_group));
        assert_eq!(
            cg.chunk_group(main).async_entrypoints().collect::<Vec<_>>(),
            vec![worker_group]
        );
        assert!(!cg.chunk_group(worker_group).is_initial());
        assert_eq!(chunk_modules(&mg, &cg, "worker"), vec!["worker"]);
        assert_eq!(cg.async_entrypoints(), &[worker_group]);
    }

    #[test]
    fn test_same_named_workers_share_entrypoint() {
        let mut mg = ModuleGraph::new();
        let index = module(&mut mg, "index");
        let a = module(&mut mg, "a");
        let first = module(&mut mg, "first-worker");
        let second = module(&mut mg, "second-worker");
        import(&mut mg, index, a);
        for (from, to) in [(index, first), (a, second)] {
            let block = mg.add_block(AsyncBlock::new(from).with_entry_options(EntryOptions {
                name: Some("w".into()),
                ..Default::default()
            }));
            let dep = mg.add_dependency(Dependency::new(DependencyParent::Block(block), "./w"));
            mg.connect(Some(from), dep, to);
        }

        let cg = derive_chunk_graph(&mut mg, &[EntryData::new("main", vec![index])]).unwrap();
        assert_eq!(
            chunk_modules(&mg, &cg, "w"),
            vec!["first-worker", "second-worker"]
        );
        let chunk = cg.named_chunk("w").unwrap();
        assert_eq!(cg.chunk(chunk).group_count(), 1);
        assert_eq!(cg.async_entrypoints().len(), 1);
        assert_eq!(cg.number_of_entry_modules(chunk), 2);
        assert_eq!(chunk_modules(&mg, &cg, "main"), vec!["a", "index"]);
        cg.check_consistency().unwrap();
    }

    #[test]
    fn test_group_ordinals() {
        let mut mg = ModuleGraph::new();
        let index = module(&mut mg, "index");
        let a = module(&mut mg, "a");
        let b = module(&mut mg, "b");
        import(&mut mg, index, a);
        import(&mut mg, a, b);
        let cg = derive_chunk_graph(&mut mg, &[EntryData::new("main", vec![index])]).unwrap();
        let group = cg.chunk_group(cg.entrypoint("main").unwrap());
        assert_eq!(group.module_pre_order_index(index), Some(0));
        assert_eq!(group.module_pre_order_index(b), Some(2));
        assert_eq!(group.module_post_order_index(b), Some(0));
        assert_eq!(group.module_post_order_index(index), Some(2));
        assert_eq!(mg.pre_order_index(a), Some(1));
    }
}
