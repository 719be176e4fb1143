//! The chunk graph
//!
//! [`ChunkGraph`] owns the chunk and chunk group arenas of one build together
//! with the bipartite module/chunk association and all per-runtime metadata
//! (ids, hashes, runtime requirements). Chunks and groups never outlive the
//! chunk graph that created them.

mod integration;
mod module_info;

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::chunk::{
    Chunk, ChunkGroup, ChunkGroupByUkey, ChunkGroupOptions, EntryOptions, ORDER_SUFFIX,
};
use crate::error::{GraphError, GraphResult};
use crate::graph::ModuleGraph;
use crate::runtime::RuntimeSpec;
use crate::ukey::{
    BlockId, ChunkGroupUkey, ChunkUkey, ModuleId, UkeyAllocator, UkeyIndexMap, UkeyIndexSet,
};

pub use integration::ChunkSizeOptions;
pub use module_info::{ChunkGraphChunk, ChunkGraphModule, ModuleHashes};

/// Bipartite association between chunks and modules, plus the chunk arenas
#[derive(Debug, Default)]
pub struct ChunkGraph {
    chunk_by_ukey: UkeyIndexMap<ChunkUkey, Chunk>,
    chunk_group_by_ukey: ChunkGroupByUkey,

    named_chunks: BTreeMap<String, ChunkUkey>,
    named_chunk_groups: BTreeMap<String, ChunkGroupUkey>,
    entrypoints: IndexMap<String, ChunkGroupUkey>,
    async_entrypoints: Vec<ChunkGroupUkey>,

    /// Async block -> the chunk group it spawned
    block_to_chunk_group: FxHashMap<BlockId, ChunkGroupUkey>,

    chunk_graph_module_by_module: FxHashMap<ModuleId, ChunkGraphModule>,
    chunk_graph_chunk_by_chunk: FxHashMap<ChunkUkey, ChunkGraphChunk>,

    runtime_ids: BTreeMap<String, Option<String>>,

    chunk_keys: UkeyAllocator,
    group_keys: UkeyAllocator,
    next_debug_id: u32,
    next_group_index: usize,
}

impl ChunkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------------
    // Arenas
    // ---------------------------------------------------------------------

    /// Create a chunk; a named chunk is reused if it already exists
    pub fn add_chunk(&mut self, name: Option<String>) -> ChunkUkey {
        if let Some(existing) = name.as_ref().and_then(|n| self.named_chunks.get(n)) {
            return *existing;
        }
        let ukey: ChunkUkey = self.chunk_keys.alloc();
        let chunk = Chunk::new(ukey, name.clone(), self.next_debug_id);
        self.next_debug_id += 1;
        if let Some(name) = name {
            self.named_chunks.insert(name, ukey);
        }
        self.chunk_by_ukey.insert(ukey, chunk);
        self.chunk_graph_chunk_by_chunk
            .insert(ukey, ChunkGraphChunk::default());
        trace!("created {:?}", ukey);
        ukey
    }

    /// Create a plain chunk group (async split point)
    pub fn add_chunk_group(&mut self, options: ChunkGroupOptions) -> ChunkGroupUkey {
        let ukey: ChunkGroupUkey = self.group_keys.alloc();
        let mut group = ChunkGroup::new(ukey, options);
        group.index = Some(self.next_group_index);
        self.next_group_index += 1;
        if let Some(name) = group.name() {
            self.named_chunk_groups.insert(name.to_string(), ukey);
        }
        self.chunk_group_by_ukey.insert(ukey, group);
        ukey
    }

    /// Create an entrypoint. Initial entrypoints are registered by name,
    /// async ones in creation order.
    pub fn add_entrypoint(&mut self, options: EntryOptions, initial: bool) -> ChunkGroupUkey {
        let ukey: ChunkGroupUkey = self.group_keys.alloc();
        let mut group = ChunkGroup::new_entrypoint(ukey, options, initial);
        group.index = Some(self.next_group_index);
        self.next_group_index += 1;
        if let Some(name) = group.name() {
            self.named_chunk_groups.insert(name.to_string(), ukey);
            if initial {
                self.entrypoints.insert(name.to_string(), ukey);
            }
        }
        if !initial {
            self.async_entrypoints.push(ukey);
        }
        self.chunk_group_by_ukey.insert(ukey, group);
        ukey
    }

    pub fn chunk(&self, ukey: ChunkUkey) -> &Chunk {
        &self.chunk_by_ukey[&ukey]
    }

    pub fn chunk_mut(&mut self, ukey: ChunkUkey) -> &mut Chunk {
        &mut self.chunk_by_ukey[&ukey]
    }

    pub fn try_chunk(&self, ukey: ChunkUkey) -> Option<&Chunk> {
        self.chunk_by_ukey.get(&ukey)
    }

    pub fn chunk_group(&self, ukey: ChunkGroupUkey) -> &ChunkGroup {
        &self.chunk_group_by_ukey[&ukey]
    }

    pub fn chunk_group_mut(&mut self, ukey: ChunkGroupUkey) -> &mut ChunkGroup {
        &mut self.chunk_group_by_ukey[&ukey]
    }

    pub fn try_chunk_group(&self, ukey: ChunkGroupUkey) -> Option<&ChunkGroup> {
        self.chunk_group_by_ukey.get(&ukey)
    }

    /// The group arena, for chunk methods that need to inspect groups
    pub fn chunk_groups_by_ukey(&self) -> &ChunkGroupByUkey {
        &self.chunk_group_by_ukey
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunk_by_ukey.values()
    }

    pub fn chunk_ukeys(&self) -> Vec<ChunkUkey> {
        self.chunk_by_ukey.keys().copied().collect()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_by_ukey.len()
    }

    pub fn chunk_groups(&self) -> impl Iterator<Item = &ChunkGroup> {
        self.chunk_group_by_ukey.values()
    }

    pub fn named_chunk(&self, name: &str) -> Option<ChunkUkey> {
        self.named_chunks.get(name).copied()
    }

    pub fn named_chunk_group(&self, name: &str) -> Option<ChunkGroupUkey> {
        self.named_chunk_groups.get(name).copied()
    }

    pub fn entrypoint(&self, name: &str) -> Option<ChunkGroupUkey> {
        self.entrypoints.get(name).copied()
    }

    pub fn entrypoints(&self) -> impl Iterator<Item = (&str, ChunkGroupUkey)> {
        self.entrypoints
            .iter()
            .map(|(name, ukey)| (name.as_str(), *ukey))
    }

    pub fn async_entrypoints(&self) -> &[ChunkGroupUkey] {
        &self.async_entrypoints
    }

    pub fn block_chunk_group(&self, block: BlockId) -> Option<ChunkGroupUkey> {
        self.block_to_chunk_group.get(&block).copied()
    }

    pub(crate) fn set_block_chunk_group(&mut self, block: BlockId, group: ChunkGroupUkey) {
        self.block_to_chunk_group.insert(block, group);
    }

    /// Rename a chunk, keeping the name index in sync
    pub fn set_chunk_name(&mut self, ukey: ChunkUkey, name: Option<String>) {
        let chunk = &mut self.chunk_by_ukey[&ukey];
        if let Some(old) = chunk.name.take() {
            if self.named_chunks.get(&old) == Some(&ukey) {
                self.named_chunks.remove(&old);
            }
        }
        if let Some(name) = &name {
            self.named_chunks.insert(name.clone(), ukey);
        }
        chunk.name = name;
    }

    // ---------------------------------------------------------------------
    // Chunk <-> group and group <-> group relations
    // ---------------------------------------------------------------------

    /// Append `chunk` to `group` and record the membership on the chunk
    pub fn connect_chunk_and_group(&mut self, chunk: ChunkUkey, group: ChunkGroupUkey) -> bool {
        let pushed = self.chunk_group_by_ukey[&group].push_chunk(chunk);
        self.chunk_by_ukey[&chunk].add_group(group);
        pushed
    }

    /// Put `chunk` first in `group` and record the membership on the chunk
    pub fn unshift_chunk_into_group(&mut self, chunk: ChunkUkey, group: ChunkGroupUkey) -> bool {
        let changed = self.chunk_group_by_ukey[&group].unshift_chunk(chunk);
        self.chunk_by_ukey[&chunk].add_group(group);
        changed
    }

    pub fn disconnect_chunk_and_group(&mut self, chunk: ChunkUkey, group: ChunkGroupUkey) -> bool {
        let removed = self
            .chunk_group_by_ukey
            .get_mut(&group)
            .is_some_and(|g| g.remove_chunk(chunk));
        if let Some(c) = self.chunk_by_ukey.get_mut(&chunk) {
            c.remove_group(group);
        }
        removed
    }

    /// Link `child` under `parent` on both sides
    pub fn connect_chunk_groups(&mut self, parent: ChunkGroupUkey, child: ChunkGroupUkey) -> bool {
        let added = self.chunk_group_by_ukey[&parent].add_child(child);
        self.chunk_group_by_ukey[&child].add_parent(parent);
        added
    }

    pub fn disconnect_chunk_groups(&mut self, parent: ChunkGroupUkey, child: ChunkGroupUkey) -> bool {
        let removed = self.chunk_group_by_ukey[&parent].remove_child(child);
        self.chunk_group_by_ukey[&child].remove_parent(parent);
        removed
    }

    pub(crate) fn add_async_entrypoint_to(&mut self, group: ChunkGroupUkey, entrypoint: ChunkGroupUkey) {
        self.chunk_group_by_ukey[&group].add_async_entrypoint(entrypoint);
    }

    /// Delete a group, reconnecting every parent to every child so that
    /// reachability through it is preserved, then detach its chunks.
    pub fn remove_chunk_group(&mut self, ukey: ChunkGroupUkey) {
        let Some(group) = self.chunk_group_by_ukey.get_mut(&ukey) else {
            return;
        };
        let (parents, children) = group.take_relations();
        let chunks = group.chunks.clone();

        for &parent in &parents {
            if let Some(p) = self.chunk_group_by_ukey.get_mut(&parent) {
                p.remove_child(ukey);
            }
            for &child in &children {
                if child != parent {
                    self.connect_chunk_groups(parent, child);
                }
            }
        }
        for &child in &children {
            if let Some(c) = self.chunk_group_by_ukey.get_mut(&child) {
                c.remove_parent(ukey);
            }
        }
        for chunk in chunks {
            if let Some(c) = self.chunk_by_ukey.get_mut(&chunk) {
                c.remove_group(ukey);
            }
        }

        let Some(group) = self.chunk_group_by_ukey.shift_remove(&ukey) else {
            return;
        };
        if let Some(name) = group.name() {
            if self.named_chunk_groups.get(name) == Some(&ukey) {
                self.named_chunk_groups.remove(name);
            }
            if self.entrypoints.get(name) == Some(&ukey) {
                self.entrypoints.shift_remove(name);
            }
        }
        self.async_entrypoints.retain(|e| *e != ukey);
        self.block_to_chunk_group.retain(|_, g| *g != ukey);
        for other in self.chunk_group_by_ukey.values_mut() {
            other.remove_async_entrypoint(ukey);
        }
        trace!("removed {:?}", ukey);
    }

    /// Delete a chunk: detach it from its groups and drop its bookkeeping
    pub fn remove_chunk(&mut self, ukey: ChunkUkey) {
        let groups: Vec<ChunkGroupUkey> = match self.chunk_by_ukey.get(&ukey) {
            Some(chunk) => chunk.groups().collect(),
            None => return,
        };
        for group in groups {
            self.disconnect_chunk_and_group(ukey, group);
        }
        self.disconnect_chunk(ukey);
        self.chunk_graph_chunk_by_chunk.remove(&ukey);
        if let Some(chunk) = self.chunk_by_ukey.shift_remove(&ukey) {
            if let Some(name) = chunk.name {
                if self.named_chunks.get(&name) == Some(&ukey) {
                    self.named_chunks.remove(&name);
                }
            }
        }
        trace!("removed {:?}", ukey);
    }

    // ---------------------------------------------------------------------
    // Module <-> chunk association
    // ---------------------------------------------------------------------

    fn cgm_mut(&mut self, module: ModuleId) -> &mut ChunkGraphModule {
        self.chunk_graph_module_by_module.entry(module).or_default()
    }

    fn cgc_mut(&mut self, chunk: ChunkUkey) -> &mut ChunkGraphChunk {
        self.chunk_graph_chunk_by_chunk.entry(chunk).or_default()
    }

    pub fn chunk_graph_module(&self, module: ModuleId) -> Option<&ChunkGraphModule> {
        self.chunk_graph_module_by_module.get(&module)
    }

    pub fn chunk_graph_chunk(&self, chunk: ChunkUkey) -> Option<&ChunkGraphChunk> {
        self.chunk_graph_chunk_by_chunk.get(&chunk)
    }

    pub fn connect_chunk_and_module(&mut self, chunk: ChunkUkey, module: ModuleId) -> bool {
        self.cgm_mut(module).chunks.insert(chunk);
        self.cgc_mut(chunk).add_module(module)
    }

    pub fn disconnect_chunk_and_module(&mut self, chunk: ChunkUkey, module: ModuleId) -> bool {
        if let Some(cgm) = self.chunk_graph_module_by_module.get_mut(&module) {
            cgm.chunks.shift_remove(&chunk);
        }
        let Some(cgc) = self.chunk_graph_chunk_by_chunk.get_mut(&chunk) else {
            return false;
        };
        cgc.entry_modules.shift_remove(&module);
        if let Some(cgm) = self.chunk_graph_module_by_module.get_mut(&module) {
            if let Some(entries) = cgm.entry_in_chunks.as_mut() {
                entries.shift_remove(&chunk);
            }
        }
        cgc.remove_module(module)
    }

    /// Remove every regular and entry module from `chunk`
    pub fn disconnect_chunk(&mut self, chunk: ChunkUkey) {
        let modules: Vec<ModuleId> = self.modules_of_chunk(chunk).collect();
        for module in modules {
            self.disconnect_chunk_and_module(chunk, module);
        }
        let runtime_modules: Vec<ModuleId> = self
            .chunk_graph_chunk(chunk)
            .map(|cgc| cgc.runtime_modules.iter().copied().collect())
            .unwrap_or_default();
        for module in runtime_modules {
            self.disconnect_chunk_and_runtime_module(chunk, module);
        }
    }

    pub fn is_module_in_chunk(&self, module: ModuleId, chunk: ChunkUkey) -> bool {
        self.chunk_graph_chunk(chunk)
            .is_some_and(|cgc| cgc.modules.contains(&module))
    }

    /// Chunks containing `module`, in insertion order
    pub fn chunks_of_module(&self, module: ModuleId) -> Vec<ChunkUkey> {
        self.chunk_graph_module(module)
            .map(|cgm| cgm.chunks.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn number_of_module_chunks(&self, module: ModuleId) -> usize {
        self.chunk_graph_module(module)
            .map_or(0, |cgm| cgm.chunks.len())
    }

    pub fn modules_of_chunk(&self, chunk: ChunkUkey) -> impl Iterator<Item = ModuleId> + '_ {
        self.chunk_graph_chunk(chunk)
            .into_iter()
            .flat_map(|cgc| cgc.modules.iter().copied())
    }

    pub fn number_of_chunk_modules(&self, chunk: ChunkUkey) -> usize {
        self.chunk_graph_chunk(chunk).map_or(0, |cgc| cgc.modules.len())
    }

    /// Modules of `chunk` sorted by identifier, memoized per chunk generation
    pub fn chunk_modules_sorted(&self, chunk: ChunkUkey, module_graph: &ModuleGraph) -> Vec<ModuleId> {
        let Some(cgc) = self.chunk_graph_chunk(chunk) else {
            return Vec::new();
        };
        cgc.sorted_modules.get_or_compute(cgc.generation, || {
            let mut modules: Vec<ModuleId> = cgc.modules.iter().copied().collect();
            modules.sort_by(|a, b| module_graph.identifier(*a).cmp(module_graph.identifier(*b)));
            modules
        })
    }

    /// Modules of `chunk` ordered by a caller-supplied comparator (stable)
    pub fn ordered_chunk_modules(
        &self,
        chunk: ChunkUkey,
        mut compare: impl FnMut(ModuleId, ModuleId) -> Ordering,
    ) -> Vec<ModuleId> {
        let mut modules: Vec<ModuleId> = self.modules_of_chunk(chunk).collect();
        modules.sort_by(|a, b| compare(*a, *b));
        modules
    }

    pub fn chunk_module_identifiers<'a>(
        &self,
        chunk: ChunkUkey,
        module_graph: &'a ModuleGraph,
    ) -> Vec<&'a str> {
        self.chunk_modules_sorted(chunk, module_graph)
            .into_iter()
            .map(|m| module_graph.identifier(m))
            .collect()
    }

    pub fn chunk_modules_size(&self, chunk: ChunkUkey, module_graph: &ModuleGraph) -> u64 {
        self.modules_of_chunk(chunk)
            .map(|m| module_graph.module(m).size)
            .sum()
    }

    // ---------------------------------------------------------------------
    // Entry modules
    // ---------------------------------------------------------------------

    /// Bind `module` as an entry module of `chunk`, owned by `entrypoint`.
    /// The module also becomes a regular member of the chunk.
    pub fn connect_chunk_and_entry_module(
        &mut self,
        chunk: ChunkUkey,
        module: ModuleId,
        entrypoint: ChunkGroupUkey,
    ) {
        self.connect_chunk_and_module(chunk, module);
        self.cgm_mut(module)
            .entry_in_chunks
            .get_or_insert_with(UkeyIndexSet::default)
            .insert(chunk);
        self.cgc_mut(chunk).entry_modules.insert(module, entrypoint);
    }

    pub fn disconnect_chunk_and_entry_module(&mut self, chunk: ChunkUkey, module: ModuleId) {
        if let Some(entries) = self
            .chunk_graph_module_by_module
            .get_mut(&module)
            .and_then(|cgm| cgm.entry_in_chunks.as_mut())
        {
            entries.shift_remove(&chunk);
        }
        if let Some(cgc) = self.chunk_graph_chunk_by_chunk.get_mut(&chunk) {
            cgc.entry_modules.shift_remove(&module);
        }
    }

    pub fn entry_modules_with_group(&self, chunk: ChunkUkey) -> Vec<(ModuleId, ChunkGroupUkey)> {
        self.chunk_graph_chunk(chunk)
            .map(|cgc| cgc.entry_modules.iter().map(|(m, g)| (*m, *g)).collect())
            .unwrap_or_default()
    }

    pub fn number_of_entry_modules(&self, chunk: ChunkUkey) -> usize {
        self.chunk_graph_chunk(chunk)
            .map_or(0, |cgc| cgc.entry_modules.len())
    }

    pub fn is_entry_module(&self, module: ModuleId) -> bool {
        self.chunk_graph_module(module)
            .is_some_and(ChunkGraphModule::is_entry)
    }

    pub fn is_entry_module_in_chunk(&self, module: ModuleId, chunk: ChunkUkey) -> bool {
        self.chunk_graph_chunk(chunk)
            .is_some_and(|cgc| cgc.entry_modules.contains_key(&module))
    }

    // ---------------------------------------------------------------------
    // Runtime modules
    // ---------------------------------------------------------------------

    pub fn connect_chunk_and_runtime_module(&mut self, chunk: ChunkUkey, module: ModuleId) {
        self.cgm_mut(module)
            .runtime_in_chunks
            .get_or_insert_with(UkeyIndexSet::default)
            .insert(chunk);
        self.cgc_mut(chunk).runtime_modules.insert(module);
    }

    pub fn disconnect_chunk_and_runtime_module(&mut self, chunk: ChunkUkey, module: ModuleId) {
        if let Some(chunks) = self
            .chunk_graph_module_by_module
            .get_mut(&module)
            .and_then(|cgm| cgm.runtime_in_chunks.as_mut())
        {
            chunks.shift_remove(&chunk);
        }
        if let Some(cgc) = self.chunk_graph_chunk_by_chunk.get_mut(&chunk) {
            cgc.runtime_modules.shift_remove(&module);
        }
    }

    /// Runtime modules of `chunk` ordered by stage, then identifier
    pub fn chunk_runtime_modules_in_order(
        &self,
        chunk: ChunkUkey,
        module_graph: &ModuleGraph,
    ) -> Vec<ModuleId> {
        let mut modules: Vec<ModuleId> = self
            .chunk_graph_chunk(chunk)
            .map(|cgc| cgc.runtime_modules.iter().copied().collect())
            .unwrap_or_default();
        modules.sort_by(|a, b| {
            let (ma, mb) = (module_graph.module(*a), module_graph.module(*b));
            ma.stage()
                .cmp(&mb.stage())
                .then_with(|| ma.identifier.cmp(&mb.identifier))
        });
        modules
    }

    pub fn has_chunk_runtime_modules(&self, chunk: ChunkUkey) -> bool {
        self.chunk_graph_chunk(chunk)
            .is_some_and(|cgc| !cgc.runtime_modules.is_empty())
    }

    pub fn add_full_hash_module_to_chunk(&mut self, chunk: ChunkUkey, module: ModuleId) {
        self.cgc_mut(chunk)
            .full_hash_modules
            .get_or_insert_with(UkeyIndexSet::default)
            .insert(module);
    }

    pub fn full_hash_modules(&self, chunk: ChunkUkey) -> Vec<ModuleId> {
        self.chunk_graph_chunk(chunk)
            .and_then(|cgc| cgc.full_hash_modules.as_ref())
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    // ---------------------------------------------------------------------
    // Ids, hashes and runtime requirements (values computed elsewhere)
    // ---------------------------------------------------------------------

    pub fn set_module_id(&mut self, module: ModuleId, id: impl Into<String>) {
        self.cgm_mut(module).id = Some(id.into());
    }

    pub fn module_id(&self, module: ModuleId) -> Option<&str> {
        self.chunk_graph_module(module)?.id.as_deref()
    }

    pub fn set_runtime_id(&mut self, runtime: impl Into<String>, id: Option<String>) {
        self.runtime_ids.insert(runtime.into(), id);
    }

    pub fn runtime_id(&self, runtime: &str) -> Option<&str> {
        self.runtime_ids.get(runtime)?.as_deref()
    }

    pub fn set_module_hashes(
        &mut self,
        module: ModuleId,
        runtime: &RuntimeSpec,
        hash: impl Into<String>,
        rendered_hash: impl Into<String>,
    ) {
        self.cgm_mut(module).hashes.set(
            runtime.clone(),
            ModuleHashes {
                hash: hash.into(),
                rendered_hash: rendered_hash.into(),
            },
        );
    }

    pub fn module_hash(&self, module: ModuleId, runtime: &RuntimeSpec) -> Option<&str> {
        self.chunk_graph_module(module)?
            .hashes
            .get(runtime)
            .map(|h| h.hash.as_str())
    }

    pub fn rendered_module_hash(&self, module: ModuleId, runtime: &RuntimeSpec) -> Option<&str> {
        self.chunk_graph_module(module)?
            .hashes
            .get(runtime)
            .map(|h| h.rendered_hash.as_str())
    }

    pub fn add_module_runtime_requirements<I, S>(&mut self, module: ModuleId, runtime: &RuntimeSpec, items: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cgm_mut(module)
            .runtime_requirements
            .get_or_insert_with(runtime, BTreeSet::new)
            .extend(items.into_iter().map(Into::into));
    }

    pub fn module_runtime_requirements(&self, module: ModuleId, runtime: &RuntimeSpec) -> BTreeSet<String> {
        self.chunk_graph_module(module)
            .and_then(|cgm| cgm.runtime_requirements.get(runtime))
            .cloned()
            .unwrap_or_default()
    }

    pub fn add_chunk_runtime_requirements<I, S>(&mut self, chunk: ChunkUkey, items: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cgc_mut(chunk)
            .runtime_requirements
            .extend(items.into_iter().map(Into::into));
    }

    pub fn chunk_runtime_requirements(&self, chunk: ChunkUkey) -> BTreeSet<String> {
        self.chunk_graph_chunk(chunk)
            .map(|cgc| cgc.runtime_requirements.clone())
            .unwrap_or_default()
    }

    pub fn add_tree_runtime_requirements<I, S>(&mut self, chunk: ChunkUkey, items: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cgc_mut(chunk)
            .runtime_requirements_in_tree
            .extend(items.into_iter().map(Into::into));
    }

    pub fn tree_runtime_requirements(&self, chunk: ChunkUkey) -> BTreeSet<String> {
        self.chunk_graph_chunk(chunk)
            .map(|cgc| cgc.runtime_requirements_in_tree.clone())
            .unwrap_or_default()
    }

    // ---------------------------------------------------------------------
    // Ordering
    // ---------------------------------------------------------------------

    /// Compare two chunks by their sorted module-identifier sequences
    pub fn compare_chunks_by_modules(
        &self,
        a: ChunkUkey,
        b: ChunkUkey,
        module_graph: &ModuleGraph,
    ) -> Ordering {
        let left = self.chunk_module_identifiers(a, module_graph);
        let right = self.chunk_module_identifiers(b, module_graph);
        left.cmp(&right)
    }

    /// Deterministic group order: more chunks first, then chunk module sequences
    pub fn compare_chunk_groups(
        &self,
        a: ChunkGroupUkey,
        b: ChunkGroupUkey,
        module_graph: &ModuleGraph,
    ) -> Ordering {
        let (ga, gb) = (self.chunk_group(a), self.chunk_group(b));
        ga.compare_to(gb, |x, y| self.compare_chunks_by_modules(x, y, module_graph))
    }

    /// Child groups bucketed per order hint (e.g. `prefetch`), highest order first
    pub fn children_by_orders(
        &self,
        group: ChunkGroupUkey,
        module_graph: &ModuleGraph,
    ) -> BTreeMap<String, Vec<ChunkGroupUkey>> {
        let mut lists: BTreeMap<String, Vec<(i64, ChunkGroupUkey)>> = BTreeMap::new();
        for child in self.chunk_group(group).children() {
            for (key, order) in self.chunk_group(child).options.orders() {
                let name = key.trim_end_matches(ORDER_SUFFIX).to_string();
                lists.entry(name).or_default().push((order, child));
            }
        }
        lists
            .into_iter()
            .map(|(name, mut list)| {
                list.sort_by(|(oa, a), (ob, b)| {
                    ob.cmp(oa)
                        .then_with(|| self.compare_chunk_groups(*a, *b, module_graph))
                });
                (name, list.into_iter().map(|(_, g)| g).collect())
            })
            .collect()
    }

    // ---------------------------------------------------------------------
    // Consistency
    // ---------------------------------------------------------------------

    /// Verify every mirrored relation; a failure is a programming error
    pub fn check_consistency(&self) -> GraphResult<()> {
        for (chunk, cgc) in &self.chunk_graph_chunk_by_chunk {
            for module in &cgc.modules {
                let mirrored = self
                    .chunk_graph_module(*module)
                    .is_some_and(|cgm| cgm.chunks.contains(chunk));
                if !mirrored {
                    return Err(GraphError::Inconsistent(format!(
                        "{:?} lists {:?} but the module does not list the chunk",
                        chunk, module
                    )));
                }
            }
            for module in cgc.entry_modules.keys() {
                if !cgc.modules.contains(module) {
                    return Err(GraphError::Inconsistent(format!(
                        "entry module {:?} is not a member of {:?}",
                        module, chunk
                    )));
                }
            }
        }
        for (module, cgm) in &self.chunk_graph_module_by_module {
            for chunk in &cgm.chunks {
                if !self.is_module_in_chunk(*module, *chunk) {
                    return Err(GraphError::Inconsistent(format!(
                        "{:?} lists {:?} but the chunk does not list the module",
                        module, chunk
                    )));
                }
            }
        }
        for (ukey, group) in &self.chunk_group_by_ukey {
            for child in group.children() {
                if !self.try_chunk_group(child).is_some_and(|c| c.has_parent(*ukey)) {
                    return Err(GraphError::Inconsistent(format!(
                        "{:?} has child {:?} without the reverse link",
                        ukey, child
                    )));
                }
            }
            for parent in group.parents() {
                if !self.try_chunk_group(parent).is_some_and(|p| p.has_child(*ukey)) {
                    return Err(GraphError::Inconsistent(format!(
                        "{:?} has parent {:?} without the reverse link",
                        ukey, parent
                    )));
                }
            }
            for chunk in group.chunks() {
                if !self.try_chunk(*chunk).is_some_and(|c| c.is_in_group(*ukey)) {
                    return Err(GraphError::Inconsistent(format!(
                        "{:?} holds {:?} but the chunk is not in the group",
                        ukey, chunk
                    )));
                }
            }
        }
        for (ukey, chunk) in &self.chunk_by_ukey {
            for group in chunk.groups() {
                if !self.try_chunk_group(group).is_some_and(|g| g.contains_chunk(*ukey)) {
                    return Err(GraphError::Inconsistent(format!(
                        "{:?} claims {:?} but the group does not hold it",
                        ukey, group
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::OptionValue;
    use crate::graph::Module;

    fn setup() -> (ModuleGraph, ChunkGraph, Vec<ModuleId>) {
        let mut mg = ModuleGraph::new();
        let modules = ["a", "b", "c"]
            .iter()
            .map(|id| mg.add_module(Module::new(*id, 100)))
            .collect();
        (mg, ChunkGraph::new(), modules)
    }

    #[test]
    fn test_connect_is_bipartite() {
        let (_mg, mut cg, m) = setup();
        let chunk = cg.add_chunk(Some("main".into()));
        assert!(cg.connect_chunk_and_module(chunk, m[0]));
        assert!(!cg.connect_chunk_and_module(chunk, m[0]));
        assert!(cg.is_module_in_chunk(m[0], chunk));
        assert_eq!(cg.chunks_of_module(m[0]), vec![chunk]);

        assert!(cg.disconnect_chunk_and_module(chunk, m[0]));
        assert!(!cg.is_module_in_chunk(m[0], chunk));
        assert!(cg.chunks_of_module(m[0]).is_empty());
        cg.check_consistency().unwrap();
    }

    #[test]
    fn test_named_chunks_are_reused() {
        let (_mg, mut cg, _) = setup();
        let a = cg.add_chunk(Some("vendor".into()));
        let b = cg.add_chunk(Some("vendor".into()));
        let c = cg.add_chunk(None);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(cg.chunk_count(), 2);
    }

    #[test]
    fn test_entry_module_is_member() {
        let (_mg, mut cg, m) = setup();
        let chunk = cg.add_chunk(Some("main".into()));
        let entry = cg.add_entrypoint(
            EntryOptions {
                name: Some("main".into()),
                ..Default::default()
            },
            true,
        );
        cg.connect_chunk_and_group(chunk, entry);
        cg.connect_chunk_and_entry_module(chunk, m[0], entry);
        assert!(cg.is_module_in_chunk(m[0], chunk));
        assert!(cg.is_entry_module(m[0]));
        assert_eq!(cg.entry_modules_with_group(chunk), vec![(m[0], entry)]);

        cg.disconnect_chunk_and_module(chunk, m[0]);
        assert_eq!(cg.number_of_entry_modules(chunk), 0);
        assert!(!cg.is_entry_module(m[0]));
        cg.check_consistency().unwrap();
    }

    #[test]
    fn test_remove_group_contracts_edges() {
        let (_mg, mut cg, _) = setup();
        let root = cg.add_chunk_group(ChunkGroupOptions::named("root"));
        let middle = cg.add_chunk_group(ChunkGroupOptions::named("middle"));
        let leaf = cg.add_chunk_group(ChunkGroupOptions::named("leaf"));
        cg.connect_chunk_groups(root, middle);
        cg.connect_chunk_groups(middle, leaf);
        let chunk = cg.add_chunk(None);
        cg.connect_chunk_and_group(chunk, middle);

        cg.remove_chunk_group(middle);

        assert!(cg.chunk_group(root).has_child(leaf));
        assert!(cg.chunk_group(leaf).has_parent(root));
        assert!(!cg.chunk(chunk).is_in_group(middle));
        assert!(cg.named_chunk_group("middle").is_none());
        cg.check_consistency().unwrap();
    }

    #[test]
    fn test_sorted_modules_follow_mutation() {
        let (mg, mut cg, m) = setup();
        let chunk = cg.add_chunk(None);
        cg.connect_chunk_and_module(chunk, m[2]);
        cg.connect_chunk_and_module(chunk, m[0]);
        assert_eq!(cg.chunk_module_identifiers(chunk, &mg), vec!["a", "c"]);
        cg.connect_chunk_and_module(chunk, m[1]);
        assert_eq!(cg.chunk_module_identifiers(chunk, &mg), vec!["a", "b", "c"]);
        cg.disconnect_chunk_and_module(chunk, m[0]);
        assert_eq!(cg.chunk_module_identifiers(chunk, &mg), vec!["b", "c"]);
    }

    #[test]
    fn test_runtime_modules_ordered_by_stage() {
        let mut mg = ModuleGraph::new();
        let late = mg.add_module(Module::runtime("runtime/late", 10, 10));
        let early_b = mg.add_module(Module::runtime("runtime/b", 10, 0));
        let early_a = mg.add_module(Module::runtime("runtime/a", 10, 0));
        let mut cg = ChunkGraph::new();
        let chunk = cg.add_chunk(None);
        for module in [late, early_b, early_a] {
            cg.connect_chunk_and_runtime_module(chunk, module);
        }
        assert_eq!(
            cg.chunk_runtime_modules_in_order(chunk, &mg),
            vec![early_a, early_b, late]
        );
    }

    #[test]
    fn test_module_hashes_per_runtime() {
        let (_mg, mut cg, m) = setup();
        let web = RuntimeSpec::single("web");
        cg.set_module_hashes(m[0], &web, "abcdef", "abc");
        cg.set_module_id(m[0], "0");
        assert_eq!(cg.module_hash(m[0], &web), Some("abcdef"));
        assert_eq!(cg.rendered_module_hash(m[0], &web), Some("abc"));
        assert_eq!(cg.module_hash(m[0], &RuntimeSpec::All), None);
        assert_eq!(cg.module_id(m[0]), Some("0"));
    }

    #[test]
    fn test_runtime_requirements() {
        let (_mg, mut cg, m) = setup();
        let chunk = cg.add_chunk(None);
        cg.add_module_runtime_requirements(m[0], &RuntimeSpec::All, ["require"]);
        cg.add_chunk_runtime_requirements(chunk, ["require", "publicPath"]);
        cg.add_tree_runtime_requirements(chunk, ["loadScript"]);
        assert!(cg
            .module_runtime_requirements(m[0], &RuntimeSpec::All)
            .contains("require"));
        assert_eq!(cg.chunk_runtime_requirements(chunk).len(), 2);
        assert!(cg.tree_runtime_requirements(chunk).contains("loadScript"));
    }

    #[test]
    fn test_disconnect_groups_both_sides() {
        let (_mg, mut cg, _) = setup();
        let parent = cg.add_chunk_group(ChunkGroupOptions::named("parent"));
        let child = cg.add_chunk_group(ChunkGroupOptions::named("child"));
        assert!(cg.connect_chunk_groups(parent, child));
        assert!(cg.disconnect_chunk_groups(parent, child));
        assert!(!cg.disconnect_chunk_groups(parent, child));
        assert_eq!(cg.chunk_group(parent).children().count(), 0);
        assert_eq!(cg.chunk_group(child).parents().count(), 0);
        cg.check_consistency().unwrap();
    }

    #[test]
    fn test_ordered_modules_use_comparator() {
        let (mg, mut cg, m) = setup();
        let chunk = cg.add_chunk(None);
        for &module in &m {
            cg.connect_chunk_and_module(chunk, module);
        }
        let reversed = cg.ordered_chunk_modules(chunk, |a, b| {
            mg.identifier(b).cmp(mg.identifier(a))
        });
        assert_eq!(reversed, vec![m[2], m[1], m[0]]);
    }

    #[test]
    fn test_children_by_orders() {
        let (mg, mut cg, _) = setup();
        let parent = cg.add_chunk_group(ChunkGroupOptions::named("parent"));
        let low = cg.add_chunk_group(
            ChunkGroupOptions::named("low").with_value("prefetchOrder", OptionValue::Number(1)),
        );
        let high = cg.add_chunk_group(
            ChunkGroupOptions::named("high")
                .with_value("prefetchOrder", OptionValue::Number(5))
                .with_value("preloadOrder", OptionValue::Number(2)),
        );
        let plain = cg.add_chunk_group(ChunkGroupOptions::named("plain"));
        for child in [low, high, plain] {
            cg.connect_chunk_groups(parent, child);
        }

        let orders = cg.children_by_orders(parent, &mg);
        assert_eq!(orders.len(), 2);
        assert_eq!(orders["prefetch"], vec![high, low]);
        assert_eq!(orders["preload"], vec![high]);
    }

    #[test]
    fn test_consistency_detects_broken_mirror() {
        let (_mg, mut cg, _) = setup();
        let parent = cg.add_chunk_group(ChunkGroupOptions::default());
        let child = cg.add_chunk_group(ChunkGroupOptions::default());
        cg.chunk_group_mut(parent).add_child(child);
        assert!(matches!(
            cg.check_consistency(),
            Err(GraphError::Inconsistent(_))
        ));
    }
}
