//! Chunk integration: eligibility, cost model and merging

use std::collections::VecDeque;

use tracing::debug;

use crate::chunk_graph::ChunkGraph;
use crate::graph::ModuleGraph;
use crate::ukey::{ChunkGroupUkey, ChunkUkey, ModuleId, UkeyIndexSet};

/// Cost model knobs for chunk size estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSizeOptions {
    /// Fixed cost of emitting one more chunk
    pub chunk_overhead: u64,
    /// Weight applied to module sizes of chunks that can be initial
    pub entry_chunk_multiplicator: u64,
}

impl Default for ChunkSizeOptions {
    fn default() -> Self {
        Self {
            chunk_overhead: 10_000,
            entry_chunk_multiplicator: 10,
        }
    }
}

impl ChunkGraph {
    fn modules_size(&self, modules: impl IntoIterator<Item = ModuleId>, module_graph: &ModuleGraph) -> u64 {
        modules
            .into_iter()
            .map(|m| module_graph.module(m).size)
            .sum()
    }

    fn can_be_initial(&self, chunk: ChunkUkey) -> bool {
        self.chunk(chunk).can_be_initial(self.chunk_groups_by_ukey())
    }

    fn has_runtime(&self, chunk: ChunkUkey) -> bool {
        self.chunk(chunk).has_runtime(self.chunk_groups_by_ukey())
    }

    /// Estimated size of `chunk`
    pub fn chunk_size(&self, chunk: ChunkUkey, module_graph: &ModuleGraph, options: &ChunkSizeOptions) -> u64 {
        let multiplicator = if self.can_be_initial(chunk) {
            options.entry_chunk_multiplicator
        } else {
            1
        };
        options.chunk_overhead.saturating_add(
            self.modules_size(self.modules_of_chunk(chunk), module_graph)
                .saturating_mul(multiplicator),
        )
    }

    /// Estimated size of `a` and `b` merged; shared modules count once
    pub fn integrated_chunks_size(
        &self,
        a: ChunkUkey,
        b: ChunkUkey,
        module_graph: &ModuleGraph,
        options: &ChunkSizeOptions,
    ) -> u64 {
        let modules: UkeyIndexSet<ModuleId> = self
            .modules_of_chunk(a)
            .chain(self.modules_of_chunk(b))
            .collect();
        let multiplicator = if self.can_be_initial(a) || self.can_be_initial(b) {
            options.entry_chunk_multiplicator
        } else {
            1
        };
        options
            .chunk_overhead
            .saturating_add(self.modules_size(modules, module_graph).saturating_mul(multiplicator))
    }

    /// True when every initial path loading `b` already loads `a`.
    ///
    /// Walks `b`'s groups and their parents; a group that contains `a` ends
    /// that path, reaching an initial group without passing `a` fails.
    pub fn is_available_chunk(&self, a: ChunkUkey, b: ChunkUkey) -> bool {
        let chunk_a = self.chunk(a);
        let mut queue: VecDeque<ChunkGroupUkey> = self.chunk(b).groups().collect();
        let mut visited: UkeyIndexSet<ChunkGroupUkey> = queue.iter().copied().collect();
        while let Some(ukey) = queue.pop_front() {
            if chunk_a.is_in_group(ukey) {
                continue;
            }
            let group = self.chunk_group(ukey);
            if group.is_initial() {
                return false;
            }
            for parent in group.parents() {
                if visited.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        true
    }

    /// Whether `a` and `b` may be merged. Never errors: a refusal is a
    /// normal outcome.
    pub fn can_chunks_be_integrated(&self, a: ChunkUkey, b: ChunkUkey) -> bool {
        if a == b {
            return false;
        }
        let (chunk_a, chunk_b) = (self.chunk(a), self.chunk(b));
        if chunk_a.prevent_integration || chunk_b.prevent_integration {
            return false;
        }
        if self.number_of_entry_modules(a) > 0 && self.number_of_entry_modules(b) > 0 {
            return false;
        }

        match (self.has_runtime(a), self.has_runtime(b)) {
            (true, false) => self.is_available_chunk(a, b),
            (false, true) => self.is_available_chunk(b, a),
            // entry modules of either chunk need their own runtime placement
            _ => self.number_of_entry_modules(a) == 0 && self.number_of_entry_modules(b) == 0,
        }
    }

    /// Merge `b` into `a`. `b` is removed from the graph afterwards.
    pub fn integrate_chunks(&mut self, a: ChunkUkey, b: ChunkUkey) {
        if a == b {
            return;
        }
        let name = self.integrated_name(a, b);
        debug!(
            "integrating {} into {}",
            self.chunk(b).display_name(),
            self.chunk(a).display_name()
        );

        let chunk_b = self.chunk(b);
        let hints = chunk_b.id_name_hints.clone();
        let runtime_b = chunk_b.runtime.clone();
        let groups: Vec<ChunkGroupUkey> = chunk_b.groups().collect();
        let b_name = chunk_b.name.clone();

        // the surviving name may be b's, so release it first
        if b_name.is_some() {
            self.set_chunk_name(b, None);
        }
        if self.chunk(a).name != name {
            self.set_chunk_name(a, name);
        }
        {
            let chunk_a = self.chunk_mut(a);
            chunk_a.id_name_hints.extend(hints);
            chunk_a.runtime = chunk_a.runtime.merge(&runtime_b);
        }

        let modules: Vec<ModuleId> = self.modules_of_chunk(b).collect();
        let entries = self.entry_modules_with_group(b);
        let runtime_modules: Vec<ModuleId> = self
            .chunk_graph_chunk(b)
            .map(|cgc| cgc.runtime_modules.iter().copied().collect())
            .unwrap_or_default();
        let full_hash_modules = self.full_hash_modules(b);

        for module in modules {
            self.disconnect_chunk_and_module(b, module);
            self.connect_chunk_and_module(a, module);
        }
        for (module, group) in entries {
            self.disconnect_chunk_and_entry_module(b, module);
            self.connect_chunk_and_entry_module(a, module, group);
        }
        for module in runtime_modules {
            self.disconnect_chunk_and_runtime_module(b, module);
            self.connect_chunk_and_runtime_module(a, module);
        }
        for module in full_hash_modules {
            self.add_full_hash_module_to_chunk(a, module);
        }
        let requirements = self.chunk_runtime_requirements(b);
        self.add_chunk_runtime_requirements(a, requirements);

        for group in groups {
            self.chunk_group_mut(group).replace_chunk(b, a);
            self.chunk_mut(a).add_group(group);
            self.chunk_mut(b).remove_group(group);
            if let Some(runtime_chunk) = self.chunk_group(group).own_runtime_chunk() {
                if runtime_chunk == b {
                    self.chunk_group_mut(group).set_runtime_chunk(a);
                }
            }
            if self.chunk_group(group).entrypoint_chunk() == Some(b) {
                self.chunk_group_mut(group).set_entrypoint_chunk(a);
            }
        }

        self.remove_chunk(b);
        debug_assert!(self.check_consistency().is_ok());
    }

    /// Surviving name: the entry-owning side's name if exactly one side has
    /// entry modules, else the shorter name (ties lexicographic).
    fn integrated_name(&self, a: ChunkUkey, b: ChunkUkey) -> Option<String> {
        let (chunk_a, chunk_b) = (self.chunk(a), self.chunk(b));
        match (&chunk_a.name, &chunk_b.name) {
            (Some(name_a), Some(name_b)) => {
                let entry_a = self.number_of_entry_modules(a) > 0;
                let entry_b = self.number_of_entry_modules(b) > 0;
                if entry_a == entry_b {
                    let shorter = match name_a.len().cmp(&name_b.len()) {
                        std::cmp::Ordering::Less => name_a,
                        std::cmp::Ordering::Greater => name_b,
                        std::cmp::Ordering::Equal => name_a.min(name_b),
                    };
                    Some(shorter.clone())
                } else if entry_b {
                    Some(name_b.clone())
                } else {
                    Some(name_a.clone())
                }
            }
            (None, Some(name_b)) => Some(name_b.clone()),
            (name_a, None) => name_a.clone(),
        }
    }
}
