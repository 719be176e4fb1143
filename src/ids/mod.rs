//! Default id and module hash assignment
//!
//! The chunk graph only stores ids and hashes; these passes compute the
//! values a plain build uses. Anything smarter (deterministic numeric ids,
//! content-based hashes from rendered code) plugs in through the same setters.

use std::collections::BTreeSet;

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::chunk_graph::ChunkGraph;
use crate::graph::ModuleGraph;
use crate::runtime::RuntimeSpec;
use crate::ukey::{ChunkGroupUkey, ChunkUkey, ModuleId};
use crate::utils::{shorten_hash, ContentHasher};

/// Give every module placed in a chunk its identifier as id
pub fn assign_module_ids(module_graph: &ModuleGraph, chunk_graph: &mut ChunkGraph) {
    let mut modules: Vec<ModuleId> = module_graph
        .module_ids()
        .filter(|m| chunk_graph.number_of_module_chunks(*m) > 0)
        .collect();
    modules.sort_by(|a, b| module_graph.identifier(*a).cmp(module_graph.identifier(*b)));
    for module in modules {
        let identifier = module_graph.identifier(module).to_string();
        chunk_graph.set_module_id(module, identifier);
    }
}

/// Name a chunk by its name, falling back to its debug id.
///
/// Chunks are visited by name, then creation order, so a clash between a
/// chunk name and another chunk's debug id is resolved the same way every
/// build.
pub fn assign_chunk_ids(chunk_graph: &mut ChunkGraph) {
    let mut chunks: Vec<ChunkUkey> = chunk_graph.chunk_ukeys();
    chunks.sort_by(|a, b| {
        let (ca, cb) = (chunk_graph.chunk(*a), chunk_graph.chunk(*b));
        ca.name
            .is_none()
            .cmp(&cb.name.is_none())
            .then_with(|| ca.name.cmp(&cb.name))
            .then_with(|| ca.debug_id.cmp(&cb.debug_id))
    });

    let mut used = BTreeSet::new();
    for ukey in chunks {
        let chunk = chunk_graph.chunk_mut(ukey);
        let mut id = chunk
            .name
            .clone()
            .unwrap_or_else(|| chunk.debug_id.to_string());
        if !used.insert(id.clone()) {
            id = format!("{}~{}", id, chunk.debug_id);
            used.insert(id.clone());
        }
        chunk.ids = Some(vec![id.clone()]);
        chunk.id = Some(id);
    }

    let mut entrypoints: Vec<ChunkGroupUkey> =
        chunk_graph.entrypoints().map(|(_, ukey)| ukey).collect();
    entrypoints.extend(chunk_graph.async_entrypoints().iter().copied());
    let runtimes: Vec<(String, Option<String>)> = entrypoints
        .into_iter()
        .filter_map(|entrypoint| {
            let group = chunk_graph.chunk_group(entrypoint);
            let runtime_chunk = group.get_runtime_chunk(chunk_graph.chunk_groups_by_ukey())?;
            let chunk = chunk_graph.chunk(runtime_chunk);
            Some(
                chunk
                    .runtime
                    .names()
                    .into_iter()
                    .map(|name| (name.to_string(), chunk.id.clone()))
                    .collect::<Vec<_>>(),
            )
        })
        .flatten()
        .collect();
    for (runtime, id) in runtimes {
        chunk_graph.set_runtime_id(runtime, id);
    }
}

/// Hash every placed module once per runtime it is emitted for.
///
/// The hash combines the upstream build hash (or the identifier when the
/// module has none) with the module's graph-shape hash for that runtime.
pub fn assign_module_hashes(module_graph: &ModuleGraph, chunk_graph: &mut ChunkGraph, digest_length: usize) {
    let mut work: Vec<(ModuleId, RuntimeSpec)> = Vec::new();
    let mut seen: FxHashSet<(ModuleId, String)> = FxHashSet::default();
    for chunk in chunk_graph.chunks() {
        let runtime = &chunk.runtime;
        for module in chunk_graph.modules_of_chunk(chunk.ukey) {
            if seen.insert((module, runtime.key())) {
                work.push((module, runtime.clone()));
            }
        }
    }
    work.sort_by(|(ma, ra), (mb, rb)| {
        module_graph
            .identifier(*ma)
            .cmp(module_graph.identifier(*mb))
            .then_with(|| ra.cmp(rb))
    });

    debug!("hashing {} module/runtime pairs", work.len());
    for (module, runtime) in work {
        let m = module_graph.module(module);
        let mut hasher = ContentHasher::new();
        hasher.update_str(m.build_hash.as_deref().unwrap_or(&m.identifier));
        hasher.update_str(&module_graph.graph_hash(module, &runtime));
        let hash = hasher.digest();
        let rendered = shorten_hash(&hash, digest_length);
        chunk_graph.set_module_hashes(module, &runtime, hash, rendered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deriver::{derive_chunk_graph, EntryData};
    use crate::graph::{Dependency, DependencyParent, Module};

    fn graph() -> (ModuleGraph, ChunkGraph) {
        let mut mg = ModuleGraph::new();
        let index = mg.add_module(Module::new("index", 10).with_build_hash("aaaa"));
        let util = mg.add_module(Module::new("util", 10));
        mg.add_module(Module::new("unused", 10));
        let dep = mg.add_dependency(Dependency::new(DependencyParent::Module(index), "./util"));
        mg.connect(Some(index), dep, util);
        let cg = derive_chunk_graph(&mut mg, &[EntryData::new("main", vec![index])]).unwrap();
        (mg, cg)
    }

    #[test]
    fn test_module_ids_only_for_placed_modules() {
        let (mg, mut cg) = graph();
        assign_module_ids(&mg, &mut cg);
        let index = mg.module_id("index").unwrap();
        let unused = mg.module_id("unused").unwrap();
        assert_eq!(cg.module_id(index), Some("index"));
        assert_eq!(cg.module_id(unused), None);
    }

    #[test]
    fn test_chunk_ids_from_names() {
        let (_mg, mut cg) = graph();
        assign_chunk_ids(&mut cg);
        let main = cg.named_chunk("main").unwrap();
        assert_eq!(cg.chunk(main).id.as_deref(), Some("main"));
        assert_eq!(cg.chunk(main).ids, Some(vec!["main".to_string()]));
        assert_eq!(cg.runtime_id("main"), Some("main"));
    }

    #[test]
    fn test_unnamed_chunks_use_debug_ids() {
        let mut cg = ChunkGraph::new();
        let a = cg.add_chunk(None);
        let b = cg.add_chunk(Some("1".into()));
        assign_chunk_ids(&mut cg);
        assert_eq!(cg.chunk(b).id.as_deref(), Some("1"));
        // debug id 0 is free
        assert_eq!(cg.chunk(a).id.as_deref(), Some("0"));
    }

    #[test]
    fn test_module_hashes_per_chunk_runtime() {
        let (mut mg, mut cg) = graph();
        mg.freeze();
        assign_module_hashes(&mg, &mut cg, 8);
        let index = mg.module_id("index").unwrap();
        let runtime = RuntimeSpec::single("main");
        let hash = cg.module_hash(index, &runtime).unwrap().to_string();
        assert_eq!(hash.len(), 64);
        assert_eq!(cg.rendered_module_hash(index, &runtime), Some(&hash[..8]));

        // same input, same hash
        let mut again = derive_chunk_graph(&mut mg, &[EntryData::new("main", vec![index])]).unwrap();
        assign_module_hashes(&mg, &mut again, 8);
        assert_eq!(again.module_hash(index, &runtime), Some(hash.as_str()));
    }
}
