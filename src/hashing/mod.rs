//! Chunk hashing
//!
//! Chunks without a runtime only depend on their own modules and are hashed
//! first, in id order. Runtime chunks may embed the runtime chunk hash of
//! every async entrypoint they can start, so they are hashed in dependency
//! order; a cycle among them is reported and broken by id order.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::chunk_graph::ChunkGraph;
use crate::error::GraphResult;
use crate::graph::ModuleGraph;
use crate::ukey::ChunkUkey;
use crate::utils::{shorten_hash, ContentHasher, XorDigest};

/// Content type key under which the rendered chunk hash is recorded
pub const JAVASCRIPT: &str = "javascript";

/// Hashing options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashOptions {
    /// Length of the rendered (shortened) hash
    pub digest_length: usize,
}

impl Default for HashOptions {
    fn default() -> Self {
        Self { digest_length: 20 }
    }
}

/// Non-fatal finding of the hashing pass
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashWarning {
    /// These runtime chunks reference each other; their hashes were computed
    /// in id order and do not reflect each other
    #[error("circular hash dependency between chunks {}", .chunks.join(", "))]
    CircularRuntimeChunks { chunks: Vec<String> },
}

/// Outcome of hashing every chunk
#[derive(Debug, Clone, Default)]
pub struct HashReport {
    /// Chunks in the order they were hashed
    pub order: Vec<ChunkUkey>,
    pub warnings: Vec<HashWarning>,
    /// Combined hash over every chunk hash, in hashing order
    pub full_hash: String,
}

/// Hash every chunk of `chunk_graph`, storing `hash`, `rendered_hash` and
/// the javascript content hash on each chunk.
pub fn hash_chunks(
    module_graph: &ModuleGraph,
    chunk_graph: &mut ChunkGraph,
    options: &HashOptions,
) -> GraphResult<HashReport> {
    let mut chunks = chunk_graph.chunk_ukeys();
    chunks.sort_by(|a, b| chunk_graph.chunk(*a).compare_by_id(chunk_graph.chunk(*b)));

    let groups = chunk_graph.chunk_groups_by_ukey();
    let (runtime_chunks, plain_chunks): (Vec<ChunkUkey>, Vec<ChunkUkey>) = chunks
        .iter()
        .copied()
        .partition(|c| chunk_graph.chunk(*c).has_runtime(groups));

    let mut report = HashReport::default();

    for chunk in plain_chunks {
        hash_chunk(module_graph, chunk_graph, chunk, &[], options);
        report.order.push(chunk);
    }

    // runtime chunk -> runtime chunks of the async entrypoints it references
    let position: FxHashMap<ChunkUkey, usize> = runtime_chunks
        .iter()
        .enumerate()
        .map(|(idx, c)| (*c, idx))
        .collect();
    let mut references: Vec<Vec<ChunkUkey>> = vec![Vec::new(); runtime_chunks.len()];
    let mut referenced_by: Vec<Vec<usize>> = vec![Vec::new(); runtime_chunks.len()];
    let groups = chunk_graph.chunk_groups_by_ukey();
    for (idx, &chunk) in runtime_chunks.iter().enumerate() {
        let mut targets = BTreeSet::new();
        for entrypoint in chunk_graph.chunk(chunk).referenced_async_entrypoints(groups) {
            let Some(runtime_chunk) = groups[&entrypoint].get_runtime_chunk(groups) else {
                continue;
            };
            if runtime_chunk == chunk {
                continue;
            }
            if let Some(&target) = position.get(&runtime_chunk) {
                targets.insert(target);
            }
        }
        for target in targets {
            references[idx].push(runtime_chunks[target]);
            referenced_by[target].push(idx);
        }
    }

    // Kahn's algorithm; the ready set is ordered by id position
    let mut remaining: Vec<usize> = references.iter().map(Vec::len).collect();
    let mut ready: BTreeSet<usize> = (0..runtime_chunks.len())
        .filter(|idx| remaining[*idx] == 0)
        .collect();
    let mut done = vec![false; runtime_chunks.len()];
    while let Some(idx) = ready.pop_first() {
        let chunk = runtime_chunks[idx];
        hash_chunk(module_graph, chunk_graph, chunk, &references[idx], options);
        report.order.push(chunk);
        done[idx] = true;
        for &referrer in &referenced_by[idx] {
            remaining[referrer] -= 1;
            if remaining[referrer] == 0 {
                ready.insert(referrer);
            }
        }
    }

    let cyclic: Vec<usize> = (0..runtime_chunks.len()).filter(|idx| !done[*idx]).collect();
    if !cyclic.is_empty() {
        let names: Vec<String> = cyclic
            .iter()
            .map(|idx| chunk_graph.chunk(runtime_chunks[*idx]).display_name())
            .collect();
        let warning = HashWarning::CircularRuntimeChunks { chunks: names };
        warn!("{}", warning);
        report.warnings.push(warning);

        for idx in cyclic {
            let chunk = runtime_chunks[idx];
            hash_chunk(module_graph, chunk_graph, chunk, &references[idx], options);
            report.order.push(chunk);
        }
    }

    let mut full = ContentHasher::new();
    for chunk in &report.order {
        full.update_str(chunk_graph.chunk(*chunk).hash.as_deref().unwrap_or_default());
    }
    report.full_hash = full.digest();
    debug!("hashed {} chunks", report.order.len());
    Ok(report)
}

/// Compute and store the hash of one chunk. Referenced chunks that are
/// already hashed contribute their hash.
fn hash_chunk(
    module_graph: &ModuleGraph,
    chunk_graph: &mut ChunkGraph,
    ukey: ChunkUkey,
    references: &[ChunkUkey],
    options: &HashOptions,
) {
    let digest = {
        let chunk = chunk_graph.chunk(ukey);
        let mut hasher = ContentHasher::new();
        hasher.update_str(chunk.id.as_deref().unwrap_or_default());
        for id in chunk.ids.iter().flatten() {
            hasher.update_str(id);
        }
        hasher.update_str(chunk.name.as_deref().unwrap_or_default());

        let mut xor = XorDigest::new();
        for module in chunk_graph.modules_of_chunk(ukey) {
            match chunk_graph.module_hash(module, &chunk.runtime) {
                Some(hash) => xor.add(hash),
                None => xor.add(&module_graph.graph_hash(module, &chunk.runtime)),
            }
        }
        hasher.update_str(&xor.to_hex());

        let mut entries: Vec<(&str, String)> = chunk_graph
            .entry_modules_with_group(ukey)
            .into_iter()
            .map(|(module, group)| (module_graph.identifier(module), group.to_string()))
            .collect();
        entries.sort();
        for (module, group) in entries {
            hasher.update_str(module);
            hasher.update_str(&group);
        }

        for runtime_module in chunk_graph.chunk_runtime_modules_in_order(ukey, module_graph) {
            hasher.update_str(module_graph.identifier(runtime_module));
        }

        for reference in references {
            if let Some(hash) = chunk_graph.try_chunk(*reference).and_then(|c| c.hash.as_deref()) {
                hasher.update_str(hash);
            }
        }
        hasher.digest()
    };

    let rendered = shorten_hash(&digest, options.digest_length);
    let chunk = chunk_graph.chunk_mut(ukey);
    chunk.content_hash.insert(JAVASCRIPT.to_string(), rendered.clone());
    chunk.rendered_hash = Some(rendered);
    chunk.hash = Some(digest);
}
