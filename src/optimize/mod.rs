//! Chunk optimization passes
//!
//! All passes are built on [`ChunkGraph::can_chunks_be_integrated`] and
//! [`ChunkGraph::integrate_chunks`], so they never break the loading
//! guarantees established by derivation.

use std::cmp::Ordering;

use tracing::{debug, info};

use crate::chunk_graph::{ChunkGraph, ChunkSizeOptions};
use crate::graph::ModuleGraph;
use crate::ukey::ChunkUkey;

/// Which passes to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizeOptions {
    pub remove_empty_chunks: bool,
    pub merge_duplicate_chunks: bool,
    /// Merge chunks until at most this many remain
    pub max_chunks: Option<usize>,
    pub size: ChunkSizeOptions,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            remove_empty_chunks: true,
            merge_duplicate_chunks: true,
            max_chunks: None,
            size: ChunkSizeOptions::default(),
        }
    }
}

/// What the passes changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub removed_empty: usize,
    pub merged_duplicates: usize,
    pub merged_for_limit: usize,
}

/// Run the enabled passes in order: empty, duplicates, count limit
pub fn optimize_chunks(
    module_graph: &ModuleGraph,
    chunk_graph: &mut ChunkGraph,
    options: &OptimizeOptions,
) -> OptimizeStats {
    let mut stats = OptimizeStats::default();
    if options.remove_empty_chunks {
        stats.removed_empty = remove_empty_chunks(chunk_graph);
    }
    if options.merge_duplicate_chunks {
        stats.merged_duplicates = merge_duplicate_chunks(chunk_graph);
    }
    if let Some(max) = options.max_chunks {
        stats.merged_for_limit = limit_chunk_count(module_graph, chunk_graph, max, &options.size);
    }
    info!(
        "optimized chunks: {} empty removed, {} duplicates merged, {} merged for limit",
        stats.removed_empty, stats.merged_duplicates, stats.merged_for_limit
    );
    stats
}

fn chunks_by_creation(chunk_graph: &ChunkGraph) -> Vec<ChunkUkey> {
    let mut chunks = chunk_graph.chunk_ukeys();
    chunks.sort_by_key(|c| chunk_graph.chunk(*c).debug_id);
    chunks
}

/// Remove chunks with no modules that are not needed as runtime or entry chunk
pub fn remove_empty_chunks(chunk_graph: &mut ChunkGraph) -> usize {
    let empty: Vec<ChunkUkey> = chunks_by_creation(chunk_graph)
        .into_iter()
        .filter(|&chunk| {
            chunk_graph.number_of_chunk_modules(chunk) == 0
                && chunk_graph.number_of_entry_modules(chunk) == 0
                && !chunk_graph.has_chunk_runtime_modules(chunk)
                && !chunk_graph
                    .chunk(chunk)
                    .has_runtime(chunk_graph.chunk_groups_by_ukey())
        })
        .collect();
    for &chunk in &empty {
        debug!("removing empty chunk {}", chunk_graph.chunk(chunk).display_name());
        chunk_graph.remove_chunk(chunk);
    }
    empty.len()
}

/// Merge chunks that contain exactly the same modules
pub fn merge_duplicate_chunks(chunk_graph: &mut ChunkGraph) -> usize {
    let mut merged = 0;
    for chunk in chunks_by_creation(chunk_graph) {
        if chunk_graph.try_chunk(chunk).is_none() {
            continue;
        }
        let Some(first) = chunk_graph.modules_of_chunk(chunk).next() else {
            continue;
        };
        // every duplicate must also contain the first module
        let candidates: Vec<ChunkUkey> = chunk_graph
            .chunks_of_module(first)
            .into_iter()
            .filter(|&other| {
                other != chunk
                    && chunk_graph.number_of_chunk_modules(other)
                        == chunk_graph.number_of_chunk_modules(chunk)
                    && chunk_graph
                        .modules_of_chunk(chunk)
                        .all(|m| chunk_graph.is_module_in_chunk(m, other))
            })
            .collect();
        for other in candidates {
            if chunk_graph.can_chunks_be_integrated(chunk, other) {
                debug!(
                    "merging duplicate chunk {} into {}",
                    chunk_graph.chunk(other).display_name(),
                    chunk_graph.chunk(chunk).display_name()
                );
                chunk_graph.integrate_chunks(chunk, other);
                merged += 1;
            }
        }
    }
    merged
}

/// One possible merge and what it saves
struct Combination {
    a: ChunkUkey,
    b: ChunkUkey,
    order: (u32, u32),
    delta: i128,
    integrated: u64,
}

/// Merge the pair with the largest size saving until at most `max_chunks`
/// chunks remain or no pair can be merged.
pub fn limit_chunk_count(
    module_graph: &ModuleGraph,
    chunk_graph: &mut ChunkGraph,
    max_chunks: usize,
    options: &ChunkSizeOptions,
) -> usize {
    let max_chunks = max_chunks.max(1);
    let mut merged = 0;
    while chunk_graph.chunk_count() > max_chunks {
        let chunks = chunks_by_creation(chunk_graph);
        let mut best: Option<Combination> = None;
        for (i, &a) in chunks.iter().enumerate() {
            for &b in &chunks[i + 1..] {
                if !chunk_graph.can_chunks_be_integrated(a, b) {
                    continue;
                }
                let integrated = chunk_graph.integrated_chunks_size(a, b, module_graph, options);
                let separate = chunk_graph
                    .chunk_size(a, module_graph, options)
                    .saturating_add(chunk_graph.chunk_size(b, module_graph, options));
                let candidate = Combination {
                    a,
                    b,
                    order: (chunk_graph.chunk(a).debug_id, chunk_graph.chunk(b).debug_id),
                    delta: i128::from(separate) - i128::from(integrated),
                    integrated,
                };
                let better = match &best {
                    None => true,
                    Some(current) => compare_combinations(&candidate, current) == Ordering::Less,
                };
                if better {
                    best = Some(candidate);
                }
            }
        }
        let Some(best) = best else {
            debug!("no more chunks can be merged; {} remain", chunk_graph.chunk_count());
            break;
        };
        debug!(
            "merging {} and {} saves {}",
            chunk_graph.chunk(best.a).display_name(),
            chunk_graph.chunk(best.b).display_name(),
            best.delta
        );
        chunk_graph.integrate_chunks(best.a, best.b);
        merged += 1;
    }
    merged
}

/// Largest saving first, then smallest result, then creation order
fn compare_combinations(a: &Combination, b: &Combination) -> Ordering {
    b.delta
        .cmp(&a.delta)
        .then_with(|| a.integrated.cmp(&b.integrated))
        .then_with(|| a.order.cmp(&b.order))
}
