//! Per-module and per-chunk records of the chunk graph

use std::collections::BTreeSet;

use crate::runtime::RuntimeSpecMap;
use crate::ukey::{ChunkGroupUkey, ChunkUkey, ModuleId, UkeyIndexMap, UkeyIndexSet};
use crate::utils::DerivedCache;

/// Hash pair stored per module and runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleHashes {
    pub hash: String,
    pub rendered_hash: String,
}

/// Chunk graph view of a module
#[derive(Debug, Default, Clone)]
pub struct ChunkGraphModule {
    pub(crate) chunks: UkeyIndexSet<ChunkUkey>,
    pub(crate) entry_in_chunks: Option<UkeyIndexSet<ChunkUkey>>,
    pub(crate) runtime_in_chunks: Option<UkeyIndexSet<ChunkUkey>>,
    pub(crate) id: Option<String>,
    pub(crate) hashes: RuntimeSpecMap<ModuleHashes>,
    pub(crate) runtime_requirements: RuntimeSpecMap<BTreeSet<String>>,
}

impl ChunkGraphModule {
    pub fn chunks(&self) -> impl Iterator<Item = ChunkUkey> + '_ {
        self.chunks.iter().copied()
    }

    pub fn is_entry(&self) -> bool {
        self.entry_in_chunks
            .as_ref()
            .is_some_and(|chunks| !chunks.is_empty())
    }

    pub fn is_runtime(&self) -> bool {
        self.runtime_in_chunks
            .as_ref()
            .is_some_and(|chunks| !chunks.is_empty())
    }
}

/// Chunk graph view of a chunk
#[derive(Debug, Default, Clone)]
pub struct ChunkGraphChunk {
    pub(crate) modules: UkeyIndexSet<ModuleId>,
    pub(crate) runtime_modules: UkeyIndexSet<ModuleId>,

    /// Entry module -> entrypoint that owns it
    pub(crate) entry_modules: UkeyIndexMap<ModuleId, ChunkGroupUkey>,

    /// Modules whose hash depends on the full build hash
    pub(crate) full_hash_modules: Option<UkeyIndexSet<ModuleId>>,

    pub(crate) runtime_requirements: BTreeSet<String>,
    pub(crate) runtime_requirements_in_tree: BTreeSet<String>,

    /// Bumped whenever `modules` changes
    pub(crate) generation: u64,
    pub(crate) sorted_modules: DerivedCache<Vec<ModuleId>>,
}

impl ChunkGraphChunk {
    pub(crate) fn add_module(&mut self, module: ModuleId) -> bool {
        let inserted = self.modules.insert(module);
        if inserted {
            self.generation += 1;
        }
        inserted
    }

    pub(crate) fn remove_module(&mut self, module: ModuleId) -> bool {
        let removed = self.modules.shift_remove(&module);
        if removed {
            self.generation += 1;
        }
        removed
    }

    pub fn modules(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.modules.iter().copied()
    }
}
