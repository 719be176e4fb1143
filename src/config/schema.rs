//! Manifest schema definitions

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chunk::{ChunkGroupOptions, OptionValue};
use crate::chunk_graph::ChunkSizeOptions;
use crate::hashing::HashOptions;
use crate::optimize::OptimizeOptions;

/// Project metadata configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Project version
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// One named entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryConfig {
    /// Module identifiers loaded by this entry, in order
    pub import: Vec<String>,

    /// Entries whose runtime and modules this entry builds upon
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depend_on: Vec<String>,

    /// Name of a runtime chunk shared with other entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,

    /// Group options such as `preloadOrder`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, OptionValue>,
}

/// One module as produced by the upstream build
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Stable module identifier
    pub id: String,

    /// Size estimate used by the chunk cost model
    #[serde(default)]
    pub size: u64,

    /// Upstream build hash of the module content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    /// Marks a runtime-only module
    #[serde(default)]
    pub runtime: bool,

    /// Ordering stage of a runtime module
    #[serde(default)]
    pub stage: i32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<BlockConfig>,
}

/// A synchronous dependency
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyConfig {
    /// Identifier of the target module
    pub target: String,

    #[serde(default)]
    pub weak: bool,

    /// Only active in these runtimes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub active_in: Vec<String>,

    /// Target is walked through but not included
    #[serde(default)]
    pub transitive_only: bool,
}

/// A dependency block. With a chunk name, options or entry it is an async
/// boundary; otherwise it behaves like the module's own dependencies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_name: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, OptionValue>,

    /// Starts a separate (worker-style) entrypoint
    #[serde(default)]
    pub entry: bool,

    /// Runtime of the entrypoint started by an `entry` block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<String>,

    #[serde(default)]
    pub dependencies: Vec<DependencyConfig>,
}

impl BlockConfig {
    pub fn is_async(&self) -> bool {
        self.entry || self.chunk_name.is_some() || !self.options.is_empty()
    }

    pub fn group_options(&self) -> ChunkGroupOptions {
        ChunkGroupOptions {
            name: self.chunk_name.clone(),
            values: self.options.clone(),
        }
    }
}

/// Chunk optimization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationConfig {
    #[serde(default = "default_chunk_overhead")]
    pub chunk_overhead: u64,

    #[serde(default = "default_entry_chunk_multiplicator")]
    pub entry_chunk_multiplicator: u64,

    #[serde(default = "default_true")]
    pub remove_empty_chunks: bool,

    #[serde(default = "default_true")]
    pub merge_duplicate_chunks: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chunks: Option<usize>,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            chunk_overhead: default_chunk_overhead(),
            entry_chunk_multiplicator: default_entry_chunk_multiplicator(),
            remove_empty_chunks: true,
            merge_duplicate_chunks: true,
            max_chunks: None,
        }
    }
}

impl OptimizationConfig {
    pub fn to_options(&self) -> OptimizeOptions {
        OptimizeOptions {
            remove_empty_chunks: self.remove_empty_chunks,
            merge_duplicate_chunks: self.merge_duplicate_chunks,
            max_chunks: self.max_chunks,
            size: ChunkSizeOptions {
                chunk_overhead: self.chunk_overhead,
                entry_chunk_multiplicator: self.entry_chunk_multiplicator,
            },
        }
    }
}

fn default_chunk_overhead() -> u64 {
    10_000
}

fn default_entry_chunk_multiplicator() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Length of rendered hashes
    #[serde(default = "default_hash_digest_length")]
    pub hash_digest_length: usize,

    /// Filename template with `[name]`, `[id]` and `[hash]`
    #[serde(default = "default_filename")]
    pub filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            hash_digest_length: default_hash_digest_length(),
            filename: default_filename(),
        }
    }
}

impl OutputConfig {
    pub fn hash_options(&self) -> HashOptions {
        HashOptions {
            digest_length: self.hash_digest_length,
        }
    }
}

fn default_hash_digest_length() -> usize {
    20
}

fn default_filename() -> String {
    "[name].[hash].js".to_string()
}
