//! Core bundler implementation
//!
//! Builds the module graph described by a manifest and runs the seal
//! pipeline over it: derive chunks, optimize, assign ids, hash and record
//! output files.

use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::chunk::EntryOptions;
use crate::chunk_graph::ChunkGraph;
use crate::config::{Config, DependencyConfig, ModuleConfig};
use crate::deriver::{derive_chunk_graph, EntryData};
use crate::graph::{
    ActivationCondition, AsyncBlock, Dependency, DependencyParent, Module, ModuleGraph,
};
use crate::hashing::{hash_chunks, HashReport};
use crate::ids::{assign_chunk_ids, assign_module_hashes, assign_module_ids};
use crate::optimize::{optimize_chunks, OptimizeStats};
use crate::runtime::RuntimeSpec;
use crate::ukey::{ChunkGroupUkey, ChunkUkey, ModuleId};
use crate::utils::render_filename;

/// Per-build overrides of the manifest settings
#[derive(Debug, Clone, Default)]
pub struct SealOptions {
    /// Overrides `optimization.max_chunks`
    pub max_chunks: Option<usize>,
}

/// A sealed compilation: both graphs plus what the passes reported
#[derive(Debug)]
pub struct Compilation {
    pub module_graph: ModuleGraph,
    pub chunk_graph: ChunkGraph,
    pub optimize_stats: OptimizeStats,
    pub hash_report: HashReport,
}

/// Information about one emitted chunk
#[derive(Debug, Clone, Serialize)]
pub struct ChunkSummary {
    pub id: String,
    pub name: Option<String>,
    pub files: Vec<String>,
    pub hash: String,
    pub runtime: Vec<String>,
    pub initial: bool,
    pub entry: bool,
    pub size: u64,
    pub modules: Vec<String>,
}

/// Information about one entrypoint
#[derive(Debug, Clone, Serialize)]
pub struct EntrypointSummary {
    pub name: String,
    pub chunks: Vec<String>,
    pub runtime_chunk: Option<String>,
}

/// Serializable result of a build
#[derive(Debug, Clone, Serialize)]
pub struct SealResult {
    pub project: String,
    pub modules: usize,
    pub chunks: Vec<ChunkSummary>,
    pub entrypoints: Vec<EntrypointSummary>,
    pub warnings: Vec<String>,
    pub full_hash: String,
}

impl Compilation {
    /// Summarize the sealed chunk graph
    pub fn summary(&self, project: &str) -> SealResult {
        let cg = &self.chunk_graph;
        let groups = cg.chunk_groups_by_ukey();

        let mut chunk_ukeys = cg.chunk_ukeys();
        chunk_ukeys.sort_by(|a, b| cg.chunk(*a).compare_by_id(cg.chunk(*b)));
        let chunks = chunk_ukeys
            .into_iter()
            .map(|ukey| {
                let chunk = cg.chunk(ukey);
                ChunkSummary {
                    id: chunk.id.clone().unwrap_or_else(|| chunk.display_name()),
                    name: chunk.name.clone(),
                    files: chunk.files.iter().cloned().collect(),
                    hash: chunk.rendered_hash.clone().unwrap_or_default(),
                    runtime: chunk.runtime.names().into_iter().map(str::to_string).collect(),
                    initial: chunk.can_be_initial(groups),
                    entry: chunk.has_runtime(groups),
                    size: cg.chunk_modules_size(ukey, &self.module_graph),
                    modules: cg
                        .chunk_module_identifiers(ukey, &self.module_graph)
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                }
            })
            .collect();

        let chunk_id = |ukey: ChunkUkey| {
            let chunk = cg.chunk(ukey);
            chunk.id.clone().unwrap_or_else(|| chunk.display_name())
        };
        let entrypoints = cg
            .entrypoints()
            .map(|(name, ukey)| {
                let group = cg.chunk_group(ukey);
                EntrypointSummary {
                    name: name.to_string(),
                    chunks: group.chunks().iter().map(|c| chunk_id(*c)).collect(),
                    runtime_chunk: group.get_runtime_chunk(groups).map(chunk_id),
                }
            })
            .collect();

        SealResult {
            project: project.to_string(),
            modules: self.module_graph.len(),
            chunks,
            entrypoints,
            warnings: self.hash_report.warnings.iter().map(ToString::to_string).collect(),
            full_hash: self.hash_report.full_hash.clone(),
        }
    }
}

/// The main bundler
pub struct Bundler {
    /// Project configuration
    config: Config,

    /// Build options
    options: SealOptions,
}

impl Bundler {
    /// Create a new bundler instance
    pub fn new(config: Config, options: SealOptions) -> Self {
        Self { config, options }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build and seal the project
    pub fn build(&self) -> Result<Compilation> {
        let start = Instant::now();

        // 1. Build the module graph from the manifest
        info!("Building module graph...");
        let mut module_graph = self.build_module_graph()?;
        let entries = self.entries(&module_graph)?;
        for entry in &entries {
            for &module in &entry.modules {
                module_graph.assign_depth(module);
            }
        }
        module_graph.freeze();

        // 2. Derive chunks
        info!("Deriving chunk graph...");
        let mut chunk_graph = derive_chunk_graph(&mut module_graph, &entries)
            .context("Failed to derive chunk graph")?;
        self.attach_runtime_modules(&module_graph, &mut chunk_graph);

        // 3. Optimize
        info!("Optimizing chunks...");
        let mut optimize_options = self.config.optimization.to_options();
        if self.options.max_chunks.is_some() {
            optimize_options.max_chunks = self.options.max_chunks;
        }
        let optimize_stats = optimize_chunks(&module_graph, &mut chunk_graph, &optimize_options);

        // 4. Assign ids and hashes
        info!("Hashing chunks...");
        assign_module_ids(&module_graph, &mut chunk_graph);
        assign_chunk_ids(&mut chunk_graph);
        assign_module_hashes(
            &module_graph,
            &mut chunk_graph,
            self.config.output.hash_digest_length,
        );
        let hash_report = hash_chunks(
            &module_graph,
            &mut chunk_graph,
            &self.config.output.hash_options(),
        )
        .context("Failed to hash chunks")?;

        // 5. Record output files
        self.record_files(&mut chunk_graph);

        debug!("Build completed in {:?}", start.elapsed());

        Ok(Compilation {
            module_graph,
            chunk_graph,
            optimize_stats,
            hash_report,
        })
    }

    /// Add every declared module, then wire dependencies and blocks
    pub fn build_module_graph(&self) -> Result<ModuleGraph> {
        let mut graph = ModuleGraph::new();

        for config in &self.config.modules {
            let mut module = if config.runtime {
                Module::runtime(config.id.as_str(), config.size, config.stage)
            } else {
                Module::new(config.id.as_str(), config.size)
            };
            if let Some(hash) = &config.hash {
                module = module.with_build_hash(hash.as_str());
            }
            module.exports = config.exports.clone();
            graph.add_module(module);
        }

        for config in &self.config.modules {
            let origin = self.lookup(&graph, &config.id)?;
            self.add_dependencies(&mut graph, origin, DependencyParent::Module(origin), &config.dependencies)
                .with_context(|| format!("Failed to wire dependencies of '{}'", config.id))?;
            self.add_blocks(&mut graph, origin, config)?;
        }

        debug!(
            "module graph has {} modules and {} connections",
            graph.len(),
            graph.connection_count()
        );
        Ok(graph)
    }

    fn add_blocks(&self, graph: &mut ModuleGraph, origin: ModuleId, config: &ModuleConfig) -> Result<()> {
        for block_config in &config.blocks {
            let mut block = AsyncBlock::new(origin);
            if block_config.entry {
                block = block.with_entry_options(EntryOptions {
                    name: block_config.chunk_name.clone(),
                    runtime: block_config.runtime.clone(),
                    group: block_config.group_options(),
                    ..Default::default()
                });
            } else if block_config.is_async() {
                block = block.with_group_options(block_config.group_options());
            }
            block.loc = block_config.loc.clone();
            block.request = block_config
                .dependencies
                .first()
                .map(|dependency| dependency.target.clone());

            let block = graph.add_block(block);
            self.add_dependencies(graph, origin, DependencyParent::Block(block), &block_config.dependencies)
                .with_context(|| format!("Failed to wire a block of '{}'", config.id))?;
        }
        Ok(())
    }

    fn add_dependencies(
        &self,
        graph: &mut ModuleGraph,
        origin: ModuleId,
        parent: DependencyParent,
        dependencies: &[DependencyConfig],
    ) -> Result<()> {
        for config in dependencies {
            let target = self.lookup(graph, &config.target)?;
            let mut dependency = Dependency::new(parent, config.target.as_str());
            if config.weak {
                dependency = dependency.weak();
            }
            if config.transitive_only {
                dependency = dependency.with_condition(ActivationCondition::TransitiveOnly);
            } else if !config.active_in.is_empty() {
                dependency = dependency.with_condition(ActivationCondition::Runtimes(
                    RuntimeSpec::from_names(config.active_in.iter().cloned()),
                ));
            }
            let dependency = graph.add_dependency(dependency);
            graph.connect(Some(origin), dependency, target);
        }
        Ok(())
    }

    /// Entry definitions for the deriver, in manifest (name) order
    pub fn entries(&self, graph: &ModuleGraph) -> Result<Vec<EntryData>> {
        let mut entries = Vec::with_capacity(self.config.entrypoints.len());
        for (name, config) in &self.config.entrypoints {
            let modules = config
                .import
                .iter()
                .map(|import| self.lookup(graph, import))
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("Invalid entrypoint '{}'", name))?;
            let mut entry = EntryData::new(name.as_str(), modules).depend_on(config.depend_on.iter().cloned());
            if let Some(runtime) = &config.runtime {
                entry = entry.runtime(runtime.as_str());
            }
            entry.options.group.values = config.options.clone();
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Place every runtime module in the runtime chunk of each entrypoint
    fn attach_runtime_modules(&self, module_graph: &ModuleGraph, chunk_graph: &mut ChunkGraph) {
        let runtime_modules: Vec<ModuleId> = module_graph
            .module_ids()
            .filter(|m| module_graph.module(*m).is_runtime())
            .collect();
        if runtime_modules.is_empty() {
            return;
        }

        let mut entrypoints: Vec<ChunkGroupUkey> = chunk_graph.entrypoints().map(|(_, ukey)| ukey).collect();
        entrypoints.extend(chunk_graph.async_entrypoints().iter().copied());
        let mut runtime_chunks: Vec<ChunkUkey> = entrypoints
            .into_iter()
            .filter_map(|ukey| {
                chunk_graph
                    .chunk_group(ukey)
                    .get_runtime_chunk(chunk_graph.chunk_groups_by_ukey())
            })
            .collect();
        runtime_chunks.sort_by_key(|c| chunk_graph.chunk(*c).debug_id);
        runtime_chunks.dedup();

        let identifiers: Vec<&str> = runtime_modules
            .iter()
            .map(|m| module_graph.identifier(*m))
            .collect();
        for chunk in runtime_chunks {
            for &module in &runtime_modules {
                chunk_graph.connect_chunk_and_runtime_module(chunk, module);
            }
            chunk_graph.add_chunk_runtime_requirements(chunk, identifiers.iter().copied());
        }
    }

    fn record_files(&self, chunk_graph: &mut ChunkGraph) {
        let template = &self.config.output.filename;
        for ukey in chunk_graph.chunk_ukeys() {
            let chunk = chunk_graph.chunk_mut(ukey);
            let id = chunk.id.clone().unwrap_or_else(|| chunk.debug_id.to_string());
            let name = chunk.name.clone().unwrap_or_else(|| id.clone());
            let hash = chunk.rendered_hash.clone().unwrap_or_default();
            let file = render_filename(template, &name, &id, &hash);
            debug!("chunk {} -> {}", id, file);
            chunk.files.insert(file);
        }
    }

    fn lookup(&self, graph: &ModuleGraph, identifier: &str) -> Result<ModuleId> {
        Ok(graph.expect_module_id(identifier)?)
    }
}
