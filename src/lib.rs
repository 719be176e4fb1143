//! Chunkgraph library
//!
//! The graph core of a bundler: a module graph with runtime-aware
//! connections, the chunk graph derived from it, and the passes that
//! optimize, name and hash the resulting chunks.

pub mod bundler;
pub mod chunk;
pub mod chunk_graph;
pub mod cli;
pub mod config;
pub mod deriver;
pub mod error;
pub mod graph;
pub mod hashing;
pub mod ids;
pub mod optimize;
pub mod runtime;
pub mod ukey;
pub mod utils;

pub use bundler::Bundler;
pub use chunk_graph::ChunkGraph;
pub use cli::Cli;
pub use config::Config;
pub use error::{GraphError, GraphResult};
pub use graph::ModuleGraph;
