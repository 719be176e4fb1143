//! Configuration handling for Chunkgraph
//!
//! Parses and validates `chunkgraph.toml` manifests: the module graph
//! produced by an upstream build plus the entrypoints and chunking options.

mod schema;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use schema::*;

/// Default manifest file name
pub const MANIFEST_FILE: &str = "chunkgraph.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project metadata
    pub project: ProjectConfig,

    /// Named entrypoints
    #[serde(default)]
    pub entrypoints: BTreeMap<String, EntryConfig>,

    /// Every module of the build, in declaration order
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,

    /// Chunk optimization settings
    #[serde(default)]
    pub optimization: OptimizationConfig,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// Root directory (computed from config file location)
    #[serde(skip)]
    pub root: PathBuf,
}

impl Config {
    /// Load configuration from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let canonical_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let content = fs::read_to_string(&canonical_path)
            .with_context(|| format!("Failed to read config file: {}", canonical_path.display()))?;

        let mut config = Self::parse(&content)?;

        // Set root directory to the directory containing the config file
        config.root = canonical_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(config)
    }

    /// Parse and validate manifest text
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(content).with_context(|| format!("Failed to parse {}", MANIFEST_FILE))?;
        config.root = PathBuf::from(".");
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        let mut entrypoints = BTreeMap::new();
        entrypoints.insert(
            "main".to_string(),
            EntryConfig {
                import: vec!["./src/index.js".to_string()],
                ..Default::default()
            },
        );
        Self {
            project: ProjectConfig {
                name: "my-app".to_string(),
                version: "0.1.0".to_string(),
            },
            entrypoints,
            modules: vec![ModuleConfig {
                id: "./src/index.js".to_string(),
                size: 1000,
                ..Default::default()
            }],
            optimization: OptimizationConfig::default(),
            output: OutputConfig::default(),
            root: PathBuf::from("."),
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        // Ensure at least one entrypoint exists
        if self.entrypoints.is_empty() {
            anyhow::bail!("At least one entrypoint must be specified in {}", MANIFEST_FILE);
        }

        let mut known = BTreeSet::new();
        for module in &self.modules {
            if module.id.is_empty() {
                anyhow::bail!("Module ids must not be empty");
            }
            if !known.insert(module.id.as_str()) {
                anyhow::bail!("Module '{}' is declared more than once", module.id);
            }
        }

        for (name, entry) in &self.entrypoints {
            if entry.import.is_empty() {
                anyhow::bail!("Entrypoint '{}' must import at least one module", name);
            }
            for import in &entry.import {
                if !known.contains(import.as_str()) {
                    anyhow::bail!("Entrypoint '{}' imports unknown module '{}'", name, import);
                }
            }
        }

        for module in &self.modules {
            let block_dependencies = module.blocks.iter().flat_map(|b| &b.dependencies);
            for dependency in module.dependencies.iter().chain(block_dependencies) {
                if !known.contains(dependency.target.as_str()) {
                    anyhow::bail!(
                        "Module '{}' depends on unknown module '{}'",
                        module.id,
                        dependency.target
                    );
                }
            }
        }

        if self.output.hash_digest_length == 0 || self.output.hash_digest_length > 64 {
            anyhow::bail!(
                "output.hash_digest_length must be between 1 and 64, got {}",
                self.output.hash_digest_length
            );
        }

        Ok(())
    }

    /// Look up a module declaration
    pub fn module(&self, id: &str) -> Option<&ModuleConfig> {
        self.modules.iter().find(|m| m.id == id)
    }

    /// Sum of every declared module size
    pub fn total_module_size(&self) -> u64 {
        self.modules.iter().map(|m| m.size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
[project]
name = "shop"

[entrypoints.main]
import = ["./index.js"]

[entrypoints.admin]
import = ["./admin.js"]
depend_on = ["main"]

[[modules]]
id = "./index.js"
size = 1200
hash = "a1b2"

[[modules.dependencies]]
target = "./util.js"

[[modules.blocks]]
chunk_name = "cart"
options = { prefetchOrder = 2 }

[[modules.blocks.dependencies]]
target = "./cart.js"

[[modules]]
id = "./util.js"
size = 300

[[modules]]
id = "./cart.js"
size = 800

[[modules]]
id = "./admin.js"
size = 500

[[modules.dependencies]]
target = "./util.js"
active_in = ["admin"]
"#;

    #[test]
    fn test_parse_manifest() {
        let config = Config::parse(MANIFEST).unwrap();
        assert_eq!(config.project.name, "shop");
        assert_eq!(config.project.version, "0.1.0");
        assert_eq!(config.modules.len(), 4);
        assert_eq!(config.entrypoints["admin"].depend_on, vec!["main".to_string()]);

        let index = config.module("./index.js").unwrap();
        assert_eq!(index.hash.as_deref(), Some("a1b2"));
        assert!(index.blocks[0].is_async());
        assert_eq!(
            index.blocks[0].options.get("prefetchOrder"),
            Some(&crate::chunk::OptionValue::Number(2))
        );
        assert_eq!(config.total_module_size(), 2800);
    }

    #[test]
    fn test_defaults() {
        let config = Config::parse(MANIFEST).unwrap();
        assert_eq!(config.optimization.chunk_overhead, 10_000);
        assert_eq!(config.optimization.entry_chunk_multiplicator, 10);
        assert!(config.optimization.remove_empty_chunks);
        assert_eq!(config.optimization.max_chunks, None);
        assert_eq!(config.output.hash_digest_length, 20);
        assert_eq!(config.output.filename, "[name].[hash].js");
    }

    #[test]
    fn test_requires_entrypoint() {
        let err = Config::parse("[project]\nname = \"x\"\n").unwrap_err();
        assert!(err.to_string().contains("At least one entrypoint"));
    }

    #[test]
    fn test_rejects_unknown_import() {
        let manifest = r#"
[project]
name = "x"

[entrypoints.main]
import = ["./missing.js"]
"#;
        let err = Config::parse(manifest).unwrap_err();
        assert!(err.to_string().contains("unknown module './missing.js'"));
    }

    #[test]
    fn test_rejects_unknown_dependency_target() {
        let manifest = r#"
[project]
name = "x"

[entrypoints.main]
import = ["./a.js"]

[[modules]]
id = "./a.js"

[[modules.dependencies]]
target = "./b.js"
"#;
        assert!(Config::parse(manifest).is_err());
    }

    #[test]
    fn test_rejects_duplicate_module() {
        let manifest = r#"
[project]
name = "x"

[entrypoints.main]
import = ["./a.js"]

[[modules]]
id = "./a.js"

[[modules]]
id = "./a.js"
"#;
        let err = Config::parse(manifest).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_load_sets_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        fs::write(&path, MANIFEST).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.root, dir.path());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default_config();
        let text = toml::to_string(&config).unwrap();
        let parsed = Config::parse(&text).unwrap();
        assert_eq!(parsed.entrypoints.len(), 1);
    }
}
