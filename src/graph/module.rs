//! Modules, dependencies and dependency blocks as handed over by the builder

use crate::chunk::{ChunkGroupOptions, EntryOptions};
use crate::graph::ActivationCondition;
use crate::ukey::{BlockId, DependencyId, ModuleId};

/// Kind of module stored in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Regular module produced by the builder
    Normal,
    /// Runtime-only helper attached to runtime chunks, ordered by `stage`
    Runtime { stage: i32 },
}

/// A built module
#[derive(Debug, Clone)]
pub struct Module {
    /// Stable identifier (usually the resolved request)
    pub identifier: String,

    /// Estimated output size
    pub size: u64,

    pub kind: ModuleKind,

    /// Content hash reported by the builder
    pub build_hash: Option<String>,

    /// Names this module provides, folded into the graph-shape hash
    pub exports: Vec<String>,

    /// Module-level dependencies in source order
    pub dependencies: Vec<DependencyId>,

    /// Top-level dependency blocks in source order
    pub blocks: Vec<BlockId>,
}

impl Module {
    pub fn new(identifier: impl Into<String>, size: u64) -> Self {
        Self {
            identifier: identifier.into(),
            size,
            kind: ModuleKind::Normal,
            build_hash: None,
            exports: Vec::new(),
            dependencies: Vec::new(),
            blocks: Vec::new(),
        }
    }

    /// Create a runtime module with the given stage
    pub fn runtime(identifier: impl Into<String>, size: u64, stage: i32) -> Self {
        Self {
            kind: ModuleKind::Runtime { stage },
            ..Self::new(identifier, size)
        }
    }

    pub fn with_build_hash(mut self, hash: impl Into<String>) -> Self {
        self.build_hash = Some(hash.into());
        self
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self.kind, ModuleKind::Runtime { .. })
    }

    pub fn stage(&self) -> i32 {
        match self.kind {
            ModuleKind::Runtime { stage } => stage,
            ModuleKind::Normal => 0,
        }
    }
}

/// Where a dependency was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyParent {
    Module(ModuleId),
    Block(BlockId),
}

/// A request from one module towards another
#[derive(Debug, Clone)]
pub struct Dependency {
    pub request: String,
    pub weak: bool,
    pub condition: ActivationCondition,
    pub parent: DependencyParent,
}

impl Dependency {
    pub fn new(parent: DependencyParent, request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            weak: false,
            condition: ActivationCondition::Always,
            parent,
        }
    }

    pub fn weak(mut self) -> Self {
        self.weak = true;
        self
    }

    pub fn with_condition(mut self, condition: ActivationCondition) -> Self {
        self.condition = condition;
        self
    }
}

/// A nested dependency block.
///
/// A block that declares group options (or entry options) is an async
/// boundary; otherwise its dependencies behave like the module's own.
#[derive(Debug, Clone)]
pub struct AsyncBlock {
    pub module: ModuleId,
    pub parent_block: Option<BlockId>,
    pub group_options: Option<ChunkGroupOptions>,
    /// Makes the block spawn a separate entrypoint (e.g. a worker)
    pub entry_options: Option<EntryOptions>,
    pub loc: Option<String>,
    pub request: Option<String>,
    pub dependencies: Vec<DependencyId>,
    pub blocks: Vec<BlockId>,
}

impl AsyncBlock {
    pub fn new(module: ModuleId) -> Self {
        Self {
            module,
            parent_block: None,
            group_options: None,
            entry_options: None,
            loc: None,
            request: None,
            dependencies: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn with_group_options(mut self, options: ChunkGroupOptions) -> Self {
        self.group_options = Some(options);
        self
    }

    pub fn with_entry_options(mut self, options: EntryOptions) -> Self {
        self.entry_options = Some(options);
        self
    }

    pub fn is_async_boundary(&self) -> bool {
        self.group_options.is_some() || self.entry_options.is_some()
    }

    pub fn chunk_name(&self) -> Option<&str> {
        self.entry_options
            .as_ref()
            .and_then(|options| options.name.as_deref())
            .or_else(|| self.group_options.as_ref()?.name.as_deref())
    }
}
