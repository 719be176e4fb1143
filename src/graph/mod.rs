//! Module graph data structures
//!
//! The [`ModuleGraph`] owns every module, dependency and block, plus one
//! [`Connection`] per resolved dependency. Connections are indexed from both
//! ends so incoming and outgoing edges stay mirrored.

mod connection;
mod module;

use std::collections::VecDeque;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::error::{GraphError, GraphResult};
use crate::runtime::RuntimeSpec;
use crate::ukey::{
    BlockId, ConnectionId, DependencyId, ModuleId, UkeyAllocator, UkeyIndexMap, UkeyIndexSet,
};
use crate::utils::ContentHasher;

pub use connection::{
    intersect_states, merge_states, ActivationCondition, Connection, ConnectionState,
};
pub use module::{AsyncBlock, Dependency, DependencyParent, Module, ModuleKind};

/// Per-module graph bookkeeping
#[derive(Debug, Default, Clone)]
struct ModuleGraphModule {
    incoming: UkeyIndexSet<ConnectionId>,
    outgoing: UkeyIndexSet<ConnectionId>,
    depth: Option<usize>,
    pre_order_index: Option<usize>,
    post_order_index: Option<usize>,
}

/// The module dependency graph
#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: Vec<Module>,
    module_info: Vec<ModuleGraphModule>,

    /// Map from identifier to module ID
    identifier_to_id: FxHashMap<String, ModuleId>,

    dependencies: Vec<Dependency>,
    blocks: Vec<AsyncBlock>,

    connections: UkeyIndexMap<ConnectionId, Connection>,
    dependency_to_connection: FxHashMap<DependencyId, ConnectionId>,
    connection_keys: UkeyAllocator,

    /// Bumped on every mutation
    generation: u64,
    frozen: bool,

    /// Graph-shape hashes memoized while frozen, keyed by (module, runtime key)
    graph_hash_cache: Mutex<FxHashMap<(ModuleId, String), (u64, String)>>,
}

impl ModuleGraph {
    /// Create a new empty module graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module to the graph, returning the existing ID for a known identifier
    pub fn add_module(&mut self, module: Module) -> ModuleId {
        if let Some(&id) = self.identifier_to_id.get(&module.identifier) {
            return id;
        }
        self.invalidate();

        let id = ModuleId::from(self.modules.len());
        self.identifier_to_id.insert(module.identifier.clone(), id);
        self.modules.push(module);
        self.module_info.push(ModuleGraphModule::default());
        id
    }

    /// Declare a dependency on a module or block
    pub fn add_dependency(&mut self, dependency: Dependency) -> DependencyId {
        self.invalidate();
        let id = DependencyId::from(self.dependencies.len());
        match dependency.parent {
            DependencyParent::Module(module) => self.modules[module.index()].dependencies.push(id),
            DependencyParent::Block(block) => self.blocks[block.index()].dependencies.push(id),
        }
        self.dependencies.push(dependency);
        id
    }

    /// Declare a nested block on its module (or parent block)
    pub fn add_block(&mut self, block: AsyncBlock) -> BlockId {
        self.invalidate();
        let id = BlockId::from(self.blocks.len());
        match block.parent_block {
            Some(parent) => self.blocks[parent.index()].blocks.push(id),
            None => self.modules[block.module.index()].blocks.push(id),
        }
        self.blocks.push(block);
        id
    }

    /// Get module ID from identifier
    pub fn module_id(&self, identifier: &str) -> Option<ModuleId> {
        self.identifier_to_id.get(identifier).copied()
    }

    /// Get module ID from identifier or fail
    pub fn expect_module_id(&self, identifier: &str) -> GraphResult<ModuleId> {
        self.module_id(identifier)
            .ok_or_else(|| GraphError::UnknownModule(identifier.to_string()))
    }

    /// Get a module by ID
    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.index()]
    }

    pub fn identifier(&self, id: ModuleId) -> &str {
        &self.modules[id.index()].identifier
    }

    pub fn dependency(&self, id: DependencyId) -> &Dependency {
        &self.dependencies[id.index()]
    }

    pub fn block(&self, id: BlockId) -> &AsyncBlock {
        &self.blocks[id.index()]
    }

    /// Get all module IDs
    pub fn module_ids(&self) -> impl Iterator<Item = ModuleId> + '_ {
        (0..self.modules.len()).map(ModuleId::from)
    }

    /// Total number of modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if graph is empty
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    // ---------------------------------------------------------------------
    // Connections
    // ---------------------------------------------------------------------

    /// Materialize the connection of `dependency` from `origin` to `target`.
    ///
    /// A dependency owns at most one connection; reconnecting replaces it.
    pub fn connect(
        &mut self,
        origin: Option<ModuleId>,
        dependency: DependencyId,
        target: ModuleId,
    ) -> ConnectionId {
        if self.dependency_to_connection.contains_key(&dependency) {
            self.disconnect(dependency);
        }
        self.invalidate();

        let dep = &self.dependencies[dependency.index()];
        let connection = Connection::new(origin, dependency, target, dep.condition.clone(), dep.weak);
        let id: ConnectionId = self.connection_keys.alloc();
        trace!("connect {:?} -> {:?} via {:?}", origin, target, dependency);

        if let Some(origin) = origin {
            self.module_info[origin.index()].outgoing.insert(id);
        }
        self.module_info[target.index()].incoming.insert(id);
        self.dependency_to_connection.insert(dependency, id);
        self.connections.insert(id, connection);
        id
    }

    /// Remove the connection of `dependency` from both ends
    pub fn disconnect(&mut self, dependency: DependencyId) -> Option<Connection> {
        let id = self.dependency_to_connection.remove(&dependency)?;
        self.invalidate();
        let connection = self.connections.shift_remove(&id)?;
        if let Some(origin) = connection.origin {
            self.module_info[origin.index()].outgoing.shift_remove(&id);
        }
        self.module_info[connection.target.index()]
            .incoming
            .shift_remove(&id);
        trace!("disconnect {:?} -> {:?}", connection.origin, connection.target);
        Some(connection)
    }

    /// Enable or disable a connection without removing it
    pub fn set_connection_active(&mut self, dependency: DependencyId, active: bool) {
        let Some(id) = self.dependency_to_connection.get(&dependency).copied() else {
            return;
        };
        self.invalidate();
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.set_active(active);
        }
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn connection_for_dependency(&self, dependency: DependencyId) -> Option<&Connection> {
        self.dependency_to_connection
            .get(&dependency)
            .and_then(|id| self.connections.get(id))
    }

    pub fn incoming_connections(&self, module: ModuleId) -> impl Iterator<Item = &Connection> {
        self.module_info[module.index()]
            .incoming
            .iter()
            .filter_map(|id| self.connections.get(id))
    }

    pub fn outgoing_connections(&self, module: ModuleId) -> impl Iterator<Item = &Connection> {
        self.module_info[module.index()]
            .outgoing
            .iter()
            .filter_map(|id| self.connections.get(id))
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Activation state of a connection for a runtime
    pub fn active_state(&self, connection: ConnectionId, runtime: &RuntimeSpec) -> ConnectionState {
        self.connections
            .get(&connection)
            .map(|connection| connection.active_state(runtime))
            .unwrap_or(ConnectionState::Never)
    }

    /// Targets of the given dependencies with their state for `runtime`
    pub fn dependency_targets(
        &self,
        dependencies: &[DependencyId],
        runtime: &RuntimeSpec,
    ) -> Vec<(ModuleId, ConnectionState)> {
        dependencies
            .iter()
            .filter_map(|dep| self.connection_for_dependency(*dep))
            .map(|connection| (connection.target, connection.active_state(runtime)))
            .collect()
    }

    /// Move every connection of `old` onto `new` (used when a module is rebuilt)
    pub fn replace_module(&mut self, old: ModuleId, new: ModuleId) {
        if old == new {
            return;
        }
        self.invalidate();
        debug!(
            "replacing module {} with {}",
            self.identifier(old),
            self.identifier(new)
        );

        let old_info = std::mem::take(&mut self.module_info[old.index()]);
        for id in old_info.outgoing {
            if let Some(connection) = self.connections.get_mut(&id) {
                connection.origin = Some(new);
            }
            self.module_info[new.index()].outgoing.insert(id);
        }
        for id in old_info.incoming {
            if let Some(connection) = self.connections.get_mut(&id) {
                connection.target = new;
            }
            self.module_info[new.index()].incoming.insert(id);
        }

        let (dependencies, blocks) = {
            let module = &mut self.modules[old.index()];
            (
                std::mem::take(&mut module.dependencies),
                std::mem::take(&mut module.blocks),
            )
        };
        for dep in &dependencies {
            self.dependencies[dep.index()].parent = DependencyParent::Module(new);
        }
        for block in &blocks {
            self.blocks[block.index()].module = new;
        }
        let module = &mut self.modules[new.index()];
        module.dependencies.extend(dependencies);
        module.blocks.extend(blocks);
    }

    // ---------------------------------------------------------------------
    // Depth and ordinals
    // ---------------------------------------------------------------------

    pub fn depth(&self, module: ModuleId) -> Option<usize> {
        self.module_info[module.index()].depth
    }

    fn set_depth_if_lower(&mut self, module: ModuleId, depth: usize) -> bool {
        let info = &mut self.module_info[module.index()];
        match info.depth {
            Some(current) if current <= depth => false,
            _ => {
                info.depth = Some(depth);
                true
            }
        }
    }

    /// Assign depths starting at `module`.
    ///
    /// A module is re-queued whenever a lower depth is found for it, so the
    /// result is the minimum depth seen over every outgoing path.
    pub fn assign_depth(&mut self, module: ModuleId) {
        let mut queue = VecDeque::new();
        if self.set_depth_if_lower(module, 0) {
            queue.push_back(module);
        }
        while let Some(current) = queue.pop_front() {
            let depth = self.module_info[current.index()].depth.unwrap_or(0) + 1;
            let targets: Vec<ModuleId> = self
                .outgoing_connections(current)
                .map(|connection| connection.target)
                .collect();
            for target in targets {
                if self.set_depth_if_lower(target, depth) {
                    queue.push_back(target);
                }
            }
        }
    }

    pub fn pre_order_index(&self, module: ModuleId) -> Option<usize> {
        self.module_info[module.index()].pre_order_index
    }

    pub fn post_order_index(&self, module: ModuleId) -> Option<usize> {
        self.module_info[module.index()].post_order_index
    }

    pub fn set_pre_order_index_if_unset(&mut self, module: ModuleId, index: usize) -> bool {
        let slot = &mut self.module_info[module.index()].pre_order_index;
        if slot.is_some() {
            return false;
        }
        *slot = Some(index);
        true
    }

    pub fn set_post_order_index_if_unset(&mut self, module: ModuleId, index: usize) -> bool {
        let slot = &mut self.module_info[module.index()].post_order_index;
        if slot.is_some() {
            return false;
        }
        *slot = Some(index);
        true
    }

    /// Get all modules reachable from a given module over active connections (BFS)
    pub fn reachable_modules(&self, start: ModuleId, runtime: &RuntimeSpec) -> Vec<ModuleId> {
        let mut visited = vec![false; self.modules.len()];
        let mut result = Vec::new();
        let mut queue = VecDeque::new();

        queue.push_back(start);
        visited[start.index()] = true;

        while let Some(id) = queue.pop_front() {
            result.push(id);
            for connection in self.outgoing_connections(id) {
                if connection.is_active(runtime) && !visited[connection.target.index()] {
                    visited[connection.target.index()] = true;
                    queue.push_back(connection.target);
                }
            }
        }

        result
    }

    /// Modules of `set` that have no active, non-transitive incoming edge from
    /// another module of `set`. Sorted by identifier.
    pub fn graph_roots(&self, set: &[ModuleId]) -> Vec<ModuleId> {
        let mut in_set = vec![false; self.modules.len()];
        for module in set {
            in_set[module.index()] = true;
        }
        let mut roots: Vec<ModuleId> = set
            .iter()
            .copied()
            .filter(|&module| {
                !self.incoming_connections(module).any(|connection| {
                    let Some(origin) = connection.origin else {
                        return false;
                    };
                    origin != module
                        && in_set[origin.index()]
                        && connection.active_state(&RuntimeSpec::All).includes_target()
                })
            })
            .collect();
        roots.sort_by(|a, b| self.identifier(*a).cmp(self.identifier(*b)));
        roots.dedup();
        roots
    }

    // ---------------------------------------------------------------------
    // Freezing and memoization
    // ---------------------------------------------------------------------

    /// Open a window in which derived values may be memoized
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Close the memoization window and drop every memoized value
    pub fn unfreeze(&mut self) {
        self.frozen = false;
        self.graph_hash_cache.get_mut().clear();
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn invalidate(&mut self) {
        if self.frozen {
            debug!("module graph mutated while frozen; dropping memoized values");
        }
        self.unfreeze();
        self.generation += 1;
    }

    /// Hash of a module's position in the graph for `runtime`: its exports
    /// and the state of each outgoing connection.
    pub fn graph_hash(&self, module: ModuleId, runtime: &RuntimeSpec) -> String {
        if !self.frozen {
            return self.compute_graph_hash(module, runtime);
        }
        let key = (module, runtime.key());
        if let Some((generation, hash)) = self.graph_hash_cache.lock().get(&key) {
            if *generation == self.generation {
                return hash.clone();
            }
        }
        let hash = self.compute_graph_hash(module, runtime);
        self.graph_hash_cache
            .lock()
            .insert(key, (self.generation, hash.clone()));
        hash
    }

    fn compute_graph_hash(&self, module: ModuleId, runtime: &RuntimeSpec) -> String {
        let mut hasher = ContentHasher::new();
        let m = self.module(module);
        hasher.update_str(&m.identifier);
        for export in &m.exports {
            hasher.update_str(export);
        }
        let mut edges: Vec<(&str, DependencyId, ConnectionState)> = self
            .outgoing_connections(module)
            .map(|connection| {
                (
                    self.identifier(connection.target),
                    connection.dependency,
                    connection.active_state(runtime),
                )
            })
            .collect();
        edges.sort();
        for (target, _, state) in edges {
            hasher.update_str(target);
            hasher.update_str(state.as_str());
        }
        hasher.digest()
    }

    #[cfg(test)]
    pub(crate) fn memoized_hash_count(&self) -> usize {
        self.graph_hash_cache.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(graph: &mut ModuleGraph, from: ModuleId, to: ModuleId) -> DependencyId {
        let request = graph.identifier(to).to_string();
        let dep = graph.add_dependency(Dependency::new(DependencyParent::Module(from), request));
        graph.connect(Some(from), dep, to);
        dep
    }

    #[test]
    fn test_module_graph_basic() {
        let mut graph = ModuleGraph::new();
        let id = graph.add_module(Module::new("./main.js", 10));
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.module_id("./main.js"), Some(id));
        assert_eq!(graph.add_module(Module::new("./main.js", 99)), id);
        assert!(graph.expect_module_id("./missing.js").is_err());
    }

    #[test]
    fn test_connections_are_mirrored() {
        let mut graph = ModuleGraph::new();
        let a = graph.add_module(Module::new("a", 1));
        let b = graph.add_module(Module::new("b", 1));
        let dep = chain(&mut graph, a, b);

        assert_eq!(graph.outgoing_connections(a).count(), 1);
        assert_eq!(graph.incoming_connections(b).count(), 1);

        let removed = graph.disconnect(dep).unwrap();
        assert_eq!(removed.target, b);
        assert_eq!(graph.outgoing_connections(a).count(), 0);
        assert_eq!(graph.incoming_connections(b).count(), 0);
        assert!(graph.connection_for_dependency(dep).is_none());
        assert!(graph.disconnect(dep).is_none());
    }

    #[test]
    fn test_reconnect_replaces_connection() {
        let mut graph = ModuleGraph::new();
        let a = graph.add_module(Module::new("a", 1));
        let b = graph.add_module(Module::new("b", 1));
        let c = graph.add_module(Module::new("c", 1));
        let dep = chain(&mut graph, a, b);
        graph.connect(Some(a), dep, c);
        assert_eq!(graph.connection_count(), 1);
        assert_eq!(graph.incoming_connections(b).count(), 0);
        assert_eq!(graph.incoming_connections(c).count(), 1);
    }

    #[test]
    fn test_assign_depth_relaxes() {
        let mut graph = ModuleGraph::new();
        let a = graph.add_module(Module::new("a", 1));
        let b = graph.add_module(Module::new("b", 1));
        let c = graph.add_module(Module::new("c", 1));
        let d = graph.add_module(Module::new("d", 1));
        chain(&mut graph, a, b);
        chain(&mut graph, b, c);
        chain(&mut graph, c, d);
        chain(&mut graph, a, d);
        graph.assign_depth(a);
        assert_eq!(graph.depth(a), Some(0));
        assert_eq!(graph.depth(c), Some(2));
        assert_eq!(graph.depth(d), Some(1));
    }

    #[test]
    fn test_graph_roots() {
        let mut graph = ModuleGraph::new();
        let a = graph.add_module(Module::new("a", 1));
        let b = graph.add_module(Module::new("b", 1));
        let c = graph.add_module(Module::new("c", 1));
        chain(&mut graph, a, b);
        let dep = graph.add_dependency(
            Dependency::new(DependencyParent::Module(b), "c")
                .with_condition(ActivationCondition::TransitiveOnly),
        );
        graph.connect(Some(b), dep, c);

        assert_eq!(graph.graph_roots(&[a, b, c]), vec![a, c]);
        assert_eq!(graph.graph_roots(&[b, c]), vec![b, c]);
    }

    #[test]
    fn test_freeze_memoizes_and_mutation_drops_cache() {
        let mut graph = ModuleGraph::new();
        let a = graph.add_module(Module::new("a", 1));
        let b = graph.add_module(Module::new("b", 1));
        graph.freeze();
        let before = graph.graph_hash(a, &RuntimeSpec::All);
        assert_eq!(graph.memoized_hash_count(), 1);
        assert_eq!(graph.graph_hash(a, &RuntimeSpec::All), before);

        chain(&mut graph, a, b);
        assert!(!graph.is_frozen());
        assert_eq!(graph.memoized_hash_count(), 0);
        assert_ne!(graph.graph_hash(a, &RuntimeSpec::All), before);
    }

    #[test]
    fn test_replace_module_moves_connections() {
        let mut graph = ModuleGraph::new();
        let a = graph.add_module(Module::new("a", 1));
        let b = graph.add_module(Module::new("b", 1));
        let b2 = graph.add_module(Module::new("b?v2", 1));
        let c = graph.add_module(Module::new("c", 1));
        chain(&mut graph, a, b);
        chain(&mut graph, b, c);
        graph.replace_module(b, b2);

        assert_eq!(graph.incoming_connections(b).count(), 0);
        assert_eq!(graph.outgoing_connections(b).count(), 0);
        assert_eq!(graph.incoming_connections(b2).count(), 1);
        assert_eq!(
            graph.outgoing_connections(b2).map(|c| c.target).collect::<Vec<_>>(),
            vec![c]
        );
        assert_eq!(graph.module(b2).dependencies.len(), 1);
    }

    #[test]
    fn test_reachable_modules_skips_inactive() {
        let mut graph = ModuleGraph::new();
        let a = graph.add_module(Module::new("a", 1));
        let b = graph.add_module(Module::new("b", 1));
        let c = graph.add_module(Module::new("c", 1));
        chain(&mut graph, a, b);
        let dep = chain(&mut graph, b, c);
        graph.set_connection_active(dep, false);
        assert_eq!(graph.reachable_modules(a, &RuntimeSpec::All), vec![a, b]);
    }
}
