//! Chunk groups: ordered chunk lists nested in a DAG

use std::cmp::Ordering;

use rustc_hash::FxHashMap;

use crate::chunk::{ChunkGroupOptions, EntryOptions};
use crate::error::{GraphError, GraphResult};
use crate::ukey::{ChunkGroupUkey, ChunkUkey, ModuleId, UkeyIndexSet};

/// Whether a group is a plain split point or an entrypoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkGroupKind {
    Normal,
    Entrypoint {
        /// `false` for async entrypoints such as workers
        initial: bool,
        runtime_chunk: Option<ChunkUkey>,
        entrypoint_chunk: Option<ChunkUkey>,
        options: EntryOptions,
    },
}

/// What triggered a chunk group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupOrigin {
    pub module: Option<ModuleId>,
    pub loc: Option<String>,
    pub request: Option<String>,
}

/// Chunks produced together for one entry or async boundary
#[derive(Debug, Clone)]
pub struct ChunkGroup {
    pub ukey: ChunkGroupUkey,
    pub kind: ChunkGroupKind,
    pub options: ChunkGroupOptions,

    /// Creation order among all groups of the build
    pub index: Option<usize>,

    /// Load/execution order matters
    pub(crate) chunks: Vec<ChunkUkey>,

    parents: UkeyIndexSet<ChunkGroupUkey>,
    children: UkeyIndexSet<ChunkGroupUkey>,
    async_entrypoints: UkeyIndexSet<ChunkGroupUkey>,
    origins: Vec<GroupOrigin>,

    module_pre_order_indices: FxHashMap<ModuleId, usize>,
    module_post_order_indices: FxHashMap<ModuleId, usize>,
}

impl ChunkGroup {
    pub fn new(ukey: ChunkGroupUkey, options: ChunkGroupOptions) -> Self {
        Self {
            ukey,
            kind: ChunkGroupKind::Normal,
            options,
            index: None,
            chunks: Vec::new(),
            parents: UkeyIndexSet::default(),
            children: UkeyIndexSet::default(),
            async_entrypoints: UkeyIndexSet::default(),
            origins: Vec::new(),
            module_pre_order_indices: FxHashMap::default(),
            module_post_order_indices: FxHashMap::default(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.options.name.as_deref()
    }

    pub fn chunks(&self) -> &[ChunkUkey] {
        &self.chunks
    }

    pub fn contains_chunk(&self, chunk: ChunkUkey) -> bool {
        self.chunks.contains(&chunk)
    }

    fn position(&self, chunk: ChunkUkey) -> Option<usize> {
        self.chunks.iter().position(|c| *c == chunk)
    }

    // ---------------------------------------------------------------------
    // Chunk list
    // ---------------------------------------------------------------------

    /// Put `chunk` first, moving it if already present
    pub fn unshift_chunk(&mut self, chunk: ChunkUkey) -> bool {
        match self.position(chunk) {
            Some(0) => false,
            Some(idx) => {
                self.chunks.remove(idx);
                self.chunks.insert(0, chunk);
                true
            }
            None => {
                self.chunks.insert(0, chunk);
                true
            }
        }
    }

    /// Insert `chunk` right before `before`; never moves a chunk later
    pub fn insert_chunk(&mut self, chunk: ChunkUkey, before: ChunkUkey) -> GraphResult<bool> {
        let idx = self.position(before).ok_or_else(|| {
            GraphError::Inconsistent(format!("{:?} is not part of {:?}", before, self.ukey))
        })?;
        match self.position(chunk) {
            Some(old) if old > idx => {
                self.chunks.remove(old);
                self.chunks.insert(idx, chunk);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => {
                self.chunks.insert(idx, chunk);
                Ok(true)
            }
        }
    }

    pub fn push_chunk(&mut self, chunk: ChunkUkey) -> bool {
        if self.position(chunk).is_some() {
            return false;
        }
        self.chunks.push(chunk);
        true
    }

    /// Replace `old` by `new`, keeping whichever position comes first
    pub fn replace_chunk(&mut self, old: ChunkUkey, new: ChunkUkey) -> bool {
        let Some(old_idx) = self.position(old) else {
            return false;
        };
        match self.position(new) {
            None => {
                self.chunks[old_idx] = new;
                true
            }
            Some(new_idx) if new_idx < old_idx => {
                self.chunks.remove(old_idx);
                true
            }
            Some(new_idx) if new_idx != old_idx => {
                self.chunks[old_idx] = new;
                self.chunks.remove(new_idx);
                true
            }
            Some(_) => false,
        }
    }

    pub fn remove_chunk(&mut self, chunk: ChunkUkey) -> bool {
        match self.position(chunk) {
            Some(idx) => {
                self.chunks.remove(idx);
                true
            }
            None => false,
        }
    }

    // ---------------------------------------------------------------------
    // Relations
    // ---------------------------------------------------------------------

    pub fn parents(&self) -> impl Iterator<Item = ChunkGroupUkey> + '_ {
        self.parents.iter().copied()
    }

    pub fn children(&self) -> impl Iterator<Item = ChunkGroupUkey> + '_ {
        self.children.iter().copied()
    }

    pub fn async_entrypoints(&self) -> impl Iterator<Item = ChunkGroupUkey> + '_ {
        self.async_entrypoints.iter().copied()
    }

    pub fn has_parent(&self, group: ChunkGroupUkey) -> bool {
        self.parents.contains(&group)
    }

    pub fn has_child(&self, group: ChunkGroupUkey) -> bool {
        self.children.contains(&group)
    }

    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }

    pub(crate) fn add_parent(&mut self, group: ChunkGroupUkey) -> bool {
        self.parents.insert(group)
    }

    pub(crate) fn add_child(&mut self, group: ChunkGroupUkey) -> bool {
        self.children.insert(group)
    }

    pub(crate) fn remove_parent(&mut self, group: ChunkGroupUkey) -> bool {
        self.parents.shift_remove(&group)
    }

    pub(crate) fn remove_child(&mut self, group: ChunkGroupUkey) -> bool {
        self.children.shift_remove(&group)
    }

    pub(crate) fn add_async_entrypoint(&mut self, entrypoint: ChunkGroupUkey) -> bool {
        self.async_entrypoints.insert(entrypoint)
    }

    pub(crate) fn remove_async_entrypoint(&mut self, entrypoint: ChunkGroupUkey) -> bool {
        self.async_entrypoints.shift_remove(&entrypoint)
    }

    pub(crate) fn take_relations(
        &mut self,
    ) -> (UkeyIndexSet<ChunkGroupUkey>, UkeyIndexSet<ChunkGroupUkey>) {
        (
            std::mem::take(&mut self.parents),
            std::mem::take(&mut self.children),
        )
    }

    pub fn origins(&self) -> &[GroupOrigin] {
        &self.origins
    }

    pub fn add_origin(
        &mut self,
        module: Option<ModuleId>,
        loc: Option<String>,
        request: Option<String>,
    ) {
        let origin = GroupOrigin {
            module,
            loc,
            request,
        };
        if !self.origins.contains(&origin) {
            self.origins.push(origin);
        }
    }

    /// Merge additional configuration into this group
    pub fn add_options(&mut self, options: &ChunkGroupOptions) -> GraphResult<()> {
        self.options.merge(options)
    }

    // ---------------------------------------------------------------------
    // Ordinals
    // ---------------------------------------------------------------------

    pub fn set_module_pre_order_index(&mut self, module: ModuleId, index: usize) {
        self.module_pre_order_indices.insert(module, index);
    }

    pub fn set_module_post_order_index(&mut self, module: ModuleId, index: usize) {
        self.module_post_order_indices.insert(module, index);
    }

    pub fn module_pre_order_index(&self, module: ModuleId) -> Option<usize> {
        self.module_pre_order_indices.get(&module).copied()
    }

    pub fn module_post_order_index(&self, module: ModuleId) -> Option<usize> {
        self.module_post_order_indices.get(&module).copied()
    }

    /// Deterministic total order: more chunks first, then pairwise chunk order
    pub fn compare_to(
        &self,
        other: &ChunkGroup,
        mut compare_chunks: impl FnMut(ChunkUkey, ChunkUkey) -> Ordering,
    ) -> Ordering {
        other
            .chunks
            .len()
            .cmp(&self.chunks.len())
            .then_with(|| {
                self.chunks
                    .iter()
                    .zip(&other.chunks)
                    .map(|(a, b)| compare_chunks(*a, *b))
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(Ordering::Equal)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(n: u32) -> ChunkUkey {
        ChunkUkey::new(n)
    }

    fn group() -> ChunkGroup {
        ChunkGroup::new(ChunkGroupUkey::new(0), ChunkGroupOptions::default())
    }

    #[test]
    fn test_push_is_unique() {
        let mut g = group();
        assert!(g.push_chunk(c(1)));
        assert!(!g.push_chunk(c(1)));
        assert_eq!(g.chunks(), &[c(1)]);
    }

    #[test]
    fn test_unshift_moves_to_front() {
        let mut g = group();
        g.push_chunk(c(1));
        g.push_chunk(c(2));
        assert!(g.unshift_chunk(c(2)));
        assert_eq!(g.chunks(), &[c(2), c(1)]);
        assert!(!g.unshift_chunk(c(2)));
        assert!(g.unshift_chunk(c(3)));
        assert_eq!(g.chunks(), &[c(3), c(2), c(1)]);
    }

    #[test]
    fn test_insert_before() {
        let mut g = group();
        g.push_chunk(c(1));
        g.push_chunk(c(2));
        assert!(g.insert_chunk(c(3), c(2)).unwrap());
        assert_eq!(g.chunks(), &[c(1), c(3), c(2)]);
        // already earlier: unchanged
        assert!(!g.insert_chunk(c(1), c(2)).unwrap());
        // later: moved
        assert!(g.insert_chunk(c(2), c(1)).unwrap());
        assert_eq!(g.chunks(), &[c(2), c(1), c(3)]);
        assert!(g.insert_chunk(c(4), c(9)).is_err());
    }

    #[test]
    fn test_replace_chunk() {
        let mut g = group();
        g.push_chunk(c(1));
        g.push_chunk(c(2));
        g.push_chunk(c(3));
        assert!(g.replace_chunk(c(2), c(9)));
        assert_eq!(g.chunks(), &[c(1), c(9), c(3)]);
        // new already present earlier: old dropped
        assert!(g.replace_chunk(c(3), c(1)));
        assert_eq!(g.chunks(), &[c(1), c(9)]);
        // new present later: new takes old's place
        assert!(g.replace_chunk(c(1), c(9)));
        assert_eq!(g.chunks(), &[c(9)]);
        assert!(!g.replace_chunk(c(5), c(9)));
        assert!(!g.replace_chunk(c(9), c(9)));
    }

    #[test]
    fn test_remove_chunk() {
        let mut g = group();
        g.push_chunk(c(1));
        assert!(g.remove_chunk(c(1)));
        assert!(!g.remove_chunk(c(1)));
    }

    #[test]
    fn test_compare_to_prefers_more_chunks() {
        let mut a = group();
        let mut b = group();
        a.push_chunk(c(1));
        a.push_chunk(c(2));
        b.push_chunk(c(3));
        assert_eq!(a.compare_to(&b, |x, y| x.cmp(&y)), Ordering::Less);
        b.push_chunk(c(0));
        assert_eq!(a.compare_to(&b, |x, y| x.cmp(&y)), Ordering::Less);
        assert_eq!(b.compare_to(&a, |x, y| x.cmp(&y)), Ordering::Greater);
    }

    #[test]
    fn test_origins_deduplicate() {
        let mut g = group();
        g.add_origin(Some(ModuleId::new(1)), Some("1:0".into()), Some("./x".into()));
        g.add_origin(Some(ModuleId::new(1)), Some("1:0".into()), Some("./x".into()));
        assert_eq!(g.origins().len(), 1);
    }
}
