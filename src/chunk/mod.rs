//! Chunks and chunk groups
//!
//! A [`Chunk`] is one deliverable output unit. Chunks are grouped into
//! [`ChunkGroup`]s, one per entry or async split point, and groups form a DAG
//! through parent/child links. Both live in the arenas of a
//! [`ChunkGraph`](crate::chunk_graph::ChunkGraph) and reference each other
//! by handle only.

mod entrypoint;
mod group;
mod options;

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::runtime::RuntimeSpec;
use crate::ukey::{ChunkGroupUkey, ChunkUkey, UkeyIndexMap, UkeyIndexSet};

pub use group::{ChunkGroup, ChunkGroupKind, GroupOrigin};
pub use options::{ChunkGroupOptions, EntryOptions, OptionValue, ORDER_SUFFIX};

/// Arena of chunk groups, passed explicitly wherever a chunk needs its groups
pub type ChunkGroupByUkey = UkeyIndexMap<ChunkGroupUkey, ChunkGroup>;

/// A chunk is a group of modules that will be emitted together
#[derive(Debug, Clone)]
pub struct Chunk {
    pub ukey: ChunkUkey,

    /// Assigned by an id pass after derivation
    pub id: Option<String>,
    pub ids: Option<Vec<String>>,

    /// Creation counter, stable for one build
    pub debug_id: u32,

    /// Chunk name (used for output filename)
    pub name: Option<String>,
    pub id_name_hints: BTreeSet<String>,
    pub runtime: RuntimeSpec,

    /// Excludes the chunk from integration
    pub prevent_integration: bool,

    pub files: BTreeSet<String>,
    pub auxiliary_files: BTreeSet<String>,
    pub hash: Option<String>,
    pub rendered_hash: Option<String>,

    /// Per content-type hash
    pub content_hash: BTreeMap<String, String>,

    pub chunk_reason: Option<String>,

    groups: UkeyIndexSet<ChunkGroupUkey>,
}

impl Chunk {
    pub fn new(ukey: ChunkUkey, name: Option<String>, debug_id: u32) -> Self {
        Self {
            ukey,
            id: None,
            ids: None,
            debug_id,
            name,
            id_name_hints: BTreeSet::new(),
            runtime: RuntimeSpec::Set(BTreeSet::new()),
            prevent_integration: false,
            files: BTreeSet::new(),
            auxiliary_files: BTreeSet::new(),
            hash: None,
            rendered_hash: None,
            content_hash: BTreeMap::new(),
            chunk_reason: None,
            groups: UkeyIndexSet::default(),
        }
    }

    /// Name if set, else id, else debug id
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.id.clone())
            .unwrap_or_else(|| format!("#{}", self.debug_id))
    }

    pub fn groups(&self) -> impl Iterator<Item = ChunkGroupUkey> + '_ {
        self.groups.iter().copied()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn is_in_group(&self, group: ChunkGroupUkey) -> bool {
        self.groups.contains(&group)
    }

    pub(crate) fn add_group(&mut self, group: ChunkGroupUkey) -> bool {
        self.groups.insert(group)
    }

    pub(crate) fn remove_group(&mut self, group: ChunkGroupUkey) -> bool {
        self.groups.shift_remove(&group)
    }

    /// True if this chunk is the runtime chunk of one of its entrypoints
    pub fn has_runtime(&self, groups: &ChunkGroupByUkey) -> bool {
        self.groups.iter().any(|ukey| {
            groups.get(ukey).is_some_and(|group| {
                group.is_entrypoint() && group.get_runtime_chunk(groups) == Some(self.ukey)
            })
        })
    }

    /// True if any group of this chunk is loaded initially
    pub fn can_be_initial(&self, groups: &ChunkGroupByUkey) -> bool {
        self.groups
            .iter()
            .any(|ukey| groups.get(ukey).is_some_and(ChunkGroup::is_initial))
    }

    /// True if every group of this chunk is loaded initially
    pub fn is_only_initial(&self, groups: &ChunkGroupByUkey) -> bool {
        !self.groups.is_empty()
            && self
                .groups
                .iter()
                .all(|ukey| groups.get(ukey).is_some_and(ChunkGroup::is_initial))
    }

    /// Async entrypoints reachable from this chunk's groups and their children
    pub fn referenced_async_entrypoints(&self, groups: &ChunkGroupByUkey) -> Vec<ChunkGroupUkey> {
        let mut visited: UkeyIndexSet<ChunkGroupUkey> = self.groups.clone();
        let mut queue: VecDeque<ChunkGroupUkey> = self.groups.iter().copied().collect();
        let mut result: UkeyIndexSet<ChunkGroupUkey> = UkeyIndexSet::default();
        while let Some(ukey) = queue.pop_front() {
            let Some(group) = groups.get(&ukey) else {
                continue;
            };
            result.extend(group.async_entrypoints());
            for child in group.children() {
                if visited.insert(child) {
                    queue.push_back(child);
                }
            }
        }
        result.into_iter().collect()
    }

    /// Order by assigned id (numeric ids numerically), then by creation
    pub fn compare_by_id(&self, other: &Chunk) -> Ordering {
        compare_ids(self.id.as_deref(), other.id.as_deref())
            .then_with(|| self.debug_id.cmp(&other.debug_id))
    }
}

/// Compare optional ids: present before missing, numbers before strings
pub fn compare_ids(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match (a.parse::<u64>(), b.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            _ => a.cmp(b),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_ids() {
        assert_eq!(compare_ids(Some("2"), Some("10")), Ordering::Less);
        assert_eq!(compare_ids(Some("10"), Some("a")), Ordering::Less);
        assert_eq!(compare_ids(Some("b"), Some("a")), Ordering::Greater);
        assert_eq!(compare_ids(None, Some("a")), Ordering::Greater);
    }

    #[test]
    fn test_initial_status_follows_groups() {
        let mut groups = ChunkGroupByUkey::default();
        let entry = ChunkGroupUkey::new(0);
        let lazy = ChunkGroupUkey::new(1);
        groups.insert(entry, ChunkGroup::new_entrypoint(entry, EntryOptions::default(), true));
        groups.insert(lazy, ChunkGroup::new(lazy, ChunkGroupOptions::default()));

        let mut chunk = Chunk::new(ChunkUkey::new(0), None, 0);
        assert!(!chunk.can_be_initial(&groups));
        chunk.add_group(lazy);
        assert!(!chunk.can_be_initial(&groups));
        chunk.add_group(entry);
        assert!(chunk.can_be_initial(&groups));
        assert!(!chunk.is_only_initial(&groups));
        chunk.remove_group(lazy);
        assert!(chunk.is_only_initial(&groups));
    }

    #[test]
    fn test_display_name() {
        let mut chunk = Chunk::new(ChunkUkey::new(3), None, 7);
        assert_eq!(chunk.display_name(), "#7");
        chunk.id = Some("12".into());
        assert_eq!(chunk.display_name(), "12");
        chunk.name = Some("main".into());
        assert_eq!(chunk.display_name(), "main");
    }
}
