//! Entrypoint behaviour of chunk groups

use crate::chunk::{ChunkGroup, ChunkGroupByUkey, ChunkGroupKind, EntryOptions};
use crate::ukey::{ChunkGroupUkey, ChunkUkey, UkeyIndexSet};

impl ChunkGroup {
    /// Create an entrypoint; `initial` is false for async entrypoints
    pub fn new_entrypoint(ukey: ChunkGroupUkey, options: EntryOptions, initial: bool) -> Self {
        let mut group = ChunkGroup::new(ukey, options.group.clone());
        if group.options.name.is_none() {
            group.options.name = options.name.clone();
        }
        group.kind = ChunkGroupKind::Entrypoint {
            initial,
            runtime_chunk: None,
            entrypoint_chunk: None,
            options,
        };
        group
    }

    pub fn is_entrypoint(&self) -> bool {
        matches!(self.kind, ChunkGroupKind::Entrypoint { .. })
    }

    /// Loaded on page start
    pub fn is_initial(&self) -> bool {
        matches!(self.kind, ChunkGroupKind::Entrypoint { initial: true, .. })
    }

    pub fn entry_options(&self) -> Option<&EntryOptions> {
        match &self.kind {
            ChunkGroupKind::Entrypoint { options, .. } => Some(options),
            ChunkGroupKind::Normal => None,
        }
    }

    /// The runtime chunk set directly on this entrypoint
    pub fn own_runtime_chunk(&self) -> Option<ChunkUkey> {
        match self.kind {
            ChunkGroupKind::Entrypoint { runtime_chunk, .. } => runtime_chunk,
            ChunkGroupKind::Normal => None,
        }
    }

    pub fn set_runtime_chunk(&mut self, chunk: ChunkUkey) {
        if let ChunkGroupKind::Entrypoint { runtime_chunk, .. } = &mut self.kind {
            *runtime_chunk = Some(chunk);
        }
    }

    pub fn entrypoint_chunk(&self) -> Option<ChunkUkey> {
        match self.kind {
            ChunkGroupKind::Entrypoint {
                entrypoint_chunk, ..
            } => entrypoint_chunk,
            ChunkGroupKind::Normal => None,
        }
    }

    pub fn set_entrypoint_chunk(&mut self, chunk: ChunkUkey) {
        if let ChunkGroupKind::Entrypoint {
            entrypoint_chunk, ..
        } = &mut self.kind
        {
            *entrypoint_chunk = Some(chunk);
        }
    }

    /// Runtime chunk of this entrypoint, or of the nearest entrypoint parent
    /// (entries declared with `depend_on` share their parent's runtime).
    pub fn get_runtime_chunk(&self, groups: &ChunkGroupByUkey) -> Option<ChunkUkey> {
        let mut visited = UkeyIndexSet::default();
        self.find_runtime_chunk(groups, &mut visited)
    }

    fn find_runtime_chunk(
        &self,
        groups: &ChunkGroupByUkey,
        visited: &mut UkeyIndexSet<ChunkGroupUkey>,
    ) -> Option<ChunkUkey> {
        if !visited.insert(self.ukey) {
            return None;
        }
        if let Some(chunk) = self.own_runtime_chunk() {
            return Some(chunk);
        }
        self.parents()
            .filter_map(|parent| groups.get(&parent))
            .filter(|parent| parent.is_entrypoint())
            .find_map(|parent| parent.find_runtime_chunk(groups, visited))
    }
}
