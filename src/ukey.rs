//! Stable integer handles for arena-allocated graph entries
//!
//! Modules, dependencies, blocks, connections, chunks and chunk groups are all
//! addressed by small copyable keys instead of references, so the graphs never
//! hold ownership cycles.

use std::fmt;
use std::hash::BuildHasherDefault;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHasher;

/// Insertion-ordered map keyed by a handle
pub type UkeyIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Insertion-ordered set of handles
pub type UkeyIndexSet<K> = IndexSet<K, BuildHasherDefault<FxHasher>>;

macro_rules! define_ukey {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(u32);

        impl $name {
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            pub const fn index(self) -> usize {
                self.0 as usize
            }

            pub const fn as_u32(self) -> u32 {
                self.0
            }
        }

        impl From<usize> for $name {
            fn from(value: usize) -> Self {
                Self(value as u32)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        }
    };
}

define_ukey!(
    /// A module stored in the [`ModuleGraph`](crate::graph::ModuleGraph)
    ModuleId,
    "m"
);
define_ukey!(
    /// A dependency declared by a module or one of its blocks
    DependencyId,
    "d"
);
define_ukey!(
    /// A nested dependency block (async boundary candidate)
    BlockId,
    "b"
);
define_ukey!(
    /// A materialized module graph edge
    ConnectionId,
    "c"
);
define_ukey!(
    /// A chunk owned by a [`ChunkGraph`](crate::chunk_graph::ChunkGraph)
    ChunkUkey,
    "chunk#"
);
define_ukey!(
    /// A chunk group owned by a [`ChunkGraph`](crate::chunk_graph::ChunkGraph)
    ChunkGroupUkey,
    "group#"
);

/// Monotonic allocator for one handle type
#[derive(Debug, Default)]
pub struct UkeyAllocator {
    next: u32,
}

impl UkeyAllocator {
    pub fn alloc<K: From<usize>>(&mut self) -> K {
        let key = K::from(self.next as usize);
        self.next += 1;
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_monotonic() {
        let mut alloc = UkeyAllocator::default();
        let a: ChunkUkey = alloc.alloc();
        let b: ChunkUkey = alloc.alloc();
        assert!(a < b);
        assert_eq!(b.index(), 1);
    }

    #[test]
    fn test_debug_format() {
        assert_eq!(format!("{:?}", ModuleId::new(3)), "m3");
        assert_eq!(format!("{}", ChunkGroupUkey::new(7)), "group#7");
    }
}
