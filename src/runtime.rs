//! Runtime specifications
//!
//! A [`RuntimeSpec`] names the output runtime(s) a chunk, hash or requirement
//! set applies to. Everything that can differ between runtimes is stored in a
//! [`RuntimeSpecMap`] keyed by the runtime's canonical key.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Which runtime(s) a value applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum RuntimeSpec {
    /// Applies to every runtime
    #[default]
    All,
    /// Exactly one named runtime
    Single(String),
    /// A set of named runtimes (never holds exactly one name)
    Set(BTreeSet<String>),
}

impl RuntimeSpec {
    pub fn single(name: impl Into<String>) -> Self {
        RuntimeSpec::Single(name.into())
    }

    /// Build a spec from a list of names, normalizing one name to `Single`
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        if set.len() == 1 {
            if let Some(name) = set.pop_first() {
                return RuntimeSpec::Single(name);
            }
        }
        RuntimeSpec::Set(set)
    }

    pub fn is_all(&self) -> bool {
        matches!(self, RuntimeSpec::All)
    }

    /// True for a spec that names no runtime at all
    pub fn is_empty(&self) -> bool {
        matches!(self, RuntimeSpec::Set(set) if set.is_empty())
    }

    /// Names in sorted order; `All` yields nothing
    pub fn names(&self) -> Vec<&str> {
        match self {
            RuntimeSpec::All => Vec::new(),
            RuntimeSpec::Single(name) => vec![name.as_str()],
            RuntimeSpec::Set(set) => set.iter().map(String::as_str).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            RuntimeSpec::All => true,
            RuntimeSpec::Single(single) => single == name,
            RuntimeSpec::Set(set) => set.contains(name),
        }
    }

    /// Union of two specs
    pub fn merge(&self, other: &RuntimeSpec) -> RuntimeSpec {
        match (self, other) {
            (RuntimeSpec::All, _) | (_, RuntimeSpec::All) => RuntimeSpec::All,
            _ => RuntimeSpec::from_names(
                self.names()
                    .into_iter()
                    .chain(other.names())
                    .map(str::to_string),
            ),
        }
    }

    /// Intersection of two specs; `All` is the identity
    pub fn intersect(&self, other: &RuntimeSpec) -> RuntimeSpec {
        match (self, other) {
            (RuntimeSpec::All, other) | (other, RuntimeSpec::All) => other.clone(),
            _ => RuntimeSpec::from_names(
                self.names()
                    .into_iter()
                    .filter(|name| other.contains(name))
                    .map(str::to_string),
            ),
        }
    }

    pub fn intersects(&self, other: &RuntimeSpec) -> bool {
        !self.intersect(other).is_empty()
    }

    /// True when every runtime of `self` is also in `other`
    pub fn is_subset_of(&self, other: &RuntimeSpec) -> bool {
        match (self, other) {
            (_, RuntimeSpec::All) => true,
            (RuntimeSpec::All, _) => false,
            _ => self.names().into_iter().all(|name| other.contains(name)),
        }
    }

    /// Canonical key used by [`RuntimeSpecMap`]
    pub fn key(&self) -> String {
        match self {
            RuntimeSpec::All => "*".to_string(),
            RuntimeSpec::Single(name) => name.clone(),
            RuntimeSpec::Set(set) => set.iter().cloned().collect::<Vec<_>>().join("\n"),
        }
    }
}

impl fmt::Display for RuntimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeSpec::All => write!(f, "*"),
            RuntimeSpec::Single(name) => write!(f, "{}", name),
            RuntimeSpec::Set(set) => {
                let names: Vec<&str> = set.iter().map(String::as_str).collect();
                write!(f, "{}", names.join(","))
            }
        }
    }
}

/// Values stored per runtime spec
#[derive(Debug, Clone)]
pub struct RuntimeSpecMap<T> {
    entries: BTreeMap<String, (RuntimeSpec, T)>,
}

impl<T> Default for RuntimeSpecMap<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> RuntimeSpecMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, runtime: &RuntimeSpec) -> Option<&T> {
        self.entries.get(&runtime.key()).map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, runtime: &RuntimeSpec) -> Option<&mut T> {
        self.entries.get_mut(&runtime.key()).map(|(_, value)| value)
    }

    pub fn set(&mut self, runtime: RuntimeSpec, value: T) -> Option<T> {
        self.entries
            .insert(runtime.key(), (runtime, value))
            .map(|(_, old)| old)
    }

    pub fn get_or_insert_with(&mut self, runtime: &RuntimeSpec, f: impl FnOnce() -> T) -> &mut T {
        let (_, value) = self
            .entries
            .entry(runtime.key())
            .or_insert_with(|| (runtime.clone(), f()));
        value
    }

    pub fn remove(&mut self, runtime: &RuntimeSpec) -> Option<T> {
        self.entries.remove(&runtime.key()).map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RuntimeSpec, &T)> {
        self.entries.values().map(|(runtime, value)| (runtime, value))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
