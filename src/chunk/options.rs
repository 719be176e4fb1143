//! Chunk group and entry options

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};

/// Keys with this suffix are ordering hints and merge by maximum
pub const ORDER_SUFFIX: &str = "Order";

/// A single option value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl OptionValue {
    pub fn as_number(&self) -> Option<i64> {
        match self {
            OptionValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Number(n) => write!(f, "{}", n),
            OptionValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Configuration of a chunk group, declared by an async block or an entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkGroupOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Extensible hints such as `preloadOrder` or `prefetchOrder`
    #[serde(default, flatten)]
    pub values: BTreeMap<String, OptionValue>,
}

impl ChunkGroupOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: OptionValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Merge `other` into `self`.
    ///
    /// Order keys keep the larger value; any other key must agree.
    pub fn merge(&mut self, other: &ChunkGroupOptions) -> GraphResult<()> {
        match (&self.name, &other.name) {
            (None, Some(name)) => self.name = Some(name.clone()),
            (Some(existing), Some(incoming)) if existing != incoming => {
                return Err(GraphError::ConflictingGroupOption {
                    key: "name".to_string(),
                    existing: existing.clone(),
                    incoming: incoming.clone(),
                });
            }
            _ => {}
        }

        for (key, incoming) in &other.values {
            let Some(existing) = self.values.get(key) else {
                self.values.insert(key.clone(), incoming.clone());
                continue;
            };
            if existing == incoming {
                continue;
            }
            let merged = match (key.ends_with(ORDER_SUFFIX), existing.as_number(), incoming.as_number()) {
                (true, Some(a), Some(b)) => OptionValue::Number(a.max(b)),
                _ => {
                    return Err(GraphError::ConflictingGroupOption {
                        key: key.clone(),
                        existing: existing.to_string(),
                        incoming: incoming.to_string(),
                    });
                }
            };
            self.values.insert(key.clone(), merged);
        }
        Ok(())
    }

    /// All `(key, order)` pairs whose key carries the order suffix
    pub fn orders(&self) -> impl Iterator<Item = (&str, i64)> {
        self.values.iter().filter_map(|(key, value)| {
            let order = value.as_number()?;
            key.ends_with(ORDER_SUFFIX).then_some((key.as_str(), order))
        })
    }
}

/// Options of an entrypoint, either configured or declared by an async block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Entries whose runtime and modules this entry builds upon
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depend_on: Vec<String>,

    /// Name of a shared runtime chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,

    #[serde(default)]
    pub group: ChunkGroupOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_orders_take_max() {
        let mut a = ChunkGroupOptions::default().with_value("prefetchOrder", OptionValue::Number(1));
        let b = ChunkGroupOptions::default().with_value("prefetchOrder", OptionValue::Number(4));
        a.merge(&b).unwrap();
        assert_eq!(a.values["prefetchOrder"], OptionValue::Number(4));
        a.merge(&ChunkGroupOptions::default().with_value("prefetchOrder", OptionValue::Number(2)))
            .unwrap();
        assert_eq!(a.values["prefetchOrder"], OptionValue::Number(4));
    }

    #[test]
    fn test_merge_conflict_is_fatal() {
        let mut a = ChunkGroupOptions::default().with_value("fetchPriority", OptionValue::Text("high".into()));
        let b = ChunkGroupOptions::default().with_value("fetchPriority", OptionValue::Text("low".into()));
        let err = a.merge(&b).unwrap_err();
        assert!(matches!(err, GraphError::ConflictingGroupOption { ref key, .. } if key == "fetchPriority"));
    }

    #[test]
    fn test_merge_name() {
        let mut a = ChunkGroupOptions::default();
        a.merge(&ChunkGroupOptions::named("lazy")).unwrap();
        assert_eq!(a.name.as_deref(), Some("lazy"));
        assert!(a.merge(&ChunkGroupOptions::named("other")).is_err());
        assert!(a.merge(&ChunkGroupOptions::named("lazy")).is_ok());
    }

    #[test]
    fn test_orders() {
        let options = ChunkGroupOptions::named("x")
            .with_value("preloadOrder", OptionValue::Number(2))
            .with_value("mode", OptionValue::Text("lazy".into()));
        let orders: Vec<_> = options.orders().collect();
        assert_eq!(orders, vec![("preloadOrder", 2)]);
    }
}
