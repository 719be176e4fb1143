//! Entry definitions: validation and processing order

use std::collections::{BTreeMap, BTreeSet};

use crate::chunk::EntryOptions;
use crate::error::{GraphError, GraphResult};
use crate::ukey::ModuleId;

/// A named entry as handed to the deriver
#[derive(Debug, Clone)]
pub struct EntryData {
    pub name: String,
    /// Entry modules in declaration order
    pub modules: Vec<ModuleId>,
    pub options: EntryOptions,
}

impl EntryData {
    pub fn new(name: impl Into<String>, modules: Vec<ModuleId>) -> Self {
        let name = name.into();
        Self {
            options: EntryOptions {
                name: Some(name.clone()),
                ..Default::default()
            },
            name,
            modules,
        }
    }

    pub fn depend_on<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.depend_on = entries.into_iter().map(Into::into).collect();
        self
    }

    pub fn runtime(mut self, runtime: impl Into<String>) -> Self {
        self.options.runtime = Some(runtime.into());
        self
    }

    /// Name of the runtime this entry executes in when it has no `depend_on`
    pub fn runtime_name(&self) -> &str {
        self.options.runtime.as_deref().unwrap_or(&self.name)
    }
}

/// Check every entry and return the order to process them in: each entry
/// after the entries it depends on, otherwise by name.
pub fn validate_entries(entries: &[EntryData]) -> GraphResult<Vec<usize>> {
    let by_name: BTreeMap<&str, usize> = entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| (entry.name.as_str(), idx))
        .collect();

    for entry in entries {
        if entry.modules.is_empty() {
            return Err(GraphError::EmptyEntry(entry.name.clone()));
        }
        if !entry.options.depend_on.is_empty() && entry.options.runtime.is_some() {
            return Err(GraphError::DependOnWithRuntime {
                entry: entry.name.clone(),
            });
        }
        for target in &entry.options.depend_on {
            if !by_name.contains_key(target.as_str()) {
                return Err(GraphError::UnknownDependOn {
                    entry: entry.name.clone(),
                    target: target.clone(),
                });
            }
        }
        if let Some(runtime) = &entry.options.runtime {
            if runtime != &entry.name && by_name.contains_key(runtime.as_str()) {
                return Err(GraphError::RuntimeNameConflict {
                    entry: entry.name.clone(),
                    runtime: runtime.clone(),
                });
            }
        }
    }

    let mut order = Vec::with_capacity(entries.len());
    let mut done = BTreeSet::new();
    for &idx in by_name.values() {
        let mut path = Vec::new();
        visit(idx, entries, &by_name, &mut done, &mut path, &mut order)?;
    }
    Ok(order)
}

fn visit(
    idx: usize,
    entries: &[EntryData],
    by_name: &BTreeMap<&str, usize>,
    done: &mut BTreeSet<usize>,
    path: &mut Vec<usize>,
    order: &mut Vec<usize>,
) -> GraphResult<()> {
    if done.contains(&idx) {
        return Ok(());
    }
    if let Some(pos) = path.iter().position(|p| *p == idx) {
        let mut cycle: Vec<String> = path[pos..]
            .iter()
            .map(|p| entries[*p].name.clone())
            .collect();
        cycle.push(entries[idx].name.clone());
        return Err(GraphError::CircularDependOn { entries: cycle });
    }

    path.push(idx);
    let mut targets: Vec<usize> = entries[idx]
        .options
        .depend_on
        .iter()
        .filter_map(|name| by_name.get(name.as_str()).copied())
        .collect();
    targets.sort_by(|a, b| entries[*a].name.cmp(&entries[*b].name));
    for target in targets {
        visit(target, entries, by_name, done, path, order)?;
    }
    path.pop();

    done.insert(idx);
    order.push(idx);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> EntryData {
        EntryData::new(name, vec![ModuleId::new(0)])
    }

    fn names(entries: &[EntryData], order: &[usize]) -> Vec<String> {
        order.iter().map(|i| entries[*i].name.clone()).collect()
    }

    #[test]
    fn test_order_is_by_name() {
        let entries = vec![entry("c"), entry("a"), entry("b")];
        let order = validate_entries(&entries).unwrap();
        assert_eq!(names(&entries, &order), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_depend_on_comes_first() {
        let entries = vec![entry("a").depend_on(["z"]), entry("z"), entry("m").depend_on(["a"])];
        let order = validate_entries(&entries).unwrap();
        assert_eq!(names(&entries, &order), vec!["z", "a", "m"]);
    }

    #[test]
    fn test_depend_on_with_runtime_is_fatal() {
        let entries = vec![entry("a").depend_on(["b"]).runtime("rt"), entry("b")];
        assert_eq!(
            validate_entries(&entries),
            Err(GraphError::DependOnWithRuntime { entry: "a".into() })
        );
    }

    #[test]
    fn test_circular_depend_on_is_fatal() {
        let entries = vec![entry("a").depend_on(["b"]), entry("b").depend_on(["a"])];
        match validate_entries(&entries) {
            Err(GraphError::CircularDependOn { entries }) => {
                assert_eq!(entries, vec!["a", "b", "a"]);
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_depend_on() {
        let entries = vec![entry("a").depend_on(["missing"])];
        assert!(matches!(
            validate_entries(&entries),
            Err(GraphError::UnknownDependOn { .. })
        ));
    }

    #[test]
    fn test_runtime_naming_another_entry() {
        let entries = vec![entry("a").runtime("b"), entry("b")];
        assert!(matches!(
            validate_entries(&entries),
            Err(GraphError::RuntimeNameConflict { .. })
        ));
        let own = vec![entry("a").runtime("a")];
        assert!(validate_entries(&own).is_ok());
    }

    #[test]
    fn test_empty_entry() {
        let entries = vec![EntryData::new("a", Vec::new())];
        assert_eq!(
            validate_entries(&entries),
            Err(GraphError::EmptyEntry("a".into()))
        );
    }
}
