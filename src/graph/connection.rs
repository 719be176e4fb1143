//! Module graph connections and their activation states

use std::fmt;

use crate::runtime::RuntimeSpec;
use crate::ukey::{DependencyId, ModuleId};

/// Outcome of asking whether a connection is active for a runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConnectionState {
    /// The target is loaded and executed
    Always,
    /// The connection has no effect
    Never,
    /// The target itself is not needed, but its own dependencies are
    TransitiveOnly,
    /// Placeholder for a connection whose state depends on itself
    Circular,
}

impl ConnectionState {
    /// Anything but `Never` keeps the connection alive
    pub fn is_active(self) -> bool {
        self != ConnectionState::Never
    }

    /// Whether the target module itself must be included
    pub fn includes_target(self) -> bool {
        matches!(self, ConnectionState::Always | ConnectionState::Circular)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Always => "always",
            ConnectionState::Never => "never",
            ConnectionState::TransitiveOnly => "transitive",
            ConnectionState::Circular => "circular",
        }
    }

    /// Union semantics, used when several connections lead to the same target
    pub fn merge(self, other: ConnectionState) -> ConnectionState {
        merge_states(self, other)
    }

    /// Intersection semantics, used when a state must hold on every path
    pub fn intersect(self, other: ConnectionState) -> ConnectionState {
        intersect_states(self, other)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Union of two states.
///
/// `Always` dominates, `Never` absorbs everything except `Always`, and
/// `TransitiveOnly` yields the other side.
pub fn merge_states(a: ConnectionState, b: ConnectionState) -> ConnectionState {
    use ConnectionState::*;
    match (a, b) {
        (Always, _) | (_, Always) => Always,
        (Never, _) | (_, Never) => Never,
        (TransitiveOnly, other) | (other, TransitiveOnly) => other,
        (Circular, Circular) => Circular,
    }
}

/// Intersection of two states.
///
/// `Never` dominates and `Always` yields the other side.
pub fn intersect_states(a: ConnectionState, b: ConnectionState) -> ConnectionState {
    use ConnectionState::*;
    match (a, b) {
        (Never, _) | (_, Never) => Never,
        (Always, other) | (other, Always) => other,
        (Circular, other) | (other, Circular) => other,
        (TransitiveOnly, TransitiveOnly) => TransitiveOnly,
    }
}

/// How a dependency decides whether its connection is active
#[derive(Clone, Default)]
pub enum ActivationCondition {
    #[default]
    Always,
    Never,
    TransitiveOnly,
    Circular,
    /// Active only when evaluated for a runtime overlapping this one
    Runtimes(RuntimeSpec),
    /// Arbitrary predicate evaluated against the requested runtime
    Predicate(fn(&RuntimeSpec) -> ConnectionState),
}

impl ActivationCondition {
    pub fn evaluate(&self, runtime: &RuntimeSpec) -> ConnectionState {
        match self {
            ActivationCondition::Always => ConnectionState::Always,
            ActivationCondition::Never => ConnectionState::Never,
            ActivationCondition::TransitiveOnly => ConnectionState::TransitiveOnly,
            ActivationCondition::Circular => ConnectionState::Circular,
            ActivationCondition::Runtimes(spec) => {
                if runtime.is_all() || spec.intersects(runtime) {
                    ConnectionState::Always
                } else {
                    ConnectionState::Never
                }
            }
            ActivationCondition::Predicate(predicate) => predicate(runtime),
        }
    }

    pub fn is_conditional(&self) -> bool {
        matches!(
            self,
            ActivationCondition::Runtimes(_) | ActivationCondition::Predicate(_)
        )
    }
}

impl fmt::Debug for ActivationCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationCondition::Always => f.write_str("Always"),
            ActivationCondition::Never => f.write_str("Never"),
            ActivationCondition::TransitiveOnly => f.write_str("TransitiveOnly"),
            ActivationCondition::Circular => f.write_str("Circular"),
            ActivationCondition::Runtimes(spec) => write!(f, "Runtimes({})", spec),
            ActivationCondition::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// A realized edge from an origin module through a dependency to a target
#[derive(Debug, Clone)]
pub struct Connection {
    /// `None` for entry dependencies that have no issuing module
    pub origin: Option<ModuleId>,
    pub dependency: DependencyId,
    pub target: ModuleId,
    pub condition: ActivationCondition,
    pub weak: bool,
    active: bool,
}

impl Connection {
    pub fn new(
        origin: Option<ModuleId>,
        dependency: DependencyId,
        target: ModuleId,
        condition: ActivationCondition,
        weak: bool,
    ) -> Self {
        Self {
            origin,
            dependency,
            target,
            condition,
            weak,
            active: true,
        }
    }

    /// Resolve the activation state for a runtime
    pub fn active_state(&self, runtime: &RuntimeSpec) -> ConnectionState {
        if !self.active {
            return ConnectionState::Never;
        }
        self.condition.evaluate(runtime)
    }

    pub fn is_active(&self, runtime: &RuntimeSpec) -> bool {
        self.active_state(runtime).is_active()
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    const ALL: [ConnectionState; 4] = [Always, Never, TransitiveOnly, Circular];

    #[test]
    fn test_merge_always_dominates() {
        for state in ALL {
            assert_eq!(merge_states(Always, state), Always);
            assert_eq!(merge_states(state, Always), Always);
        }
    }

    #[test]
    fn test_merge_never_absorbs() {
        assert_eq!(merge_states(Never, TransitiveOnly), Never);
        assert_eq!(merge_states(Circular, Never), Never);
    }

    #[test]
    fn test_merge_transitive_is_identity() {
        assert_eq!(merge_states(TransitiveOnly, Circular), Circular);
        assert_eq!(merge_states(TransitiveOnly, TransitiveOnly), TransitiveOnly);
    }

    #[test]
    fn test_intersect() {
        for state in ALL {
            assert_eq!(intersect_states(Never, state), Never);
            assert_eq!(intersect_states(Always, state), state);
        }
        assert_eq!(intersect_states(Circular, TransitiveOnly), TransitiveOnly);
    }

    #[test]
    fn test_runtime_condition() {
        let condition = ActivationCondition::Runtimes(RuntimeSpec::single("web"));
        assert_eq!(condition.evaluate(&RuntimeSpec::single("web")), Always);
        assert_eq!(condition.evaluate(&RuntimeSpec::single("node")), Never);
        assert_eq!(condition.evaluate(&RuntimeSpec::All), Always);
        assert!(condition.is_conditional());
    }

    #[test]
    fn test_predicate_condition() {
        fn only_workers(runtime: &RuntimeSpec) -> ConnectionState {
            if runtime.contains("worker") {
                TransitiveOnly
            } else {
                Never
            }
        }
        let mut connection = Connection::new(
            None,
            DependencyId::new(0),
            ModuleId::new(1),
            ActivationCondition::Predicate(only_workers),
            false,
        );
        assert_eq!(
            connection.active_state(&RuntimeSpec::single("worker")),
            TransitiveOnly
        );
        connection.set_active(false);
        assert_eq!(connection.active_state(&RuntimeSpec::single("worker")), Never);
    }
}
