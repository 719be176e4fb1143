//! Generation-checked memoization for derived values

use parking_lot::Mutex;

/// A derived value tagged with the container generation it was computed at.
///
/// Containers bump their generation on every mutation; a lookup with a
/// different generation recomputes instead of trusting the stored value.
#[derive(Debug, Default)]
pub struct DerivedCache<T> {
    slot: Mutex<Option<(u64, T)>>,
}

impl<T: Clone> DerivedCache<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    pub fn get_or_compute(&self, generation: u64, compute: impl FnOnce() -> T) -> T {
        let mut slot = self.slot.lock();
        if let Some((cached_generation, value)) = slot.as_ref() {
            if *cached_generation == generation {
                return value.clone();
            }
        }
        let value = compute();
        *slot = Some((generation, value.clone()));
        value
    }

    pub fn clear(&self) {
        *self.slot.lock() = None;
    }
}

impl<T: Clone> Clone for DerivedCache<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Mutex::new(self.slot.lock().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recomputes_on_generation_change() {
        let cache = DerivedCache::new();
        let mut calls = 0;
        assert_eq!(cache.get_or_compute(1, || { calls += 1; 10 }), 10);
        assert_eq!(cache.get_or_compute(1, || { calls += 1; 20 }), 10);
        assert_eq!(cache.get_or_compute(2, || { calls += 1; 30 }), 30);
        assert_eq!(calls, 2);
    }
}
