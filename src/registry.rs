//! Token-based registry for fan-out to live conversion pipelines.
//!
//! Pipelines register a shared cursor slot at creation and remove it in
//! their destructor via an opaque token, so removal is O(1) and never
//! scans by identity. Slots are tombstoned and reused; iteration while
//! entries come and go is well-defined because all mutation happens on
//! the capture thread.

/// Opaque handle returned by [`Registry::insert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Token {
    slot: usize,
}

pub(crate) struct Registry<T> {
    slots: Vec<Option<T>>,
    free: Vec<usize>,
}

impl<T> Registry<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, value: T) -> Token {
        match self.free.pop() {
            Some(slot) => {
                debug_assert!(self.slots[slot].is_none());
                self.slots[slot] = Some(value);
                Token { slot }
            }
            None => {
                self.slots.push(Some(value));
                Token {
                    slot: self.slots.len() - 1,
                }
            }
        }
    }

    /// Remove the entry for `token`. Idempotent: removing an already
    /// vacated token returns `None` and changes nothing.
    pub(crate) fn remove(&mut self, token: Token) -> Option<T> {
        let value = self.slots.get_mut(token.slot)?.take()?;
        self.free.push(token.slot);
        Some(value)
    }

    pub(crate) fn for_each(&mut self, mut f: impl FnMut(&mut T)) {
        for slot in self.slots.iter_mut().flatten() {
            f(slot);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn insert_and_remove_round_trip() {
        let mut registry = Registry::new();
        let a = registry.insert("a");
        let b = registry.insert("b");
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.remove(a), Some("a"));
        assert_eq!(registry.len(), 1);

        let mut seen = Vec::new();
        registry.for_each(|v| seen.push(*v));
        assert_eq!(seen, vec!["b"]);

        assert_eq!(registry.remove(b), Some("b"));
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_is_idempotent() {
        let mut registry = Registry::new();
        let token = registry.insert(7);
        assert_eq!(registry.remove(token), Some(7));
        assert_eq!(registry.remove(token), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn vacated_slots_are_reused() {
        let mut registry = Registry::new();
        let a = registry.insert(1);
        let _b = registry.insert(2);
        registry.remove(a);

        let c = registry.insert(3);
        assert_eq!(c, a);
        assert_eq!(registry.slots.len(), 2);
    }

    #[test]
    fn removed_entries_are_never_visited() {
        let mut registry = Registry::new();
        let tokens: Vec<_> = (0..8).map(|i| registry.insert(i)).collect();
        registry.remove(tokens[1]);
        registry.remove(tokens[4]);
        registry.remove(tokens[7]);

        let mut seen = Vec::new();
        registry.for_each(|v| seen.push(*v));
        assert_eq!(seen, vec![0, 2, 3, 5, 6]);
    }

    #[test]
    fn interleaved_create_destroy_never_visits_stale_entries() {
        // Deterministic pseudo-random interleaving of inserts and
        // removals, mirrored against a HashSet of live values.
        let mut registry = Registry::new();
        let mut live: Vec<(Token, u32)> = Vec::new();
        let mut expected: HashSet<u32> = HashSet::new();
        let mut next_value = 0u32;
        let mut rng = 0x2545_F491_u32;

        for _ in 0..1000 {
            rng = rng.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let insert = live.is_empty() || rng % 3 != 0;
            if insert {
                let token = registry.insert(next_value);
                live.push((token, next_value));
                expected.insert(next_value);
                next_value += 1;
            } else {
                let index = (rng as usize / 7) % live.len();
                let (token, value) = live.swap_remove(index);
                assert_eq!(registry.remove(token), Some(value));
                expected.remove(&value);
            }

            let mut visited = HashSet::new();
            registry.for_each(|v| {
                assert!(visited.insert(*v), "value visited twice");
            });
            assert_eq!(visited, expected);
            assert_eq!(registry.len(), expected.len());
        }
    }
}
