//! Time-sliced index of unbonding entries.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Maps completion times to the keys of the entries maturing at that time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondingQueue<K: Ord> {
    slices: BTreeMap<Timestamp, Vec<K>>,
}

impl<K: Ord> Default for UnbondingQueue<K> {
    fn default() -> Self {
        Self {
            slices: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone> UnbondingQueue<K> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Files `key` under `completion`. A key already in that slice is not duplicated.
    pub fn insert(&mut self, completion: Timestamp, key: K) {
        let slice = self.slices.entry(completion).or_default();
        if !slice.contains(&key) {
            slice.push(key);
        }
    }

    /// Removes every slice at or before `as_of` and returns the distinct keys found, in key order.
    pub fn dequeue_matured(&mut self, as_of: Timestamp) -> Vec<K> {
        let pending = match as_of.checked_add(1) {
            Some(bound) => self.slices.split_off(&bound),
            None => BTreeMap::new(),
        };
        let matured = std::mem::replace(&mut self.slices, pending);

        matured
            .into_values()
            .flatten()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Earliest completion time still queued.
    pub fn next_completion(&self) -> Option<Timestamp> {
        self.slices.keys().next().copied()
    }

    /// Number of queued keys, counting a key once per slice it appears in.
    pub fn len(&self) -> usize {
        self.slices.values().map(Vec::len).sum()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_matured_slices_are_dequeued() {
        let mut queue = UnbondingQueue::new();
        queue.insert(30, "c");
        queue.insert(10, "a");
        queue.insert(20, "b");
        queue.insert(10, "a");
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.dequeue_matured(20), vec!["a", "b"]);
        assert_eq!(queue.next_completion(), Some(30));
        assert!(queue.dequeue_matured(29).is_empty());
        assert_eq!(queue.dequeue_matured(i64::MAX), vec!["c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn keys_in_several_slices_come_out_once() {
        let mut queue = UnbondingQueue::new();
        queue.insert(5, ("alice", "op"));
        queue.insert(7, ("alice", "op"));
        queue.insert(7, ("bob", "op"));
        assert_eq!(
            queue.dequeue_matured(10),
            vec![("alice", "op"), ("bob", "op")]
        );
    }
}
