//! CRDT sequences whose logical order comes from left/right neighbour links.
//!
//! Items are stored in the order they were read so encoding reproduces the
//! physical layout. The logical order is recovered by a topological sort of
//! the neighbour links, emitting each "wave" of ready items in ascending id
//! order so the result is deterministic.

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;

use super::CrdtId;
use crate::error::SceneError;

/// One element (or tombstone run) of a [`CrdtSequence`].
///
/// A present `value` is a live element. `deleted_length > 0` with no value
/// is a tombstone covering that many deleted elements.
#[derive(Debug, Clone, PartialEq)]
pub struct CrdtSequenceItem<T> {
    pub item_id: CrdtId,
    pub left_id: CrdtId,
    pub right_id: CrdtId,
    pub deleted_length: u32,
    pub value: Option<T>,
}

impl<T> CrdtSequenceItem<T> {
    pub fn new(
        item_id: CrdtId,
        left_id: CrdtId,
        right_id: CrdtId,
        deleted_length: u32,
        value: Option<T>,
    ) -> Self {
        Self { item_id, left_id, right_id, deleted_length, value }
    }

    pub fn is_deleted(&self) -> bool {
        self.value.is_none()
    }

    /// Same links and id with a different payload.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CrdtSequenceItem<U> {
        CrdtSequenceItem {
            item_id: self.item_id,
            left_id: self.left_id,
            right_id: self.right_id,
            deleted_length: self.deleted_length,
            value: self.value.map(f),
        }
    }
}

/// An unordered collection of linked sequence items keyed by id.
#[derive(Debug, Clone, PartialEq)]
pub struct CrdtSequence<T> {
    items: IndexMap<CrdtId, CrdtSequenceItem<T>>,
}

impl<T> Default for CrdtSequence<T> {
    fn default() -> Self {
        Self { items: IndexMap::new() }
    }
}

impl<T> FromIterator<CrdtSequenceItem<T>> for CrdtSequence<T> {
    fn from_iter<I: IntoIterator<Item = CrdtSequenceItem<T>>>(iter: I) -> Self {
        let mut seq = Self::default();
        for item in iter {
            seq.add(item);
        }
        seq
    }
}

impl<T> CrdtSequence<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item. An item with the same id replaces the earlier one in
    /// place.
    pub fn add(&mut self, item: CrdtSequenceItem<T>) {
        self.items.insert(item.item_id, item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &CrdtId) -> bool {
        self.items.contains_key(id)
    }

    pub fn item(&self, id: &CrdtId) -> Option<&CrdtSequenceItem<T>> {
        self.items.get(id)
    }

    /// The live value stored under `id`.
    pub fn get(&self, id: &CrdtId) -> Option<&T> {
        self.items.get(id).and_then(|item| item.value.as_ref())
    }

    /// Items in storage (insertion) order.
    pub fn sequence_items(&self) -> impl Iterator<Item = &CrdtSequenceItem<T>> {
        self.items.values()
    }

    /// Item ids in logical order, tombstones included.
    pub fn ordered_ids(&self) -> Result<Vec<CrdtId>, SceneError> {
        toposort(self.items.values().map(|i| (i.item_id, i.left_id, i.right_id)))
    }

    /// Items in logical order, tombstones included.
    pub fn ordered_items(&self) -> Result<Vec<&CrdtSequenceItem<T>>, SceneError> {
        Ok(self
            .ordered_ids()?
            .iter()
            .filter_map(|id| self.items.get(id))
            .collect())
    }

    /// Live values in logical order.
    pub fn values(&self) -> Result<Vec<&T>, SceneError> {
        Ok(self
            .ordered_items()?
            .into_iter()
            .filter_map(|item| item.value.as_ref())
            .collect())
    }
}

// ── Ordering ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Key {
    Start,
    Item(CrdtId),
    End,
}

/// Orders `(id, left, right)` triples by their neighbour links.
///
/// Each item depends on its left neighbour (the synthetic start when the
/// sentinel is used), and the item named by its right id depends on it (the
/// synthetic end for the sentinel). Neighbours that are neither the sentinel
/// nor a known item are rejected.
pub fn toposort<I>(links: I) -> Result<Vec<CrdtId>, SceneError>
where
    I: IntoIterator<Item = (CrdtId, CrdtId, CrdtId)>,
{
    toposort_weighted(links.into_iter().map(|(id, left, right)| (id, left, right, 1)))
}

/// Like [`toposort`], for items that each stand for `weight` consecutive
/// positions.
///
/// Items are emitted in waves: an item's wave is one past the furthest
/// position among the items it depends on, and each wave is emitted in
/// ascending id order. An item of weight `w` spans `w` waves, exactly as
/// `w` single items linked in a chain would.
pub fn toposort_weighted<I>(links: I) -> Result<Vec<CrdtId>, SceneError>
where
    I: IntoIterator<Item = (CrdtId, CrdtId, CrdtId, u64)>,
{
    let links: Vec<(CrdtId, CrdtId, CrdtId, u64)> = links.into_iter().collect();
    let known: BTreeSet<CrdtId> = links.iter().map(|(id, ..)| *id).collect();

    let side = |id: CrdtId, boundary: Key| -> Result<Key, SceneError> {
        if id.is_end() {
            Ok(boundary)
        } else if known.contains(&id) {
            Ok(Key::Item(id))
        } else {
            Err(SceneError::DanglingReference(id))
        }
    };

    // deps[k] = keys that must be emitted before k
    let mut deps: HashMap<Key, BTreeSet<Key>> = HashMap::new();
    let mut weights: HashMap<Key, u64> = HashMap::new();
    for &(id, left, right, weight) in &links {
        let left = side(left, Key::Start)?;
        let right = side(right, Key::End)?;
        deps.entry(Key::Item(id)).or_default().insert(left);
        deps.entry(right).or_default().insert(Key::Item(id));
        deps.entry(left).or_default();
        weights.insert(Key::Item(id), weight.max(1));
    }

    let mut dependents: HashMap<Key, Vec<Key>> = HashMap::new();
    let mut pending: HashMap<Key, usize> = HashMap::new();
    for (key, before) in &deps {
        pending.insert(*key, before.len());
        for dep in before {
            dependents.entry(*dep).or_default().push(*key);
        }
    }

    let mut ready: Vec<Key> = pending
        .iter()
        .filter(|(_, n)| **n == 0)
        .map(|(k, _)| *k)
        .collect();
    let mut wave: HashMap<Key, u64> = HashMap::new();
    let mut placed: Vec<(u64, CrdtId)> = Vec::with_capacity(known.len());

    while let Some(key) = ready.pop() {
        pending.remove(&key);
        let here = wave.get(&key).copied().unwrap_or(0);
        if let Key::Item(id) = key {
            placed.push((here, id));
        }
        let after = here.saturating_add(weights.get(&key).copied().unwrap_or(1));
        for next in dependents.get(&key).into_iter().flatten() {
            let slot = wave.entry(*next).or_insert(0);
            *slot = (*slot).max(after);
            if let Some(n) = pending.get_mut(next) {
                *n -= 1;
                if *n == 0 {
                    ready.push(*next);
                }
            }
        }
    }

    if placed.len() != known.len() {
        let mut stuck: Vec<CrdtId> = pending
            .keys()
            .filter_map(|k| match k {
                Key::Item(id) => Some(*id),
                _ => None,
            })
            .collect();
        stuck.sort();
        return Err(SceneError::CyclicOrder(stuck));
    }
    placed.sort();
    Ok(placed.into_iter().map(|(_, id)| id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::END_MARKER;

    fn id(n: u64) -> CrdtId {
        CrdtId::new(0, n)
    }

    fn item(
        n: u64,
        left: CrdtId,
        right: CrdtId,
        value: &'static str,
    ) -> CrdtSequenceItem<&'static str> {
        CrdtSequenceItem::new(id(n), left, right, 0, Some(value))
    }

    #[test]
    fn two_linked_items() {
        let seq: CrdtSequence<_> = [
            item(1, END_MARKER, id(2), "a"),
            item(2, id(1), END_MARKER, "b"),
        ]
        .into_iter()
        .collect();
        assert_eq!(seq.values().unwrap(), vec![&"a", &"b"]);
    }

    #[test]
    fn storage_order_is_irrelevant() {
        let seq: CrdtSequence<_> = [
            item(3, id(2), END_MARKER, "c"),
            item(1, END_MARKER, id(2), "a"),
            item(2, id(1), id(3), "b"),
        ]
        .into_iter()
        .collect();
        assert_eq!(seq.ordered_ids().unwrap(), vec![id(1), id(2), id(3)]);
        let stored: Vec<_> = seq.sequence_items().map(|i| i.item_id).collect();
        assert_eq!(stored, vec![id(3), id(1), id(2)]);
    }

    #[test]
    fn concurrent_inserts_sorted_by_id() {
        // Both inserted between start and end; ties break by ascending id.
        let seq: CrdtSequence<_> = [
            item(7, END_MARKER, END_MARKER, "late"),
            item(4, END_MARKER, END_MARKER, "early"),
        ]
        .into_iter()
        .collect();
        assert_eq!(seq.values().unwrap(), vec![&"early", &"late"]);
    }

    #[test]
    fn cycle_is_an_error() {
        let seq: CrdtSequence<_> = [
            item(1, END_MARKER, id(2), "a"),
            item(2, id(1), END_MARKER, "b"),
            item(3, id(2), id(1), "c"),
        ]
        .into_iter()
        .collect();
        match seq.ordered_ids() {
            Err(SceneError::CyclicOrder(ids)) => assert_eq!(ids, vec![id(1), id(2), id(3)]),
            other => panic!("expected cyclic order, got {other:?}"),
        }
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let seq: CrdtSequence<_> = [item(1, id(1), END_MARKER, "a")].into_iter().collect();
        assert!(matches!(seq.ordered_ids(), Err(SceneError::CyclicOrder(_))));
    }

    #[test]
    fn dangling_neighbour_is_an_error() {
        let seq: CrdtSequence<_> = [item(1, id(9), END_MARKER, "a")].into_iter().collect();
        assert_eq!(seq.ordered_ids(), Err(SceneError::DanglingReference(id(9))));
    }

    #[test]
    fn tombstones_are_ordered_but_not_values() {
        let seq: CrdtSequence<&str> = [
            item(1, END_MARKER, id(2), "a"),
            CrdtSequenceItem::new(id(2), id(1), id(3), 1, None),
            item(3, id(2), END_MARKER, "c"),
        ]
        .into_iter()
        .collect();
        assert_eq!(seq.ordered_ids().unwrap().len(), 3);
        assert_eq!(seq.values().unwrap(), vec![&"a", &"c"]);
        assert!(seq.item(&id(2)).unwrap().is_deleted());
    }

    #[test]
    fn weight_counts_as_that_many_waves() {
        // Start -> 10 (three positions) -> 3, alongside Start -> 5 -> 6.
        let links = [
            (id(10), END_MARKER, id(3), 3),
            (id(3), id(10), END_MARKER, 1),
            (id(5), END_MARKER, id(6), 1),
            (id(6), id(5), END_MARKER, 1),
        ];
        assert_eq!(toposort_weighted(links).unwrap(), vec![id(5), id(10), id(6), id(3)]);
        let unweighted = links.map(|(a, l, r, _)| (a, l, r));
        assert_eq!(toposort(unweighted).unwrap(), vec![id(5), id(10), id(3), id(6)]);
    }

    #[test]
    fn empty_sequence() {
        let seq: CrdtSequence<u8> = CrdtSequence::new();
        assert!(seq.ordered_ids().unwrap().is_empty());
    }
}
