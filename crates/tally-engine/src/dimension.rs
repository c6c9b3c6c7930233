//! Ordered key index over every record of the store.

use crate::error::{EngineError, Result};
use crate::filter::Filter;
use crate::mask::RowBitSet;
use crate::store::RecordStore;
use std::ops::Range;
use tally_common::{Key, RecordId};

#[derive(Debug, Clone)]
pub struct Dimension {
    name: String,
    /// `keys[id]` is the key of record `id`.
    keys: Vec<Key>,
    /// Record ids sorted by `(key, id)`.
    order: Vec<RecordId>,
}

impl Dimension {
    /// Project every record through `key_of` and sort.
    ///
    /// Fails on the first record for which `key_of` yields no key (or a NaN).
    pub fn build<R, F>(name: &str, store: &RecordStore<R>, key_of: F) -> Result<Self>
    where
        F: Fn(&R) -> Option<Key>,
    {
        let mut keys = Vec::with_capacity(store.len());
        for (id, record) in store.iter() {
            match key_of(record) {
                Some(key) if key.is_defined() => keys.push(key),
                _ => {
                    return Err(EngineError::DimensionKeyError {
                        dimension: name.to_string(),
                        record: id,
                    });
                }
            }
        }

        let mut order: Vec<RecordId> = store.ids().collect();
        // Stable: equal keys keep ascending id order.
        order.sort_by(|a, b| keys[a.index()].cmp(&keys[b.index()]));

        Ok(Self {
            name: name.to_string(),
            keys,
            order,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[inline]
    pub fn key(&self, id: RecordId) -> &Key {
        &self.keys[id.index()]
    }

    /// Record ids in ascending key order, ties by ascending id.
    pub fn ascending(&self) -> impl DoubleEndedIterator<Item = RecordId> + '_ {
        self.order.iter().copied()
    }

    /// Record ids in descending key order. Ties still run by ascending id.
    pub fn descending(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.runs().rev().flat_map(|(_, ids)| ids.iter().copied())
    }

    /// Runs of equal keys, in ascending key order.
    pub fn runs(&self) -> impl DoubleEndedIterator<Item = (&Key, &[RecordId])> + '_ {
        self.order
            .chunk_by(move |a, b| self.keys[a.index()] == self.keys[b.index()])
            .map(move |ids| (&self.keys[ids[0].index()], ids))
    }

    pub fn distinct_keys(&self) -> impl Iterator<Item = &Key> + '_ {
        self.runs().map(|(key, _)| key)
    }

    pub fn min_key(&self) -> Option<&Key> {
        self.order.first().map(|id| self.key(*id))
    }

    pub fn max_key(&self) -> Option<&Key> {
        self.order.last().map(|id| self.key(*id))
    }

    fn lower_bound(&self, key: &Key) -> usize {
        self.order.partition_point(|id| self.key(*id) < key)
    }

    fn upper_bound(&self, key: &Key) -> usize {
        self.order.partition_point(|id| self.key(*id) <= key)
    }

    /// Positions in `order` selected by `filter`, as disjoint ascending ranges.
    fn selected_ranges(&self, filter: &Filter) -> Vec<Range<usize>> {
        match filter {
            Filter::All => vec![0..self.order.len()],
            Filter::Exact(key) => vec![self.lower_bound(key)..self.upper_bound(key)],
            Filter::Range { lo, hi } => {
                let start = self.lower_bound(lo);
                let end = self.lower_bound(hi).max(start);
                vec![start..end]
            }
            Filter::In(keys) => keys
                .iter()
                .map(|k| self.lower_bound(k)..self.upper_bound(k))
                .filter(|r| !r.is_empty())
                .collect(),
            Filter::Predicate(p) => {
                let mut ranges = Vec::new();
                let mut start = 0;
                for (key, ids) in self.runs() {
                    let end = start + ids.len();
                    if p.test(key) {
                        ranges.push(start..end);
                    }
                    start = end;
                }
                ranges
            }
        }
    }

    /// Bitset of the records `filter` rejects.
    pub(crate) fn rejected_by(&self, filter: &Filter) -> RowBitSet {
        if filter.is_all() {
            return RowBitSet::new(self.len());
        }
        let mut rejected = RowBitSet::full(self.len());
        for range in self.selected_ranges(filter) {
            for id in &self.order[range] {
                rejected.set(id.index(), false);
            }
        }
        rejected
    }
}
