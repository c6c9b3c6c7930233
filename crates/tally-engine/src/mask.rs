//! Per-dimension rejection bitsets plus a per-record rejection count.
//!
//! A record is in the VisibleSet when no dimension rejects it
//! (`count == 0`). A record is visible to a group bound to dimension `D`
//! under self-exclusion when the only dimension rejecting it is `D` itself
//! (`count - rejected_by(D) == 0`). Both checks are O(1), which is what makes
//! incremental recompute cheap: a filter change only touches the records whose
//! bit in the changed dimension flips.

use tally_common::RecordId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RowBitSet {
    words: Vec<u64>,
    len: usize,
}

impl RowBitSet {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    pub(crate) fn full(len: usize) -> Self {
        let mut set = Self {
            words: vec![u64::MAX; len.div_ceil(64)],
            len,
        };
        set.trim_tail();
        set
    }

    #[inline]
    pub(crate) fn get(&self, row: usize) -> bool {
        self.words
            .get(row / 64)
            .map(|word| word & (1u64 << (row % 64)) != 0)
            .unwrap_or(false)
    }

    #[inline]
    pub(crate) fn set(&mut self, row: usize, on: bool) {
        debug_assert!(row < self.len);
        let mask = 1u64 << (row % 64);
        let word = &mut self.words[row / 64];
        if on {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }

    pub(crate) fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Rows whose bit differs between `self` and `other`.
    pub(crate) fn diff<'a>(&'a self, other: &'a RowBitSet) -> impl Iterator<Item = usize> + 'a {
        debug_assert_eq!(self.len, other.len);
        self.words
            .iter()
            .zip(other.words.iter())
            .enumerate()
            .flat_map(|(word_idx, (a, b))| ones(a ^ b).map(move |bit| word_idx * 64 + bit))
    }

    fn trim_tail(&mut self) {
        let tail = self.len % 64;
        if tail != 0
            && let Some(last) = self.words.last_mut()
        {
            *last &= (1u64 << tail) - 1;
        }
    }
}

fn ones(mut bits: u64) -> impl Iterator<Item = usize> {
    std::iter::from_fn(move || {
        if bits == 0 {
            return None;
        }
        let tz = bits.trailing_zeros() as usize;
        bits &= bits - 1;
        Some(tz)
    })
}

/// One record whose rejection by the changed dimension flipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Toggle {
    pub id: RecordId,
    /// Rejections by every *other* dimension, taken before the change.
    pub others: u16,
    /// Whether the changed dimension rejects the record after the change.
    pub now_rejected: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RejectionMask {
    per_dimension: Vec<RowBitSet>,
    counts: Vec<u16>,
    len: usize,
}

impl RejectionMask {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            per_dimension: Vec::new(),
            counts: vec![0; len],
            len,
        }
    }

    /// Add a slot for a newly registered dimension; it rejects nothing.
    pub(crate) fn push_dimension(&mut self) -> usize {
        self.per_dimension.push(RowBitSet::new(self.len));
        self.per_dimension.len() - 1
    }

    #[inline]
    pub(crate) fn rejected_by(&self, dimension: usize, id: RecordId) -> bool {
        self.per_dimension[dimension].get(id.index())
    }

    #[inline]
    pub(crate) fn visible(&self, id: RecordId) -> bool {
        self.counts[id.index()] == 0
    }

    #[inline]
    pub(crate) fn visible_excluding(&self, id: RecordId, dimension: usize) -> bool {
        let own = self.rejected_by(dimension, id) as u16;
        self.counts[id.index()] - own == 0
    }

    pub(crate) fn visible_count(&self) -> usize {
        self.counts.iter().filter(|c| **c == 0).count()
    }

    pub(crate) fn rejected_count(&self, dimension: usize) -> usize {
        self.per_dimension[dimension].count_ones()
    }

    /// Install `rejected` as the new rejection set of `dimension`, returning
    /// the records whose bit flipped together with what they looked like to
    /// the other dimensions before the swap.
    pub(crate) fn replace(&mut self, dimension: usize, rejected: RowBitSet) -> Vec<Toggle> {
        let old = std::mem::replace(&mut self.per_dimension[dimension], rejected);
        let new = &self.per_dimension[dimension];

        let toggles: Vec<Toggle> = old
            .diff(new)
            .map(|row| {
                let was = old.get(row) as u16;
                Toggle {
                    id: RecordId::new(row as u32),
                    others: self.counts[row] - was,
                    now_rejected: new.get(row),
                }
            })
            .collect();

        for t in &toggles {
            let count = &mut self.counts[t.id.index()];
            if t.now_rejected {
                *count += 1;
            } else {
                *count -= 1;
            }
        }
        toggles
    }
}
