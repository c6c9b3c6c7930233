//! Per-dimension selection predicates and the set of currently active ones.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;
use tally_common::Key;

/// A pure `Key -> bool` predicate.
#[derive(Clone)]
pub struct Predicate(Rc<dyn Fn(&Key) -> bool>);

impl Predicate {
    pub fn new(f: impl Fn(&Key) -> bool + 'static) -> Self {
        Self(Rc::new(f))
    }

    #[inline]
    pub fn test(&self, key: &Key) -> bool {
        (self.0)(key)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

/// Which keys of a dimension are currently selected.
///
/// Setting a filter replaces the dimension's previous one; filters on the
/// same dimension never compose.
#[derive(Debug, Clone, Default)]
pub enum Filter {
    #[default]
    All,
    Exact(Key),
    /// Half-open `[lo, hi)`.
    Range { lo: Key, hi: Key },
    In(BTreeSet<Key>),
    Predicate(Predicate),
}

impl Filter {
    pub fn exact(key: impl Into<Key>) -> Self {
        Filter::Exact(key.into())
    }

    pub fn range(lo: impl Into<Key>, hi: impl Into<Key>) -> Self {
        Filter::Range {
            lo: lo.into(),
            hi: hi.into(),
        }
    }

    /// Multi-select. An empty selection means "nothing picked", which is the
    /// same as no filter at all.
    pub fn one_of<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let set: BTreeSet<Key> = keys.into_iter().map(Into::into).collect();
        if set.is_empty() {
            Filter::All
        } else {
            Filter::In(set)
        }
    }

    pub fn predicate(f: impl Fn(&Key) -> bool + 'static) -> Self {
        Filter::Predicate(Predicate::new(f))
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Filter::All)
    }

    pub fn matches(&self, key: &Key) -> bool {
        match self {
            Filter::All => true,
            Filter::Exact(k) => key == k,
            Filter::Range { lo, hi } => lo <= key && key < hi,
            Filter::In(set) => set.contains(key),
            Filter::Predicate(p) => p.test(key),
        }
    }
}

/// Current filter per dimension slot. A slot left at [`Filter::All`] is
/// indistinguishable from one that was never set.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub(crate) fn push_slot(&mut self) {
        self.filters.push(Filter::All);
    }

    pub fn get(&self, slot: usize) -> &Filter {
        &self.filters[slot]
    }

    /// Swap in a new filter and hand back the one it replaced.
    pub(crate) fn replace(&mut self, slot: usize, filter: Filter) -> Filter {
        std::mem::replace(&mut self.filters[slot], filter)
    }

    pub fn any_active(&self) -> bool {
        self.filters.iter().any(|f| !f.is_all())
    }

    pub fn active_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.filters
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.is_all())
            .map(|(slot, _)| slot)
    }
}
