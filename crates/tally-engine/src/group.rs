//! Group state: keyed aggregations over one dimension and whole-set totals.
//!
//! Groups are stored type-erased behind [`GroupSlot`] so a coordinator can
//! hold reducers with different accumulator types side by side. Typed access
//! goes back through a [`GroupHandle`] / [`TotalHandle`] that remembers the
//! accumulator type.

use crate::diagnostics::Diagnostic;
use crate::dimension::Dimension;
use crate::mask::{RejectionMask, Toggle};
use crate::reducer::{Accumulator, ReduceError, Reducer};
use crate::store::RecordStore;
use std::any::Any;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::rc::Rc;
use tally_common::{Key, RecordId};

/// Which records feed a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Keyed by a dimension. With `exclude_self` the dimension's own filter
    /// is ignored; without it the group sees the full VisibleSet.
    Keyed { dimension: usize, exclude_self: bool },
    /// One accumulator over the VisibleSet.
    All,
}

impl Binding {
    #[inline]
    pub(crate) fn includes(&self, mask: &RejectionMask, id: RecordId) -> bool {
        match *self {
            Binding::Keyed {
                dimension,
                exclude_self: true,
            } => mask.visible_excluding(id, dimension),
            _ => mask.visible(id),
        }
    }

    /// False only for a self-excluding group on the changed dimension.
    pub(crate) fn depends_on(&self, changed: usize) -> bool {
        !matches!(
            *self,
            Binding::Keyed { dimension, exclude_self: true } if dimension == changed
        )
    }

    fn transition(&self, mask: &RejectionMask, changed: usize, t: &Toggle) -> Option<Transition> {
        let others = match *self {
            Binding::Keyed {
                dimension,
                exclude_self: true,
            } => {
                if dimension == changed {
                    return None;
                }
                t.others - mask.rejected_by(dimension, t.id) as u16
            }
            _ => t.others,
        };
        if others != 0 {
            return None;
        }
        Some(if t.now_rejected {
            Transition::Leave
        } else {
            Transition::Enter
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Enter,
    Leave,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GroupStatus {
    #[default]
    Fresh,
    /// A reduction failed; the values are not trustworthy until a rebuild succeeds.
    Stale { reason: String },
}

impl GroupStatus {
    pub fn is_stale(&self) -> bool {
        matches!(self, GroupStatus::Stale { .. })
    }

    fn failed(record: RecordId, err: ReduceError) -> Self {
        GroupStatus::Stale {
            reason: format!("record {record}: {err}"),
        }
    }
}

/// Everything a group reads while recomputing.
pub(crate) struct Snapshot<'a, R> {
    pub store: &'a RecordStore<R>,
    pub dimensions: &'a [Dimension],
    pub mask: &'a RejectionMask,
}

pub(crate) trait GroupSlot<R> {
    fn name(&self) -> &str;
    fn binding(&self) -> Binding;
    fn status(&self) -> &GroupStatus;
    /// Recompute from scratch under the current mask.
    fn rebuild(&mut self, snap: &Snapshot<'_, R>);
    /// Apply the membership flips caused by a change to dimension `changed`.
    /// Returns the number of reductions performed.
    fn apply(&mut self, snap: &Snapshot<'_, R>, changed: usize, toggles: &[Toggle]) -> usize;
    fn magnitudes(&self) -> Vec<(Key, f64)>;
    fn state(&self) -> &dyn Any;
}

/// Typed reference to a keyed group.
pub struct GroupHandle<A> {
    pub(crate) slot: usize,
    name: Rc<str>,
    _marker: PhantomData<fn() -> A>,
}

/// Typed reference to a whole-set total.
pub struct TotalHandle<A> {
    pub(crate) slot: usize,
    name: Rc<str>,
    _marker: PhantomData<fn() -> A>,
}

macro_rules! handle_impls {
    ($handle:ident) => {
        impl<A> $handle<A> {
            pub(crate) fn new(slot: usize, name: &str) -> Self {
                Self {
                    slot,
                    name: Rc::from(name),
                    _marker: PhantomData,
                }
            }

            pub fn name(&self) -> &str {
                &self.name
            }
        }

        impl<A> Clone for $handle<A> {
            fn clone(&self) -> Self {
                Self {
                    slot: self.slot,
                    name: self.name.clone(),
                    _marker: PhantomData,
                }
            }
        }

        impl<A> std::fmt::Debug for $handle<A> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($handle))
                    .field("slot", &self.slot)
                    .field("name", &self.name)
                    .finish()
            }
        }
    };
}

handle_impls!(GroupHandle);
handle_impls!(TotalHandle);

pub(crate) struct KeyedState<A> {
    pub values: BTreeMap<Key, A>,
    /// Key order captured over the unfiltered dataset at registration.
    pub pinned: Vec<Key>,
}

pub(crate) struct KeyedGroup<R, Red: Reducer<R>> {
    name: String,
    dimension: usize,
    exclude_self: bool,
    reducer: Red,
    state: KeyedState<Red::Acc>,
    status: GroupStatus,
    _marker: PhantomData<fn(&R)>,
}

impl<R: 'static, Red: Reducer<R>> KeyedGroup<R, Red> {
    /// Capture the pinned ordering from an unfiltered pass, then build under
    /// the current mask.
    pub(crate) fn new(
        name: &str,
        dimension: usize,
        exclude_self: bool,
        reducer: Red,
        snap: &Snapshot<'_, R>,
    ) -> Result<Self, (RecordId, ReduceError)> {
        let dim = &snap.dimensions[dimension];
        let unfiltered = reduce_runs(&reducer, snap.store, dim, |_| true)?;
        let mut ranked: Vec<(&Key, &Red::Acc)> = unfiltered.iter().collect();
        ranked.sort_by(|a, b| b.1.magnitude().total_cmp(&a.1.magnitude()));
        let pinned = ranked.into_iter().map(|(k, _)| k.clone()).collect();

        let mut group = Self {
            name: name.to_string(),
            dimension,
            exclude_self,
            reducer,
            state: KeyedState {
                values: BTreeMap::new(),
                pinned,
            },
            status: GroupStatus::Fresh,
            _marker: PhantomData,
        };
        group.rebuild(snap);
        Ok(group)
    }
}

fn reduce_runs<R, Red: Reducer<R>>(
    reducer: &Red,
    store: &RecordStore<R>,
    dim: &Dimension,
    include: impl Fn(RecordId) -> bool,
) -> Result<BTreeMap<Key, Red::Acc>, (RecordId, ReduceError)> {
    let mut values = BTreeMap::new();
    for (key, ids) in dim.runs() {
        let mut acc = reducer.initial();
        for &id in ids {
            if include(id) {
                acc = reducer.add(&acc, store.record(id)).map_err(|e| (id, e))?;
            }
        }
        values.insert(key.clone(), acc);
    }
    Ok(values)
}

impl<R: 'static, Red: Reducer<R>> GroupSlot<R> for KeyedGroup<R, Red> {
    fn name(&self) -> &str {
        &self.name
    }

    fn binding(&self) -> Binding {
        Binding::Keyed {
            dimension: self.dimension,
            exclude_self: self.exclude_self,
        }
    }

    fn status(&self) -> &GroupStatus {
        &self.status
    }

    fn rebuild(&mut self, snap: &Snapshot<'_, R>) {
        let binding = self.binding();
        let dim = &snap.dimensions[self.dimension];
        match reduce_runs(&self.reducer, snap.store, dim, |id| {
            binding.includes(snap.mask, id)
        }) {
            Ok(values) => {
                self.state.values = values;
                self.status = GroupStatus::Fresh;
            }
            Err((id, err)) => self.status = GroupStatus::failed(id, err),
        }
    }

    fn apply(&mut self, snap: &Snapshot<'_, R>, changed: usize, toggles: &[Toggle]) -> usize {
        let binding = self.binding();
        let dim = &snap.dimensions[self.dimension];
        let mut applied = 0;
        for t in toggles {
            let Some(transition) = binding.transition(snap.mask, changed, t) else {
                continue;
            };
            let Some(acc) = self.state.values.get_mut(dim.key(t.id)) else {
                continue;
            };
            let record = snap.store.record(t.id);
            let next = match transition {
                Transition::Enter => self.reducer.add(acc, record),
                Transition::Leave => self.reducer.remove(acc, record),
            };
            match next {
                Ok(value) => *acc = value,
                Err(err) => {
                    self.status = GroupStatus::failed(t.id, err);
                    return applied;
                }
            }
            applied += 1;
        }
        applied
    }

    fn magnitudes(&self) -> Vec<(Key, f64)> {
        self.state
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.magnitude()))
            .collect()
    }

    fn state(&self) -> &dyn Any {
        &self.state
    }
}

pub(crate) struct TotalState<A> {
    pub value: A,
}

pub(crate) struct TotalGroup<R, Red: Reducer<R>> {
    name: String,
    reducer: Red,
    state: TotalState<Red::Acc>,
    status: GroupStatus,
    _marker: PhantomData<fn(&R)>,
}

impl<R: 'static, Red: Reducer<R>> TotalGroup<R, Red> {
    pub(crate) fn new(name: &str, reducer: Red, snap: &Snapshot<'_, R>) -> Self {
        let value = reducer.initial();
        let mut group = Self {
            name: name.to_string(),
            reducer,
            state: TotalState { value },
            status: GroupStatus::Fresh,
            _marker: PhantomData,
        };
        group.rebuild(snap);
        group
    }
}

impl<R: 'static, Red: Reducer<R>> GroupSlot<R> for TotalGroup<R, Red> {
    fn name(&self) -> &str {
        &self.name
    }

    fn binding(&self) -> Binding {
        Binding::All
    }

    fn status(&self) -> &GroupStatus {
        &self.status
    }

    fn rebuild(&mut self, snap: &Snapshot<'_, R>) {
        let mut acc = self.reducer.initial();
        for (id, record) in snap.store.iter() {
            if !snap.mask.visible(id) {
                continue;
            }
            match self.reducer.add(&acc, record) {
                Ok(next) => acc = next,
                Err(err) => {
                    self.status = GroupStatus::failed(id, err);
                    return;
                }
            }
        }
        self.state.value = acc;
        self.status = GroupStatus::Fresh;
    }

    fn apply(&mut self, snap: &Snapshot<'_, R>, changed: usize, toggles: &[Toggle]) -> usize {
        let mut applied = 0;
        for t in toggles {
            let Some(transition) = Binding::All.transition(snap.mask, changed, t) else {
                continue;
            };
            let record = snap.store.record(t.id);
            let next = match transition {
                Transition::Enter => self.reducer.add(&self.state.value, record),
                Transition::Leave => self.reducer.remove(&self.state.value, record),
            };
            match next {
                Ok(value) => self.state.value = value,
                Err(err) => {
                    self.status = GroupStatus::failed(t.id, err);
                    return applied;
                }
            }
            applied += 1;
        }
        applied
    }

    fn magnitudes(&self) -> Vec<(Key, f64)> {
        vec![(Key::text(self.name.as_str()), self.state.value.magnitude())]
    }

    fn state(&self) -> &dyn Any {
        &self.state
    }
}

/// Sampled `remove(add(acc, r), r) == acc` check, from the initial accumulator
/// and from one that already holds the first record.
pub(crate) fn verify_reducer<R, Red: Reducer<R>>(
    group: &str,
    reducer: &Red,
    store: &RecordStore<R>,
    every: usize,
) -> Vec<Diagnostic> {
    let base = reducer.initial();
    let seeded = store
        .iter()
        .next()
        .and_then(|(_, first)| reducer.add(&base, first).ok());

    let mut found = Vec::new();
    for (id, record) in store.iter().step_by(every.max(1)) {
        for prior in std::iter::once(&base).chain(seeded.as_ref()) {
            let detail = match reducer
                .add(prior, record)
                .and_then(|up| reducer.remove(&up, record))
            {
                Ok(back) if back.same_as(prior) => continue,
                Ok(back) => format!("started from {prior:?}, came back as {back:?}"),
                Err(err) => format!("started from {prior:?}, reducer failed: {err}"),
            };
            found.push(Diagnostic::ReduceInvariantViolation {
                group: group.to_string(),
                record: id,
                detail,
            });
            break;
        }
    }
    found
}

/// Entries by descending magnitude; equal magnitudes keep ascending key order.
pub(crate) fn ranked<A: Accumulator>(values: &BTreeMap<Key, A>) -> Vec<(&Key, &A)> {
    let mut entries: Vec<(&Key, &A)> = values.iter().collect();
    entries.sort_by(|a, b| b.1.magnitude().total_cmp(&a.1.magnitude()));
    entries
}

/// Entries in the pinned key order; keys missing from the snapshot go last.
pub(crate) fn pinned<A>(state: &KeyedState<A>) -> Vec<(&Key, &A)> {
    let mut out: Vec<(&Key, &A)> = state
        .pinned
        .iter()
        .filter_map(|k| state.values.get_key_value(k))
        .collect();
    if out.len() < state.values.len() {
        let pinned: std::collections::BTreeSet<&Key> = state.pinned.iter().collect();
        out.extend(state.values.iter().filter(|(k, _)| !pinned.contains(k)));
    }
    out
}
