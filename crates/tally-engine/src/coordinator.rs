//! The cross-filter coordinator.
//!
//! Owns the record store, every dimension and group, the filter set and the
//! rejection mask. Each `set_filter` / `clear_filter` / `clear_all` call is one
//! interaction that runs `FilterChanged -> Recomputing -> NotifyingViews` to
//! completion before returning.

use crate::config::{EngineConfig, RecomputeStrategy, ReducerVerification};
use crate::diagnostics::Diagnostic;
use crate::dimension::Dimension;
use crate::error::{EngineError, Result};
use crate::filter::{Filter, FilterSet};
use crate::group::{
    self, GroupHandle, GroupSlot, GroupStatus, KeyedGroup, KeyedState, Snapshot, TotalGroup,
    TotalHandle, TotalState,
};
use crate::listener::{ChangeListener, FilterRequests};
use crate::mask::RejectionMask;
use crate::reducer::{Accumulator, Reducer};
use crate::store::RecordStore;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tally_common::{Key, RecordId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InteractionPhase {
    #[default]
    Idle,
    FilterChanged,
    Recomputing,
    NotifyingViews,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InteractionStats {
    /// Records whose rejection bit flipped in a modified dimension.
    pub records_toggled: usize,
    /// Groups brought up to date (by delta or rebuild).
    pub groups_recomputed: usize,
    pub full_rebuilds: usize,
    /// `add`/`remove` calls made by delta application.
    pub reductions: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleGroup {
    pub group: String,
    pub reason: String,
}

/// What one interaction changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    /// Sequence number of the interaction, starting at 1.
    pub interaction: u64,
    /// Dimensions whose filter was replaced.
    pub modified: Vec<String>,
    /// Dimensions whose self-excluding groups may have changed, in
    /// registration order. A dimension is listed when any *other* dimension
    /// was modified.
    pub changed_dimensions: Vec<String>,
    /// Groups that were recomputed, in registration order.
    pub changed_groups: Vec<String>,
    /// Groups left stale. A non-empty list makes this a degraded update.
    pub stale_groups: Vec<StaleGroup>,
    /// The VisibleSet (and anything derived from it) is always refreshed.
    pub visible_changed: bool,
    pub stats: InteractionStats,
}

impl ChangeSet {
    pub fn is_degraded(&self) -> bool {
        !self.stale_groups.is_empty()
    }

    pub fn changed(&self, dimension: &str) -> bool {
        self.changed_dimensions.iter().any(|d| d == dimension)
    }
}

pub struct Crossfilter<R> {
    store: RecordStore<R>,
    config: EngineConfig,
    dimensions: Vec<Dimension>,
    dimension_slots: FxHashMap<String, usize>,
    filters: FilterSet,
    mask: RejectionMask,
    groups: Vec<Box<dyn GroupSlot<R>>>,
    group_slots: FxHashMap<String, usize>,
    listeners: Vec<Box<dyn ChangeListener<R>>>,
    diagnostics: Vec<Diagnostic>,
    phase: InteractionPhase,
    interactions: u64,
}

impl<R: 'static> Crossfilter<R> {
    pub fn new(store: RecordStore<R>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: RecordStore<R>, config: EngineConfig) -> Self {
        let mask = RejectionMask::new(store.len());
        Self {
            store,
            config,
            dimensions: Vec::new(),
            dimension_slots: FxHashMap::default(),
            filters: FilterSet::default(),
            mask,
            groups: Vec::new(),
            group_slots: FxHashMap::default(),
            listeners: Vec::new(),
            diagnostics: Vec::new(),
            phase: InteractionPhase::Idle,
            interactions: 0,
        }
    }

    pub fn store(&self) -> &RecordStore<R> {
        &self.store
    }

    pub fn size(&self) -> usize {
        self.store.len()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> InteractionPhase {
        self.phase
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /* ───────────────────────── registration ───────────────────────── */

    /// Index every record under `key_of`. Keys are computed once, here.
    pub fn register_dimension<F, K>(&mut self, id: &str, key_of: F) -> Result<()>
    where
        F: Fn(&R) -> K,
        K: Into<Option<Key>>,
    {
        if self.dimension_slots.contains_key(id) {
            return Err(EngineError::DuplicateDimension(id.to_string()));
        }
        let dimension = Dimension::build(id, &self.store, |r| key_of(r).into())?;
        let slot = self.mask.push_dimension();
        self.filters.push_slot();
        self.dimensions.push(dimension);
        self.dimension_slots.insert(id.to_string(), slot);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            dimension = id,
            keys = self.dimensions[slot].distinct_keys().count(),
            "registered dimension"
        );
        Ok(())
    }

    /// Aggregate `dimension`'s keys with `reducer`.
    ///
    /// With `exclude_self` the group ignores its own dimension's filter;
    /// without it the group follows the full VisibleSet.
    pub fn register_group<Red>(
        &mut self,
        id: &str,
        dimension: &str,
        reducer: Red,
        exclude_self: bool,
    ) -> Result<GroupHandle<Red::Acc>>
    where
        Red: Reducer<R>,
    {
        self.check_new_group(id)?;
        let dim_slot = self.dimension_slot(dimension)?;
        let found = self.verify(id, &reducer);

        let snap = Snapshot {
            store: &self.store,
            dimensions: &self.dimensions,
            mask: &self.mask,
        };
        let group = KeyedGroup::new(id, dim_slot, exclude_self, reducer, &snap).map_err(
            |(record, err)| EngineError::Reduce {
                group: id.to_string(),
                record,
                message: err.message,
            },
        )?;
        self.install(id, Box::new(group))?;
        self.record_diagnostics(found);
        Ok(GroupHandle::new(self.groups.len() - 1, id))
    }

    /// One accumulator over the VisibleSet.
    pub fn register_group_all<Red>(&mut self, id: &str, reducer: Red) -> Result<TotalHandle<Red::Acc>>
    where
        Red: Reducer<R>,
    {
        self.check_new_group(id)?;
        let found = self.verify(id, &reducer);
        let snap = Snapshot {
            store: &self.store,
            dimensions: &self.dimensions,
            mask: &self.mask,
        };
        let group = TotalGroup::new(id, reducer, &snap);
        self.install(id, Box::new(group))?;
        self.record_diagnostics(found);
        Ok(TotalHandle::new(self.groups.len() - 1, id))
    }

    fn check_new_group(&self, id: &str) -> Result<()> {
        if self.group_slots.contains_key(id) {
            return Err(EngineError::DuplicateGroup(id.to_string()));
        }
        Ok(())
    }

    fn install(&mut self, id: &str, group: Box<dyn GroupSlot<R>>) -> Result<()> {
        if let GroupStatus::Stale { reason } = group.status() {
            return Err(EngineError::StaleGroup {
                group: id.to_string(),
                reason: reason.clone(),
            });
        }
        self.groups.push(group);
        self.group_slots.insert(id.to_string(), self.groups.len() - 1);
        Ok(())
    }

    /// Sampled add/remove check. Findings are kept only once the group is
    /// installed.
    fn verify<Red: Reducer<R>>(&self, id: &str, reducer: &Red) -> Vec<Diagnostic> {
        let ReducerVerification::Sampled { every } = self.config.verify_reducers else {
            return Vec::new();
        };
        group::verify_reducer(id, reducer, &self.store, every)
    }

    fn record_diagnostics(&mut self, found: Vec<Diagnostic>) {
        #[cfg(feature = "tracing")]
        for diag in &found {
            tracing::warn!(%diag, "reducer invariant violation");
        }
        self.diagnostics.extend(found);
    }

    /// Register a listener. Listeners are called in registration order.
    pub fn on_change<L>(&mut self, listener: L)
    where
        L: ChangeListener<R> + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /* ───────────────────────── interactions ───────────────────────── */

    /// Replace `dimension`'s filter.
    pub fn set_filter(&mut self, dimension: &str, filter: Filter) -> Result<ChangeSet> {
        let slot = self.dimension_slot(dimension)?;
        self.run(vec![(slot, filter)])
    }

    pub fn clear_filter(&mut self, dimension: &str) -> Result<ChangeSet> {
        self.set_filter(dimension, Filter::All)
    }

    /// Reset every dimension to accept-all in one interaction.
    pub fn clear_all(&mut self) -> Result<ChangeSet> {
        let edits = self
            .filters
            .active_slots()
            .map(|slot| (slot, Filter::All))
            .collect();
        self.run(edits)
    }

    fn run(&mut self, edits: Vec<(usize, Filter)>) -> Result<ChangeSet> {
        let (change, mut pending) = self.interact(edits)?;

        let mut budget = self.config.max_cascade;
        while let Some((dimension, filter)) = pending.pop() {
            if budget == 0 {
                let dropped: Vec<_> = std::iter::once((dimension, filter))
                    .chain(pending.drain())
                    .collect();
                for (dimension, _) in dropped {
                    self.drop_request(dimension, "cascade limit reached".to_string());
                }
                break;
            }
            budget -= 1;
            match self.dimension_slot(&dimension) {
                Ok(slot) => {
                    let (_, more) = self.interact(vec![(slot, filter)])?;
                    pending.append(more);
                }
                Err(err) => self.drop_request(dimension, err.to_string()),
            }
        }
        Ok(change)
    }

    fn drop_request(&mut self, dimension: String, reason: String) {
        #[cfg(feature = "tracing")]
        tracing::warn!(dimension = %dimension, reason = %reason, "dropping filter request");
        self.diagnostics
            .push(Diagnostic::DroppedRequest { dimension, reason });
    }

    fn interact(&mut self, edits: Vec<(usize, Filter)>) -> Result<(ChangeSet, FilterRequests)> {
        if self.phase != InteractionPhase::Idle {
            return Err(EngineError::Busy { phase: self.phase });
        }
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("interaction", edits = edits.len()).entered();

        let started = Instant::now();
        self.interactions += 1;
        let mut stats = InteractionStats::default();

        let stale_at_start: Vec<bool> = self.groups.iter().map(|g| g.status().is_stale()).collect();
        // Stale groups get another rebuild whether or not they depend on the edit.
        let mut touched = stale_at_start.clone();
        let mut modified: SmallVec<[usize; 4]> = SmallVec::new();

        for (slot, filter) in edits {
            self.phase = InteractionPhase::FilterChanged;
            let rejected = self.dimensions[slot].rejected_by(&filter);
            self.filters.replace(slot, filter);
            let toggles = self.mask.replace(slot, rejected);
            stats.records_toggled += toggles.len();
            if !modified.contains(&slot) {
                modified.push(slot);
            }

            self.phase = InteractionPhase::Recomputing;
            let snap = Snapshot {
                store: &self.store,
                dimensions: &self.dimensions,
                mask: &self.mask,
            };
            for (gi, group) in self.groups.iter_mut().enumerate() {
                if !group.binding().depends_on(slot) && !stale_at_start[gi] {
                    continue;
                }
                touched[gi] = true;
                let incremental = self.config.strategy == RecomputeStrategy::Incremental;
                if incremental && !stale_at_start[gi] && !group.status().is_stale() {
                    stats.reductions += group.apply(&snap, slot, &toggles);
                }
            }
        }

        // Full rescans happen once, against the final mask.
        self.phase = InteractionPhase::Recomputing;
        let snap = Snapshot {
            store: &self.store,
            dimensions: &self.dimensions,
            mask: &self.mask,
        };
        for (gi, group) in self.groups.iter_mut().enumerate() {
            if !touched[gi] {
                continue;
            }
            stats.groups_recomputed += 1;
            if self.config.strategy == RecomputeStrategy::FullRescan || stale_at_start[gi] {
                group.rebuild(&snap);
                stats.full_rebuilds += 1;
            }
        }

        let change = self.change_set(&modified, &touched, stats, started);
        #[cfg(feature = "tracing")]
        for stale in &change.stale_groups {
            tracing::warn!(group = %stale.group, reason = %stale.reason, "group left stale");
        }

        let requests = self.notify(&change);
        Ok((change, requests))
    }

    fn change_set(
        &self,
        modified: &[usize],
        touched: &[bool],
        mut stats: InteractionStats,
        started: Instant,
    ) -> ChangeSet {
        let changed_dimensions = self
            .dimensions
            .iter()
            .enumerate()
            .filter(|(slot, _)| modified.iter().any(|m| m != slot))
            .map(|(_, d)| d.name().to_string())
            .collect();
        let changed_groups = self
            .groups
            .iter()
            .zip(touched)
            .filter(|(_, t)| **t)
            .map(|(g, _)| g.name().to_string())
            .collect();
        let stale_groups = self
            .groups
            .iter()
            .filter_map(|g| match g.status() {
                GroupStatus::Stale { reason } => Some(StaleGroup {
                    group: g.name().to_string(),
                    reason: reason.clone(),
                }),
                GroupStatus::Fresh => None,
            })
            .collect();
        stats.elapsed = started.elapsed();

        ChangeSet {
            interaction: self.interactions,
            modified: modified
                .iter()
                .map(|slot| self.dimensions[*slot].name().to_string())
                .collect(),
            changed_dimensions,
            changed_groups,
            stale_groups,
            visible_changed: true,
            stats,
        }
    }

    fn notify(&mut self, change: &ChangeSet) -> FilterRequests {
        self.phase = InteractionPhase::NotifyingViews;
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("notify", listeners = self.listeners.len()).entered();

        let mut requests = FilterRequests::default();
        let mut listeners = std::mem::take(&mut self.listeners);
        // A listener may panic; the listeners and the phase come back either way.
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            for listener in listeners.iter_mut() {
                listener.on_change(change, self, &mut requests);
            }
        }));
        self.listeners = listeners;
        self.phase = InteractionPhase::Idle;
        if let Err(payload) = outcome {
            std::panic::resume_unwind(payload);
        }
        requests
    }

    /* ───────────────────────── filter state ───────────────────────── */

    fn dimension_slot(&self, id: &str) -> Result<usize> {
        self.dimension_slots
            .get(id)
            .copied()
            .ok_or_else(|| EngineError::UnknownDimension(id.to_string()))
    }

    pub fn dimension(&self, id: &str) -> Result<&Dimension> {
        Ok(&self.dimensions[self.dimension_slot(id)?])
    }

    /// Registered dimension ids, in registration order.
    pub fn dimension_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.dimensions.iter().map(Dimension::name)
    }

    pub fn filter(&self, dimension: &str) -> Result<&Filter> {
        Ok(self.filters.get(self.dimension_slot(dimension)?))
    }

    pub fn has_filter(&self, dimension: &str) -> Result<bool> {
        Ok(!self.filter(dimension)?.is_all())
    }

    pub fn has_any_active_filter(&self) -> bool {
        self.filters.any_active()
    }

    /* ───────────────────────── records ───────────────────────── */

    pub fn is_visible(&self, id: RecordId) -> bool {
        id.index() < self.store.len() && self.mask.visible(id)
    }

    pub fn visible_count(&self) -> usize {
        self.mask.visible_count()
    }

    pub fn visible_ids(&self) -> Vec<RecordId> {
        self.store.ids().filter(|id| self.mask.visible(*id)).collect()
    }

    /// The VisibleSet in store order.
    pub fn visible_records(&self) -> Vec<&R> {
        self.store
            .iter()
            .filter(|(id, _)| self.mask.visible(*id))
            .map(|(_, r)| r)
            .collect()
    }

    /// Records passing every filter, or every filter but `dimension`'s own.
    pub fn filtered_record_ids(&self, dimension: &str, exclude_self: bool) -> Result<Vec<RecordId>> {
        let slot = self.dimension_slot(dimension)?;
        Ok(self
            .store
            .ids()
            .filter(|id| {
                if exclude_self {
                    self.mask.visible_excluding(*id, slot)
                } else {
                    self.mask.visible(*id)
                }
            })
            .collect())
    }

    /// Up to `n` visible records with the largest keys; ties by ascending id.
    pub fn top_records(&self, dimension: &str, n: usize) -> Result<Vec<&R>> {
        let dim = self.dimension(dimension)?;
        Ok(dim
            .descending()
            .filter(|id| self.mask.visible(*id))
            .take(n)
            .map(|id| self.store.record(id))
            .collect())
    }

    /// Up to `n` visible records with the smallest keys; ties by ascending id.
    pub fn bottom_records(&self, dimension: &str, n: usize) -> Result<Vec<&R>> {
        let dim = self.dimension(dimension)?;
        Ok(dim
            .ascending()
            .filter(|id| self.mask.visible(*id))
            .take(n)
            .map(|id| self.store.record(id))
            .collect())
    }

    /* ───────────────────────── group results ───────────────────────── */

    fn slot_of(&self, slot: usize, name: &str) -> Result<&dyn GroupSlot<R>> {
        let group = self
            .groups
            .get(slot)
            .filter(|g| g.name() == name)
            .ok_or_else(|| EngineError::UnknownGroup(name.to_string()))?;
        if let GroupStatus::Stale { reason } = group.status() {
            return Err(EngineError::StaleGroup {
                group: name.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(group.as_ref())
    }

    fn keyed<A: Accumulator>(&self, handle: &GroupHandle<A>) -> Result<&KeyedState<A>> {
        self.slot_of(handle.slot, handle.name())?
            .state()
            .downcast_ref::<KeyedState<A>>()
            .ok_or_else(|| EngineError::GroupTypeMismatch(handle.name().to_string()))
    }

    /// Key -> accumulator, in ascending key order.
    pub fn group_result<A: Accumulator>(&self, handle: &GroupHandle<A>) -> Result<&BTreeMap<Key, A>> {
        Ok(&self.keyed(handle)?.values)
    }

    /// Entries sorted by `cmp`; equal entries keep ascending key order.
    pub fn ordered_result<A, F>(&self, handle: &GroupHandle<A>, mut cmp: F) -> Result<Vec<(&Key, &A)>>
    where
        A: Accumulator,
        F: FnMut(&(&Key, &A), &(&Key, &A)) -> Ordering,
    {
        let mut entries: Vec<(&Key, &A)> = self.group_result(handle)?.iter().collect();
        entries.sort_by(|a, b| cmp(a, b));
        Ok(entries)
    }

    /// The `n` largest entries by magnitude; ties by ascending key.
    pub fn top<A: Accumulator>(&self, handle: &GroupHandle<A>, n: usize) -> Result<Vec<(&Key, &A)>> {
        let mut ranked = group::ranked(self.group_result(handle)?);
        ranked.truncate(n);
        Ok(ranked)
    }

    /// The tail of the ranking, smallest first.
    pub fn bottom<A: Accumulator>(&self, handle: &GroupHandle<A>, n: usize) -> Result<Vec<(&Key, &A)>> {
        let ranked = group::ranked(self.group_result(handle)?);
        let start = ranked.len().saturating_sub(n);
        Ok(ranked[start..].iter().rev().copied().collect())
    }

    /// Current values in the order captured before any filter was applied.
    pub fn pinned_result<A: Accumulator>(&self, handle: &GroupHandle<A>) -> Result<Vec<(&Key, &A)>> {
        Ok(group::pinned(self.keyed(handle)?))
    }

    pub fn total<A: Accumulator>(&self, handle: &TotalHandle<A>) -> Result<&A> {
        self.slot_of(handle.slot, handle.name())?
            .state()
            .downcast_ref::<TotalState<A>>()
            .map(|s| &s.value)
            .ok_or_else(|| EngineError::GroupTypeMismatch(handle.name().to_string()))
    }

    /// Untyped view of any group: key and numeric projection of its value.
    pub fn group_magnitudes(&self, id: &str) -> Result<Vec<(Key, f64)>> {
        let slot = self
            .group_slots
            .get(id)
            .copied()
            .ok_or_else(|| EngineError::UnknownGroup(id.to_string()))?;
        Ok(self.slot_of(slot, id)?.magnitudes())
    }

    pub fn group_status(&self, id: &str) -> Result<&GroupStatus> {
        self.group_slots
            .get(id)
            .map(|slot| self.groups[*slot].status())
            .ok_or_else(|| EngineError::UnknownGroup(id.to_string()))
    }

    /// Registered group ids, in registration order.
    pub fn group_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.groups.iter().map(|g| g.name())
    }
}
