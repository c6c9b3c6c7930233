//! Change notification seam between the coordinator and its views.

use crate::coordinator::{ChangeSet, Crossfilter};
use crate::filter::Filter;
use std::collections::VecDeque;

/// Filters a listener asks for while it is being notified.
///
/// They are applied one by one, each as its own interaction, after every
/// listener has seen the current change.
#[derive(Debug, Default)]
pub struct FilterRequests {
    queue: VecDeque<(String, Filter)>,
}

impl FilterRequests {
    pub fn set_filter(&mut self, dimension: impl Into<String>, filter: Filter) {
        self.queue.push_back((dimension.into(), filter));
    }

    pub fn clear_filter(&mut self, dimension: impl Into<String>) {
        self.set_filter(dimension, Filter::All);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub(crate) fn pop(&mut self) -> Option<(String, Filter)> {
        self.queue.pop_front()
    }

    pub(crate) fn append(&mut self, mut other: FilterRequests) {
        self.queue.append(&mut other.queue);
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = (String, Filter)> + '_ {
        self.queue.drain(..)
    }
}

/// Receives one call per completed interaction, in registration order.
pub trait ChangeListener<R> {
    fn on_change(&mut self, change: &ChangeSet, view: &Crossfilter<R>, requests: &mut FilterRequests);
}

impl<R, F> ChangeListener<R> for F
where
    F: FnMut(&ChangeSet, &Crossfilter<R>, &mut FilterRequests),
{
    fn on_change(&mut self, change: &ChangeSet, view: &Crossfilter<R>, requests: &mut FilterRequests) {
        self(change, view, requests)
    }
}
