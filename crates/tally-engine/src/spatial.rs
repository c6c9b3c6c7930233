//! Projection of the VisibleSet onto map coordinates.

use crate::coordinator::{ChangeSet, Crossfilter};
use crate::listener::{ChangeListener, FilterRequests};
use std::cell::RefCell;
use std::rc::Rc;

/// WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    pub lng: f64,
    pub lat: f64,
}

impl GeoPoint {
    /// `None` unless both coordinates are finite and in range.
    pub fn checked(lng: f64, lat: f64) -> Option<Self> {
        let valid = lng.is_finite()
            && lat.is_finite()
            && (-180.0..=180.0).contains(&lng)
            && (-90.0..=90.0).contains(&lat);
        valid.then_some(Self { lng, lat })
    }
}

/// Consumer of the point list (a hex-bin layer, typically).
pub trait OverlaySink {
    fn publish(&mut self, points: Vec<GeoPoint>);
}

/// Keeps the most recent publication and how many there were.
#[derive(Debug, Default, Clone)]
pub struct LatestPoints {
    pub points: Vec<GeoPoint>,
    pub publications: usize,
}

impl OverlaySink for LatestPoints {
    fn publish(&mut self, points: Vec<GeoPoint>) {
        self.points = points;
        self.publications += 1;
    }
}

impl<S: OverlaySink> OverlaySink for Rc<RefCell<S>> {
    fn publish(&mut self, points: Vec<GeoPoint>) {
        self.borrow_mut().publish(points);
    }
}

/// Listener that republishes visible coordinates after every interaction
/// touching the VisibleSet. Holds no filter state.
pub struct SpatialJoin<R, S> {
    project: Box<dyn Fn(&R) -> Option<GeoPoint>>,
    sink: S,
}

impl<R, S: OverlaySink> SpatialJoin<R, S> {
    pub fn new(project: impl Fn(&R) -> Option<GeoPoint> + 'static, sink: S) -> Self {
        Self {
            project: Box::new(project),
            sink,
        }
    }

    /// Visible records in store order, projected; invalid coordinates dropped.
    pub fn points(&self, view: &Crossfilter<R>) -> Vec<GeoPoint>
    where
        R: 'static,
    {
        view.visible_records()
            .into_iter()
            .filter_map(|r| (self.project)(r))
            .filter(|p| GeoPoint::checked(p.lng, p.lat).is_some())
            .collect()
    }

    /// Publish the initial state, before any interaction has happened.
    pub fn prime(&mut self, view: &Crossfilter<R>)
    where
        R: 'static,
    {
        let points = self.points(view);
        self.sink.publish(points);
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<R: 'static, S: OverlaySink> ChangeListener<R> for SpatialJoin<R, S> {
    fn on_change(&mut self, change: &ChangeSet, view: &Crossfilter<R>, _requests: &mut FilterRequests) {
        if !change.visible_changed {
            return;
        }
        let points = self.points(view);
        #[cfg(feature = "tracing")]
        tracing::trace!(points = points.len(), "publishing overlay");
        self.sink.publish(points);
    }
}
