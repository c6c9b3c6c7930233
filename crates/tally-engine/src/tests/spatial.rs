use super::common::*;
use crate::{Filter, GeoPoint, LatestPoints, SpatialJoin};
use std::cell::RefCell;
use std::rc::Rc;

fn located() -> Vec<Ticket> {
    let mut records = five_tickets();
    records[0].coords = Some((-75.16, 39.95));
    records[1].coords = Some((-75.17, 39.96));
    records[2].coords = None;
    records[3].coords = Some((-75.19, f64::NAN));
    records[4].coords = Some((-75.15, 39.94));
    records
}

fn project(t: &Ticket) -> Option<GeoPoint> {
    t.coords.and_then(|(lng, lat)| GeoPoint::checked(lng, lat))
}

#[test]
fn overlay_follows_the_visible_set() {
    let mut b = board(located());
    let overlay = Rc::new(RefCell::new(LatestPoints::default()));
    let mut join = SpatialJoin::new(project, Rc::clone(&overlay));
    join.prime(&b.cf);
    assert_eq!(overlay.borrow().points.len(), 3);
    b.cf.on_change(join);

    b.cf.set_filter("agency", Filter::exact("POLICE")).unwrap();
    assert_eq!(
        overlay.borrow().points,
        vec![
            GeoPoint { lng: -75.17, lat: 39.96 },
            GeoPoint { lng: -75.15, lat: 39.94 },
        ]
    );

    b.cf.set_filter("zip", Filter::exact("19104")).unwrap();
    assert!(overlay.borrow().points.is_empty());
    assert_eq!(overlay.borrow().publications, 3);
}

#[test]
fn out_of_range_coordinates_are_discarded() {
    assert!(GeoPoint::checked(-75.0, 39.9).is_some());
    assert!(GeoPoint::checked(181.0, 39.9).is_none());
    assert!(GeoPoint::checked(-75.0, -91.0).is_none());
    assert!(GeoPoint::checked(f64::INFINITY, 0.0).is_none());

    let mut records = five_tickets();
    records[0].coords = Some((500.0, 39.95));
    let b = board(records);
    let join = SpatialJoin::new(
        |t: &Ticket| t.coords.map(|(lng, lat)| GeoPoint { lng, lat }),
        LatestPoints::default(),
    );
    assert!(join.points(&b.cf).is_empty());
}
