use super::common::*;
use crate::{Filter, Key};

#[test]
fn filtering_a_dimension_leaves_its_own_group_untouched() {
    let mut b = board(five_tickets());
    let before_zip = b.cf.group_result(&b.by_zip).unwrap().clone();
    let before_agency = b.cf.group_result(&b.by_agency).unwrap().clone();

    b.cf.set_filter("zip", Filter::one_of(["19103", "19104"]))
        .unwrap();
    assert_eq!(*b.cf.group_result(&b.by_zip).unwrap(), before_zip);
    assert_ne!(*b.cf.group_result(&b.by_agency).unwrap(), before_agency);

    b.cf.set_filter("agency", Filter::exact("POLICE")).unwrap();
    // zip now sees the agency filter, agency still ignores its own.
    let agencies = b.cf.group_result(&b.by_agency).unwrap();
    assert_eq!(agencies[&text("PPA")], 2);
    assert_eq!(agencies[&text("POLICE")], 0);
    assert_eq!(
        keys_where(&b.cf, &b.by_zip, |cs| cs.count > 0),
        vec!["19102".to_string()]
    );
    assert_eq!(b.cf.visible_count(), 0);
}

#[test]
fn group_sees_every_filter_but_its_own() {
    let mut b = board(five_tickets());
    b.cf.set_filter("zip", Filter::exact("19102")).unwrap();
    b.cf.set_filter("hour", Filter::range(8u8, 10u8)).unwrap();

    // by_hour ignores the hour filter: all three 19102 tickets contribute.
    let by_hour = b.cf.group_result(&b.by_hour).unwrap();
    assert_eq!(by_hour[&Key::from(8u8)], amount(25.0));
    assert_eq!(by_hour[&Key::from(9u8)], amount(50.0));
    assert_eq!(by_hour[&Key::from(12u8)], amount(25.0));
    assert_eq!(by_hour[&Key::from(17u8)], amount(0.0));

    // by_zip ignores zip but honours hour 8..10: records 0, 1, 2.
    let by_zip = b.cf.group_result(&b.by_zip).unwrap();
    assert_eq!(by_zip[&text("19102")].count, 2);
    assert_eq!(by_zip[&text("19103")].count, 1);
    assert_eq!(by_zip[&text("19104")].count, 0);

    let filtered = b.cf.filtered_record_ids("zip", true).unwrap();
    assert_eq!(filtered.iter().map(|id| id.raw()).collect::<Vec<_>>(), vec![0, 1, 2]);
    let visible = b.cf.filtered_record_ids("zip", false).unwrap();
    assert_eq!(visible.iter().map(|id| id.raw()).collect::<Vec<_>>(), vec![0, 1]);
}

#[test]
fn conjunction_is_the_intersection_of_single_filters() {
    let zip_only = {
        let mut b = board(five_tickets());
        b.cf.set_filter("zip", Filter::exact("19102")).unwrap();
        b.cf.visible_ids()
    };
    let agency_only = {
        let mut b = board(five_tickets());
        b.cf.set_filter("agency", Filter::exact("POLICE")).unwrap();
        b.cf.visible_ids()
    };
    let mut b = board(five_tickets());
    b.cf.set_filter("zip", Filter::exact("19102")).unwrap();
    b.cf.set_filter("agency", Filter::exact("POLICE")).unwrap();

    let both: Vec<_> = zip_only
        .iter()
        .filter(|id| agency_only.contains(id))
        .copied()
        .collect();
    assert_eq!(b.cf.visible_ids(), both);
    assert_eq!(both.len(), 2);
}

#[test]
fn predicate_filter_is_evaluated_per_key() {
    let mut b = board(five_tickets());
    b.cf.set_filter(
        "fine",
        Filter::predicate(|k| k.as_f64().is_some_and(|f| f >= 50.0)),
    )
    .unwrap();
    let totals = b.cf.total(&b.totals).unwrap();
    assert_eq!(totals.count, 2);
    assert_eq!(totals.total, amount(150.0));
}
