use super::common::*;
use crate::{Count, CountSum, Filter};
use std::collections::BTreeMap;

fn counts(cf: &crate::Crossfilter<Ticket>, handle: &crate::GroupHandle<u64>) -> BTreeMap<String, u64> {
    cf.group_result(handle)
        .unwrap()
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect()
}

fn expected(pairs: &[(&str, u64)]) -> BTreeMap<String, u64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn zip_filter_restricts_totals_but_not_its_own_group() {
    let mut b = board(five_tickets());
    let tickets_by_zip = b
        .cf
        .register_group("tickets_by_zip", "zip", Count, true)
        .unwrap();

    let all = expected(&[("19102", 3), ("19103", 1), ("19104", 1)]);
    assert_eq!(counts(&b.cf, &tickets_by_zip), all);
    assert_eq!(
        *b.cf.total(&b.totals).unwrap(),
        CountSum {
            count: 5,
            total: amount(225.0)
        }
    );

    b.cf.set_filter("zip", Filter::exact("19102")).unwrap();
    assert_eq!(
        *b.cf.total(&b.totals).unwrap(),
        CountSum {
            count: 3,
            total: amount(100.0)
        }
    );
    assert_eq!(counts(&b.cf, &tickets_by_zip), all);
    assert_eq!(b.cf.visible_count(), 3);

    // Other dimensions see only the three matching records.
    let agencies = b.cf.group_result(&b.by_agency).unwrap();
    assert_eq!(agencies[&text("POLICE")], 2);
    assert_eq!(agencies[&text("PPA")], 1);

    b.cf.clear_filter("zip").unwrap();
    assert_eq!(
        *b.cf.total(&b.totals).unwrap(),
        CountSum {
            count: 5,
            total: amount(225.0)
        }
    );
}

#[test]
fn top_two_zips_break_ties_by_ascending_key() {
    let mut b = board(five_tickets());
    let tickets_by_zip = b
        .cf
        .register_group("tickets_by_zip", "zip", Count, true)
        .unwrap();

    let top: Vec<(String, u64)> = b
        .cf
        .top(&tickets_by_zip, 2)
        .unwrap()
        .into_iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect();
    assert_eq!(
        top,
        vec![("19102".to_string(), 3), ("19103".to_string(), 1)]
    );
}

#[test]
fn non_self_excluding_group_follows_its_own_filter() {
    let mut b = board(five_tickets());
    b.cf.set_filter("zip", Filter::exact("19102")).unwrap();
    let visible = b.cf.group_result(&b.visible_by_zip).unwrap();
    assert_eq!(visible[&text("19102")], 3);
    assert_eq!(visible[&text("19103")], 0);
    assert_eq!(visible[&text("19104")], 0);
}
