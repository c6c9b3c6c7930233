use super::common::*;
use crate::{Amount, EngineConfig, Filter, Key};
use proptest::prelude::*;
use std::collections::BTreeMap;

const ZIPS: [&str; 4] = ["19102", "19103", "19104", "19147"];
const AGENCIES: [&str; 3] = ["PPA", "POLICE", "HOUSING"];
const FINES: [f64; 8] = [25.0, 36.0, 50.0, 100.0, 0.1, 0.07, 12.35, 30.61];

#[derive(Debug, Clone)]
enum Op {
    Zips(Vec<usize>),
    Agency(usize),
    Hours(u8, u8),
    Fine(usize),
    Clear(usize),
    ClearAll,
}

const DIMS: [&str; 4] = ["zip", "agency", "hour", "fine"];

fn ticket_strategy() -> impl Strategy<Value = Ticket> {
    (0..ZIPS.len(), 0..AGENCIES.len(), 0u8..24, 0..FINES.len())
        .prop_map(|(z, a, h, f)| ticket(ZIPS[z], AGENCIES[a], h, FINES[f]))
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        prop::collection::vec(0..ZIPS.len(), 0..3).prop_map(Op::Zips),
        (0..AGENCIES.len()).prop_map(Op::Agency),
        (0u8..24, 0u8..24).prop_map(|(a, b)| Op::Hours(a.min(b), a.max(b) + 1)),
        (0..FINES.len()).prop_map(Op::Fine),
        (0..DIMS.len()).prop_map(Op::Clear),
        Just(Op::ClearAll),
    ]
}

fn key_of(dim: &str, t: &Ticket) -> Key {
    match dim {
        "zip" => Key::text(t.zip.as_str()),
        "agency" => Key::text(t.agency.as_str()),
        "hour" => Key::from(t.hour),
        _ => Key::from(t.fine),
    }
}

/// Applies one op to a board, mirroring it into a plain filter map.
fn apply(b: &mut Board, filters: &mut BTreeMap<&'static str, Filter>, op: &Op) {
    let (dim, filter) = match op {
        Op::Zips(picks) => ("zip", Filter::one_of(picks.iter().map(|i| ZIPS[*i]))),
        Op::Agency(i) => ("agency", Filter::exact(AGENCIES[*i])),
        Op::Hours(lo, hi) => ("hour", Filter::range(*lo, *hi)),
        Op::Fine(i) => ("fine", Filter::exact(FINES[*i])),
        Op::Clear(i) => (DIMS[*i], Filter::All),
        Op::ClearAll => {
            b.cf.clear_all().unwrap();
            filters.clear();
            return;
        }
    };
    b.cf.set_filter(dim, filter.clone()).unwrap();
    filters.insert(dim, filter);
}

fn passes(filters: &BTreeMap<&'static str, Filter>, t: &Ticket, except: Option<&str>) -> bool {
    filters
        .iter()
        .filter(|(dim, _)| Some(**dim) != except)
        .all(|(dim, f)| f.matches(&key_of(dim, t)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn incremental_matches_full_rescan_and_brute_force(
        records in prop::collection::vec(ticket_strategy(), 1..60),
        ops in prop::collection::vec(op_strategy(), 1..12),
    ) {
        let mut inc = board(records.clone());
        let mut full = board_with(records.clone(), EngineConfig::full_rescan());
        let mut filters = BTreeMap::new();

        for op in &ops {
            apply(&mut inc, &mut filters, op);
            let mut shadow = filters.clone();
            apply(&mut full, &mut shadow, op);

            prop_assert_eq!(inc.cf.group_result(&inc.by_zip).unwrap(), full.cf.group_result(&full.by_zip).unwrap());
            prop_assert_eq!(inc.cf.group_result(&inc.by_agency).unwrap(), full.cf.group_result(&full.by_agency).unwrap());
            prop_assert_eq!(inc.cf.group_result(&inc.by_hour).unwrap(), full.cf.group_result(&full.by_hour).unwrap());
            prop_assert_eq!(inc.cf.group_result(&inc.visible_by_zip).unwrap(), full.cf.group_result(&full.visible_by_zip).unwrap());
            prop_assert_eq!(inc.cf.total(&inc.totals).unwrap(), full.cf.total(&full.totals).unwrap());
            prop_assert_eq!(inc.cf.visible_ids(), full.cf.visible_ids());

            let visible: Vec<&Ticket> = records.iter().filter(|t| passes(&filters, t, None)).collect();
            prop_assert_eq!(inc.cf.visible_records(), visible.clone());
            let revenue = Amount::from_micros(visible.iter().map(|t| amount(t.fine).micros()).sum());
            prop_assert_eq!(inc.cf.total(&inc.totals).unwrap().total, revenue);

            for (agency, count) in inc.cf.group_result(&inc.by_agency).unwrap() {
                let expected = records
                    .iter()
                    .filter(|t| passes(&filters, t, Some("agency")))
                    .filter(|t| key_of("agency", t) == *agency)
                    .count() as u64;
                prop_assert_eq!(*count, expected);
            }
        }
    }
}

fn fractional_tickets() -> Vec<Ticket> {
    (0..40)
        .map(|i| {
            let zip = ZIPS[i % ZIPS.len()];
            let agency = AGENCIES[i % AGENCIES.len()];
            let fine = 0.1 * ((i * 13) % 17) as f64 + 0.07 * i as f64;
            ticket(zip, agency, (i % 24) as u8, fine)
        })
        .collect()
}

#[test]
fn fractional_fines_agree_across_strategies() {
    let records = fractional_tickets();
    let mut inc = board(records.clone());
    let mut full = board_with(records, EngineConfig::full_rescan());
    let zip_before = inc.cf.group_result(&inc.by_zip).unwrap().clone();
    let hour_before = inc.cf.group_result(&inc.by_hour).unwrap().clone();
    let totals_before = *inc.cf.total(&inc.totals).unwrap();

    for b in [&mut inc, &mut full] {
        b.cf.set_filter("zip", Filter::exact("19102")).unwrap();
    }
    assert_eq!(inc.cf.total(&inc.totals).unwrap(), full.cf.total(&full.totals).unwrap());
    assert_eq!(
        inc.cf.group_result(&inc.by_hour).unwrap(),
        full.cf.group_result(&full.by_hour).unwrap()
    );

    for b in [&mut inc, &mut full] {
        b.cf.clear_filter("zip").unwrap();
    }
    for b in [&inc, &full] {
        assert_eq!(*b.cf.group_result(&b.by_zip).unwrap(), zip_before);
        assert_eq!(*b.cf.group_result(&b.by_hour).unwrap(), hour_before);
        assert_eq!(*b.cf.total(&b.totals).unwrap(), totals_before);
    }
}
