//! Shared fixtures for coordinator tests
use crate::{
    Amount, Count, CountAndSum, CountSum, Crossfilter, EngineConfig, GroupHandle, Key, RecordStore,
    Sum, TotalHandle,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub zip: String,
    pub agency: String,
    pub hour: u8,
    pub fine: f64,
    pub coords: Option<(f64, f64)>,
}

pub fn ticket(zip: &str, agency: &str, hour: u8, fine: f64) -> Ticket {
    Ticket {
        zip: zip.to_string(),
        agency: agency.to_string(),
        hour,
        fine,
        coords: None,
    }
}

/// Five citations across three zip codes.
pub fn five_tickets() -> Vec<Ticket> {
    vec![
        ticket("19102", "PPA", 8, 25.0),
        ticket("19102", "POLICE", 9, 50.0),
        ticket("19103", "PPA", 8, 25.0),
        ticket("19104", "PPA", 17, 100.0),
        ticket("19102", "POLICE", 12, 25.0),
    ]
}

pub struct Board {
    pub cf: Crossfilter<Ticket>,
    /// Count and revenue per zip, ignoring the zip filter.
    pub by_zip: GroupHandle<CountSum>,
    /// Tickets per agency, ignoring the agency filter.
    pub by_agency: GroupHandle<u64>,
    /// Revenue per hour, ignoring the hour filter.
    pub by_hour: GroupHandle<Amount>,
    /// Tickets per zip under every filter, the zip filter included.
    pub visible_by_zip: GroupHandle<u64>,
    pub totals: TotalHandle<CountSum>,
}

pub fn board(records: Vec<Ticket>) -> Board {
    board_with(records, EngineConfig::default())
}

pub fn board_with(records: Vec<Ticket>, config: EngineConfig) -> Board {
    let store = RecordStore::load(records).unwrap();
    let mut cf = Crossfilter::with_config(store, config);
    cf.register_dimension("zip", |t: &Ticket| Key::text(t.zip.as_str()))
        .unwrap();
    cf.register_dimension("agency", |t: &Ticket| Key::text(t.agency.as_str()))
        .unwrap();
    cf.register_dimension("hour", |t: &Ticket| Key::from(t.hour))
        .unwrap();
    cf.register_dimension("fine", |t: &Ticket| Key::from(t.fine))
        .unwrap();

    let by_zip = cf
        .register_group("by_zip", "zip", CountAndSum::new(|t: &Ticket| t.fine), true)
        .unwrap();
    let by_agency = cf
        .register_group("by_agency", "agency", Count, true)
        .unwrap();
    let by_hour = cf
        .register_group("by_hour", "hour", Sum::new(|t: &Ticket| t.fine), true)
        .unwrap();
    let visible_by_zip = cf
        .register_group("visible_by_zip", "zip", Count, false)
        .unwrap();
    let totals = cf
        .register_group_all("totals", CountAndSum::new(|t: &Ticket| t.fine))
        .unwrap();

    Board {
        cf,
        by_zip,
        by_agency,
        by_hour,
        visible_by_zip,
        totals,
    }
}

pub fn amount(v: f64) -> Amount {
    Amount::from_f64(v).unwrap()
}

pub fn text(s: &str) -> Key {
    Key::text(s)
}

/// Keys of a group result whose value satisfies `keep`, in key order.
pub fn keys_where<A: crate::Accumulator>(
    cf: &Crossfilter<Ticket>,
    handle: &GroupHandle<A>,
    keep: impl Fn(&A) -> bool,
) -> Vec<String> {
    cf.group_result(handle)
        .unwrap()
        .iter()
        .filter(|(_, v)| keep(v))
        .map(|(k, _)| k.to_string())
        .collect()
}
