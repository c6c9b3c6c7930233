use super::common::*;
use crate::{
    Count, Diagnostic, EngineConfig, EngineError, Filter, Key, RecordId, ReduceError,
    ReducerVerification, reduce,
};

/// Revenue that refuses to take back anything above 90.
fn fragile_revenue() -> impl crate::Reducer<Ticket, Acc = f64> {
    reduce(
        || 0.0,
        |acc: &f64, t: &Ticket| Ok(acc + t.fine),
        |acc: &f64, t: &Ticket| {
            if t.fine > 90.0 {
                Err(ReduceError::new("refund above 90"))
            } else {
                Ok(acc - t.fine)
            }
        },
    )
}

fn quiet() -> EngineConfig {
    EngineConfig::default().with_verification(ReducerVerification::Off)
}

#[test]
fn failing_remove_marks_group_stale_but_applies_filter() {
    let mut b = board_with(five_tickets(), quiet());
    let fragile = b
        .cf
        .register_group("fragile", "agency", fragile_revenue(), true)
        .unwrap();

    let change = b.cf.set_filter("zip", Filter::exact("19102")).unwrap();
    assert!(change.is_degraded());
    assert_eq!(change.stale_groups.len(), 1);
    assert_eq!(change.stale_groups[0].group, "fragile");

    assert!(b.cf.has_filter("zip").unwrap());
    assert_eq!(b.cf.visible_count(), 3);
    assert_eq!(b.cf.total(&b.totals).unwrap().total, amount(100.0));
    assert!(matches!(
        b.cf.group_result(&fragile),
        Err(EngineError::StaleGroup { .. })
    ));
    assert!(b.cf.group_status("fragile").unwrap().is_stale());
}

#[test]
fn stale_group_is_rebuilt_on_next_interaction() {
    let mut b = board_with(five_tickets(), quiet());
    let fragile = b
        .cf
        .register_group("fragile", "agency", fragile_revenue(), true)
        .unwrap();
    b.cf.set_filter("zip", Filter::exact("19102")).unwrap();

    // The hour filter does not touch the record that failed.
    let change = b.cf.set_filter("hour", Filter::exact(8u8)).unwrap();
    assert!(!change.is_degraded());
    assert!(change.changed_groups.iter().any(|g| g == "fragile"));
    assert!(change.stats.full_rebuilds >= 1);

    let values = b.cf.group_result(&fragile).unwrap();
    assert_eq!(values[&text("PPA")], 25.0);
    assert_eq!(values[&text("POLICE")], 0.0);
}

#[test]
fn stale_group_is_rebuilt_even_when_unrelated() {
    let mut b = board_with(five_tickets(), quiet());
    let fragile = b
        .cf
        .register_group("fragile", "agency", fragile_revenue(), true)
        .unwrap();
    b.cf.set_filter("zip", Filter::exact("19102")).unwrap();

    // fragile ignores its own agency filter, yet it is still retried.
    b.cf.set_filter("agency", Filter::exact("PPA")).unwrap();
    let values = b.cf.group_result(&fragile).unwrap();
    assert_eq!(values[&text("PPA")], 25.0);
    assert_eq!(values[&text("POLICE")], 75.0);
}

#[test]
fn registration_reports_reducer_failure() {
    let mut b = board_with(five_tickets(), quiet());
    let picky = reduce(
        || 0u64,
        |acc: &u64, t: &Ticket| {
            if t.zip == "19104" {
                Err(ReduceError::new("out of area"))
            } else {
                Ok(acc + 1)
            }
        },
        |acc: &u64, _: &Ticket| Ok(acc - 1),
    );
    let err = b.cf.register_group("picky", "zip", picky, true).unwrap_err();
    assert_eq!(
        err,
        EngineError::Reduce {
            group: "picky".to_string(),
            record: RecordId::new(3),
            message: "out of area".to_string(),
        }
    );
    assert!(b.cf.group_status("picky").is_err());
}

#[test]
fn failed_registration_leaves_no_diagnostics() {
    let config = EngineConfig::default().with_verification(ReducerVerification::Sampled { every: 1 });
    let mut b = board_with(five_tickets(), config);
    let picky = reduce(
        || 0u64,
        |acc: &u64, t: &Ticket| {
            if t.zip == "19104" {
                Err(ReduceError::new("out of area"))
            } else {
                Ok(acc + 1)
            }
        },
        |acc: &u64, _: &Ticket| Ok(acc - 1),
    );
    assert!(b.cf.register_group("picky", "zip", picky, true).is_err());
    assert!(b.cf.diagnostics().is_empty());

    b.cf.register_group("tickets", "zip", Count, true).unwrap();
    assert!(b.cf.diagnostics().is_empty());
}

#[test]
fn verification_flags_non_inverse_reducers() {
    let config = EngineConfig::default().with_verification(ReducerVerification::Sampled { every: 1 });
    let mut b = board_with(five_tickets(), config);
    assert!(b.cf.diagnostics().is_empty());

    let lossy = reduce(
        || 0.0,
        |acc: &f64, t: &Ticket| Ok(acc + t.fine),
        |acc: &f64, t: &Ticket| Ok(acc - t.fine / 2.0),
    );
    b.cf.register_group("lossy", "zip", lossy, true).unwrap();
    let violations = b
        .cf
        .diagnostics()
        .iter()
        .filter(|d| matches!(d, Diagnostic::ReduceInvariantViolation { group, .. } if group == "lossy"))
        .count();
    assert_eq!(violations, 5);
}

#[test]
fn duplicate_and_unknown_registrations_fail() {
    let mut b = board_with(five_tickets(), quiet());
    assert_eq!(
        b.cf.register_dimension("zip", |t: &Ticket| Key::text(t.zip.as_str())),
        Err(EngineError::DuplicateDimension("zip".to_string()))
    );
    assert!(matches!(
        b.cf.register_group("by_zip", "zip", Count, true),
        Err(EngineError::DuplicateGroup(_))
    ));
    assert!(matches!(
        b.cf.register_group("by_borough", "borough", Count, true),
        Err(EngineError::UnknownDimension(_))
    ));
}

#[test]
fn missing_key_fails_dimension_registration() {
    let mut b = board_with(five_tickets(), quiet());
    let err = b
        .cf
        .register_dimension("coords", |t: &Ticket| t.coords.map(|(lng, _)| Key::from(lng)))
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::DimensionKeyError {
            dimension: "coords".to_string(),
            record: RecordId::new(0),
        }
    );
}
