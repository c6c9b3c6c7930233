//! Cleanup applied to raw rows before validation: hourly timestamps, agency
//! aliases, and collapsing violation descriptions into the most common
//! categories.

use crate::citation::{RawCitation, parse_timestamp};
use chrono::{Datelike, Timelike};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeConfig {
    /// Round timestamps down to the hour so citations share time bins.
    pub hourly_timestamps: bool,
    /// Truncated agency codes and their full names.
    pub agency_aliases: BTreeMap<String, String>,
    /// How many description categories to keep.
    pub top_descriptions: usize,
    /// Descriptions are grouped by this many leading characters.
    pub prefix_len: usize,
    /// Label for every description outside the kept categories.
    pub other_label: String,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        let agency_aliases = [
            ("HOUSIN", "HOUSING"),
            ("POST O", "POST OFFICE"),
            ("FAIRMN", "FAIRMOUNT"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self {
            hourly_timestamps: true,
            agency_aliases,
            top_descriptions: 25,
            prefix_len: 10,
            other_label: "OTHER".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    /// Timestamps that had minutes or seconds to drop.
    pub timestamps_floored: usize,
    /// Missing `dayofweek` or `hour` values taken from the timestamp.
    pub calendar_fields_filled: usize,
    pub agencies_renamed: usize,
    pub categories: usize,
    /// Rows whose description fell outside the kept categories.
    pub descriptions_bucketed: usize,
}

/// Strip the `CC` marker and expand the `HP` / `VEH` abbreviations.
pub fn clean_description(desc: &str) -> String {
    desc.replace("CC", "")
        .replace("HP", "HANDICAP")
        .replace("VEH", "VEHICLE")
        .trim()
        .to_string()
}

/// Floor the timestamp to the hour and fill `dayofweek` (Monday = 0) and
/// `hour` when they are missing. Unparseable timestamps are left for
/// validation to reject.
fn bin_hourly(row: &mut RawCitation, report: &mut NormalizeReport) {
    let Some(ts) = row.timestamp.as_deref().and_then(|raw| parse_timestamp(raw).ok()) else {
        return;
    };
    let floored = ts.format("%Y-%m-%d %H:00:00").to_string();
    if ts.minute() != 0 || ts.second() != 0 || ts.nanosecond() != 0 {
        report.timestamps_floored += 1;
    }
    row.timestamp = Some(floored);

    if row.dayofweek.is_none() {
        row.dayofweek = Some(i64::from(ts.weekday().num_days_from_monday()));
        report.calendar_fields_filled += 1;
    }
    if row.hour.is_none() {
        row.hour = Some(i64::from(ts.hour()));
        report.calendar_fields_filled += 1;
    }
}

fn prefix(desc: &str, len: usize) -> &str {
    let end = desc.char_indices().nth(len).map_or(desc.len(), |(i, _)| i);
    desc[..end].trim()
}

/// Rewrite timestamps, agencies and descriptions in place.
///
/// With `hourly_timestamps` set, every parseable timestamp is rounded down to
/// the hour and rewritten as `YYYY-MM-DD HH:00:00`.
///
/// Rows are grouped by the trimmed leading `prefix_len` characters of their
/// description; the `top_descriptions` most frequent prefixes (ties by
/// prefix) each take the cleaned text of the first description seen with that
/// prefix, and every other row becomes `other_label`. Rows without a
/// description are left for validation to reject.
pub fn normalize(rows: &mut [RawCitation], config: &NormalizeConfig) -> NormalizeReport {
    let mut report = NormalizeReport::default();

    if config.hourly_timestamps {
        for row in rows.iter_mut() {
            bin_hourly(row, &mut report);
        }
    }

    for row in rows.iter_mut() {
        let Some(agency) = row.agency.as_mut() else {
            continue;
        };
        if let Some(full) = config.agency_aliases.get(agency.trim()) {
            *agency = full.clone();
            report.agencies_renamed += 1;
        }
    }

    let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
    let mut first_seen: FxHashMap<&str, &str> = FxHashMap::default();
    for desc in rows.iter().filter_map(|r| r.description.as_deref()) {
        let p = prefix(desc, config.prefix_len);
        *counts.entry(p).or_default() += 1;
        first_seen.entry(p).or_insert(desc);
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    let categories: FxHashMap<String, String> = ranked
        .into_iter()
        .take(config.top_descriptions)
        .map(|(p, _)| (p.to_string(), clean_description(first_seen[p])))
        .collect();
    report.categories = categories.len();

    for row in rows.iter_mut() {
        let Some(desc) = row.description.as_mut() else {
            continue;
        };
        match categories.get(prefix(desc, config.prefix_len)) {
            Some(category) => *desc = category.clone(),
            None => {
                *desc = config.other_label.clone();
                report.descriptions_bucketed += 1;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        timestamps_floored = report.timestamps_floored,
        agencies_renamed = report.agencies_renamed,
        categories = report.categories,
        bucketed = report.descriptions_bucketed,
        "normalized citations"
    );
    report
}
