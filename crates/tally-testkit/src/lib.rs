//! Fixture datasets and temp-file helpers shared by the Tally test suites.

use std::fs;
use std::io;
use std::path::PathBuf;
use tempfile::TempDir;

pub const CSV_HEADER: &str = "timestamp,violation_location_zip,violation_description,dayofweek,hour,issuing_agency,location,fine,longitude,latitude";

/// Eight citations across three zips. Needs the default cleanup to collapse
/// `METER EXPIRED CC` into `METER EXPIRED`, expand `HP`, and rename `HOUSIN`.
///
/// After cleanup: 8 tickets, 558.0 revenue; zips 19102:4, 19103:2, 19104:2;
/// agencies PPA:5, POLICE:2, HOUSING:1; one row has no coordinates.
pub const SAMPLE_CSV: &str = "\
timestamp,violation_location_zip,violation_description,dayofweek,hour,issuing_agency,location,fine,longitude,latitude
2021-03-01 08:00:00,19102,METER EXPIRED CC,0,8,PPA,1500 MARKET ST,26,-75.1652,39.9526
2021-03-01 09:00:00,19102,METER EXPIRED,0,9,PPA,1500 MARKET ST,26,-75.1650,39.9527
2021-03-02 08:00:00,19103,HP RESERVED SPACE,1,8,POLICE,200 WALNUT ST,301,-75.1700,39.9500
2021-03-02 17:00:00,19104,PARKING PROHBITED CC,1,17,PPA,3400 SPRUCE ST,51,-75.1930,39.9510
2021-03-03 12:00:00,19102,METER EXPIRED,2,12,HOUSIN,1500 MARKET ST,26,,
2021-03-04 08:00:00,19103,PARKING PROHBITED,3,8,PPA,200 WALNUT ST,51,-75.1702,39.9501
2021-03-05 09:00:00,19102,STOPPING PROHIBITED,4,9,POLICE,1600 CHESTNUT ST,51,-75.1670,39.9510
2021-03-06 14:00:00,19104,METER EXPIRED,5,14,PPA,3400 SPRUCE ST,26,-75.1931,39.9511
";

/// Five citations: zips 19102, 19102, 19103, 19104, 19102 with fines 25, 50,
/// 25, 100, 25. Already clean.
pub const SCENARIO_JSON: &str = r#"[
  {"timestamp":"2021-05-03 08:00:00","violation_location_zip":19102,"violation_description":"METER EXPIRED","dayofweek":0,"hour":8,"issuing_agency":"PPA","location":"100 MARKET ST","fine":25,"longitude":-75.1601,"latitude":39.9521},
  {"timestamp":"2021-05-03 09:00:00","violation_location_zip":19102,"violation_description":"STOPPING PROHIBITED","dayofweek":0,"hour":9,"issuing_agency":"POLICE","location":"100 MARKET ST","fine":50,"longitude":-75.1602,"latitude":39.9522},
  {"timestamp":"2021-05-04 08:00:00","violation_location_zip":"19103","violation_description":"METER EXPIRED","dayofweek":1,"hour":8,"issuing_agency":"PPA","location":"200 WALNUT ST","fine":25,"longitude":-75.1700,"latitude":39.9500},
  {"timestamp":"2021-05-05 17:00:00","violation_location_zip":19104,"violation_description":"HANDICAP RESERVED SPACE","dayofweek":2,"hour":17,"issuing_agency":"PPA","location":"3400 SPRUCE ST","fine":100,"longitude":-75.1930,"latitude":39.9510},
  {"timestamp":"2021-05-07 12:00:00","violation_location_zip":19102,"violation_description":"METER EXPIRED","dayofweek":4,"hour":12,"issuing_agency":"POLICE","location":"1600 CHESTNUT ST","fine":25}
]"#;

/// Zip boundaries with `CODE` as a number on one feature and a string on the others.
pub const ZIP_GEOJSON: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type":"Feature","properties":{"CODE":19102},"geometry":{"type":"Polygon","coordinates":[[[-75.17,39.95],[-75.16,39.95],[-75.16,39.96],[-75.17,39.95]]]}},
    {"type":"Feature","properties":{"CODE":"19103"},"geometry":{"type":"Polygon","coordinates":[[[-75.18,39.94],[-75.17,39.94],[-75.17,39.95],[-75.18,39.94]]]}},
    {"type":"Feature","properties":{"CODE":"19104"},"geometry":null}
  ]
}"#;

/// A directory that lives as long as the returned guard.
pub fn temp_dir() -> io::Result<TempDir> {
    tempfile::tempdir()
}

/// Write `contents` to `name` inside a fresh temp directory.
pub fn write_temp(name: &str, contents: &str) -> io::Result<(TempDir, PathBuf)> {
    let dir = temp_dir()?;
    let path = dir.path().join(name);
    fs::write(&path, contents)?;
    Ok((dir, path))
}

/// Header plus `rows`, one CSV line each.
pub fn csv_with_rows<'a>(rows: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for row in rows {
        out.push_str(row);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_has_header_and_eight_rows() {
        let mut lines = SAMPLE_CSV.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert_eq!(lines.count(), 8);
    }

    #[test]
    fn write_temp_round_trips() {
        let (_dir, path) = write_temp("rows.csv", "a,b\n").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "a,b\n");
    }
}
