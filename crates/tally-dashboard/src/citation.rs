//! Citation records: the loose input shape and the validated record.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tally_common::FieldError;
use tally_engine::GeoPoint;

/// A validated parking citation. Field names on the wire match the dataset
/// columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    #[serde(rename = "violation_location_zip")]
    pub zip: String,
    #[serde(rename = "violation_description")]
    pub description: String,
    /// Monday = 0.
    pub dayofweek: u8,
    pub hour: u8,
    #[serde(rename = "issuing_agency")]
    pub agency: String,
    /// Street-block identifier.
    pub location: String,
    pub fine: f64,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub latitude: Option<f64>,
}

impl Citation {
    /// Position for the map overlay, if both coordinates are usable.
    pub fn position(&self) -> Option<GeoPoint> {
        GeoPoint::checked(self.longitude?, self.latitude?)
    }
}

/// Zip codes arrive as text in some exports and as numbers in others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZipValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ZipValue {
    pub fn normalized(&self) -> Option<String> {
        match self {
            ZipValue::Int(i) if *i >= 0 => Some(i.to_string()),
            ZipValue::Float(f) if f.is_finite() && *f >= 0.0 && f.fract() == 0.0 => {
                Some(format!("{}", *f as i64))
            }
            ZipValue::Text(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            _ => None,
        }
    }
}

impl From<&str> for ZipValue {
    fn from(s: &str) -> Self {
        ZipValue::Text(s.to_string())
    }
}

/// One row as read from a source, before validation. Every field is optional
/// so that a missing column is reported as a [`FieldError`] instead of a
/// parse failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCitation {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, rename = "violation_location_zip")]
    pub zip: Option<ZipValue>,
    #[serde(default, rename = "violation_description")]
    pub description: Option<String>,
    #[serde(default)]
    pub dayofweek: Option<i64>,
    #[serde(default)]
    pub hour: Option<i64>,
    #[serde(default, rename = "issuing_agency")]
    pub agency: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub fine: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub latitude: Option<f64>,
}

impl RawCitation {
    pub fn validate(self) -> Result<Citation, FieldError> {
        let timestamp = parse_timestamp(required("timestamp", self.timestamp)?.as_str())?;
        let zip = required("violation_location_zip", self.zip)?;
        let zip = zip
            .normalized()
            .ok_or_else(|| FieldError::malformed("violation_location_zip", format!("{zip:?}")))?;
        let fine = required("fine", self.fine)?;
        if !fine.is_finite() || fine < 0.0 {
            return Err(FieldError::malformed("fine", format!("{fine} is not a non-negative amount")));
        }

        Ok(Citation {
            timestamp,
            zip,
            description: text("violation_description", self.description)?,
            dayofweek: bounded("dayofweek", self.dayofweek, 6)?,
            hour: bounded("hour", self.hour, 23)?,
            agency: text("issuing_agency", self.agency)?,
            location: text("location", self.location)?,
            fine,
            longitude: self.longitude,
            latitude: self.latitude,
        })
    }
}

fn required<T>(field: &'static str, value: Option<T>) -> Result<T, FieldError> {
    value.ok_or_else(|| FieldError::missing(field))
}

fn text(field: &'static str, value: Option<String>) -> Result<String, FieldError> {
    let value = required(field, value)?;
    Ok(value.trim().to_string())
}

fn bounded(field: &'static str, value: Option<i64>, max: u8) -> Result<u8, FieldError> {
    let v = required(field, value)?;
    u8::try_from(v)
        .ok()
        .filter(|v| *v <= max)
        .ok_or_else(|| FieldError::malformed(field, format!("{v} is outside 0..={max}")))
}

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Accepts `YYYY-MM-DD HH:MM:SS`, the same with a `T` separator, or RFC 3339.
/// An RFC 3339 offset is dropped; the wall-clock time is kept.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, FieldError> {
    let s = s.trim();
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.naive_local())
        .map_err(|_| FieldError::malformed("timestamp", format!("'{s}' is not a recognised timestamp")))
}

mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&ts.format("%Y-%m-%d %H:%M:%S"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}
