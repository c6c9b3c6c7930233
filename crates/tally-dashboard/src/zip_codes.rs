//! Zip-code boundary features, indexed by their `CODE` property.
//!
//! Only the lookup lives here. Deciding which polygon contains a point is
//! left to the map host; it hands back the clicked feature's code.

use crate::citation::ZipValue;
use crate::error::{DashboardError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    properties: BTreeMap<String, Value>,
    #[serde(default)]
    geometry: Value,
}

#[derive(Debug, Clone, Default)]
pub struct ZipBoundaries {
    geometries: BTreeMap<String, Value>,
}

impl ZipBoundaries {
    pub fn from_geojson_str(text: &str) -> Result<Self> {
        Self::from_collection(serde_json::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_collection(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    fn from_collection(fc: FeatureCollection) -> Result<Self> {
        if fc.kind != "FeatureCollection" {
            return Err(DashboardError::GeoJson(format!(
                "expected a FeatureCollection, found '{}'",
                fc.kind
            )));
        }
        let mut geometries = BTreeMap::new();
        for (i, feature) in fc.features.into_iter().enumerate() {
            let code = feature
                .properties
                .get("CODE")
                .cloned()
                .and_then(|v| serde_json::from_value::<ZipValue>(v).ok())
                .and_then(|z| z.normalized())
                .ok_or_else(|| DashboardError::GeoJson(format!("feature {i} has no usable CODE")))?;
            geometries.insert(code, feature.geometry);
        }
        Ok(Self { geometries })
    }

    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> + '_ {
        self.geometries.keys().map(String::as_str)
    }

    /// Normalized zip code for a clicked feature's `CODE`, if it is known.
    pub fn resolve(&self, code: &ZipValue) -> Option<&str> {
        let code = code.normalized()?;
        self.geometries.get_key_value(&code).map(|(k, _)| k.as_str())
    }

    pub fn geometry(&self, code: &str) -> Option<&Value> {
        self.geometries.get(code)
    }
}
