use crate::error::Result;
use crate::normalize::NormalizeConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tally_engine::EngineConfig;

/// Dashboard settings, usually read from a YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    pub engine: EngineConfig,
    /// Rows shown in the hotspot table.
    pub hotspot_rows: usize,
    /// Cleanup applied while loading. `None` loads rows as-is.
    pub normalize: Option<NormalizeConfig>,
    pub map: MapConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            hotspot_rows: 10,
            normalize: None,
            map: MapConfig::default(),
        }
    }
}

/// Initial map view; carried for hosts, unused by the aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapConfig {
    /// `[lat, lng]`
    pub center: [f64; 2],
    pub zoom: u8,
    pub hex_radius: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center: [39.985, -75.165222],
            zoom: 11,
            hex_radius: 12.0,
        }
    }
}

impl DashboardConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        Ok(serde_yaml::from_reader(reader)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_yaml_reader(std::io::BufReader::new(file))
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_engine::{RecomputeStrategy, ReducerVerification};

    #[test]
    fn empty_document_gives_defaults() {
        let cfg = DashboardConfig::from_yaml_str("{}").unwrap();
        assert_eq!(cfg, DashboardConfig::default());
        assert_eq!(cfg.hotspot_rows, 10);
        assert_eq!(cfg.map.zoom, 11);
    }

    #[test]
    fn partial_overrides() {
        let cfg = DashboardConfig::from_yaml_str(
            "hotspot_rows: 5\n\
             engine:\n  strategy: full_rescan\n  verify_reducers: off\n\
             normalize:\n  top_descriptions: 10\n",
        )
        .unwrap();
        assert_eq!(cfg.hotspot_rows, 5);
        assert_eq!(cfg.engine.strategy, RecomputeStrategy::FullRescan);
        assert_eq!(cfg.engine.verify_reducers, ReducerVerification::Off);
        assert_eq!(cfg.engine.max_cascade, 16);
        let normalize = cfg.normalize.unwrap();
        assert_eq!(normalize.top_descriptions, 10);
        assert_eq!(normalize.agency_aliases.len(), 3);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(DashboardConfig::from_yaml_str("hotspots: 3").is_err());
    }

    #[test]
    fn yaml_round_trip() {
        let cfg = DashboardConfig {
            normalize: Some(NormalizeConfig::default()),
            ..Default::default()
        };
        let back = DashboardConfig::from_yaml_str(&cfg.to_yaml().unwrap()).unwrap();
        assert_eq!(back, cfg);
    }
}
