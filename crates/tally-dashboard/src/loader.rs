use crate::backends::{self, CitationSource};
use crate::citation::{Citation, RawCitation};
use crate::error::{DashboardError, Result};
use crate::normalize::{NormalizeConfig, normalize};
use std::path::Path;
use std::time::Instant;
use tally_engine::RecordStore;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoaderStats {
    pub sources_read: usize,
    pub rows_read: usize,
    pub records_loaded: usize,
    pub with_coordinates: usize,
    pub timestamps_floored: usize,
    pub agencies_renamed: usize,
    pub descriptions_bucketed: usize,
    pub read_time_ms: u64,
    pub load_time_ms: u64,
}

/// Reads every added source in order, optionally normalizes the combined
/// rows, and validates them into a [`RecordStore`]. One bad row rejects the
/// whole dataset.
#[derive(Default)]
pub struct DatasetLoader {
    sources: Vec<Box<dyn CitationSource>>,
    normalize: Option<NormalizeConfig>,
    stats: LoaderStats,
}

impl DatasetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_normalize(mut self, config: Option<NormalizeConfig>) -> Self {
        self.normalize = config;
        self
    }

    pub fn add_source(&mut self, source: impl CitationSource + 'static) -> &mut Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn add_path(&mut self, path: &Path) -> Result<&mut Self> {
        let source = backends::open_path(path)?;
        self.sources.push(source);
        Ok(self)
    }

    pub fn stats(&self) -> &LoaderStats {
        &self.stats
    }

    /// Consume the queued sources.
    pub fn load(&mut self) -> Result<RecordStore<Citation>> {
        if self.sources.is_empty() {
            return Err(DashboardError::NoSources);
        }
        let start = Instant::now();

        let mut rows = Vec::new();
        for mut source in self.sources.drain(..) {
            let batch = source.read_rows()?;
            #[cfg(feature = "tracing")]
            tracing::debug!(source = source.name(), rows = batch.len(), "read source");
            self.stats.sources_read += 1;
            self.stats.rows_read += batch.len();
            rows.extend(batch);
        }
        self.stats.read_time_ms += start.elapsed().as_millis() as u64;

        if let Some(config) = &self.normalize {
            let report = normalize(&mut rows, config);
            self.stats.timestamps_floored += report.timestamps_floored;
            self.stats.agencies_renamed += report.agencies_renamed;
            self.stats.descriptions_bucketed += report.descriptions_bucketed;
        }

        let store = RecordStore::try_load(rows, |_, raw: RawCitation| raw.validate())?;
        self.stats.records_loaded += store.len();
        self.stats.with_coordinates += store
            .as_slice()
            .iter()
            .filter(|c| c.position().is_some())
            .count();

        let elapsed_ms = start.elapsed().as_millis() as u64;
        self.stats.load_time_ms = elapsed_ms.max(1);
        #[cfg(feature = "tracing")]
        tracing::info!(
            records = self.stats.records_loaded,
            sources = self.stats.sources_read,
            ms = self.stats.load_time_ms,
            "dataset loaded"
        );
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::JsonSource;
    use tally_engine::EngineError;

    const TWO_ROWS: &str = r#"[
        {"timestamp":"2021-03-04 14:00:00","violation_location_zip":19102,"violation_description":"METER EXPIRED CC",
         "dayofweek":3,"hour":14,"issuing_agency":"HOUSIN","location":"1500 MARKET","fine":26,"longitude":-75.16,"latitude":39.95},
        {"timestamp":"2021-03-05 09:00:00","violation_location_zip":"19103","violation_description":"METER EXPIRED",
         "dayofweek":4,"hour":9,"issuing_agency":"PPA","location":"200 WALNUT","fine":36}
    ]"#;

    #[test]
    fn loads_and_counts() {
        let mut loader = DatasetLoader::new().with_normalize(Some(NormalizeConfig::default()));
        loader.add_source(JsonSource::from_json_str("a.json", TWO_ROWS));
        let store = loader.load().unwrap();
        assert_eq!(store.len(), 2);

        let stats = loader.stats();
        assert_eq!(stats.sources_read, 1);
        assert_eq!(stats.rows_read, 2);
        assert_eq!(stats.records_loaded, 2);
        assert_eq!(stats.with_coordinates, 1);
        assert_eq!(stats.agencies_renamed, 1);

        let first = &store.as_slice()[0];
        assert_eq!(first.agency, "HOUSING");
        assert_eq!(first.description, "METER EXPIRED");
    }

    #[test]
    fn one_bad_row_rejects_the_dataset() {
        let json = r#"[{"timestamp":"2021-03-04 14:00:00"}]"#;
        let mut loader = DatasetLoader::new();
        loader.add_source(JsonSource::from_json_str("bad.json", json));
        let err = loader.load().unwrap_err();
        assert!(matches!(
            err,
            DashboardError::Engine(EngineError::InvalidDataset { index: Some(0), .. })
        ));
    }

    #[test]
    fn empty_input_is_invalid() {
        let mut loader = DatasetLoader::new();
        loader.add_source(JsonSource::from_json_str("empty.json", "[]"));
        assert!(matches!(
            loader.load(),
            Err(DashboardError::Engine(EngineError::InvalidDataset { index: None, .. }))
        ));
        assert!(matches!(DatasetLoader::new().load(), Err(DashboardError::NoSources)));
    }

    #[test]
    fn unknown_extension_is_refused() {
        let mut loader = DatasetLoader::new();
        assert!(matches!(
            loader.add_path(Path::new("citations.parquet")),
            Err(DashboardError::UnsupportedFormat(_))
        ));
    }
}
