use std::path::PathBuf;
use tally_engine::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    /// Validation and registration failures, including
    /// [`EngineError::InvalidDataset`] for a malformed citation.
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[cfg(feature = "csv")]
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported dataset format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("geojson: {0}")]
    GeoJson(String),

    #[error("unknown chart '{0}'")]
    UnknownChart(String),

    #[error("no data sources were added")]
    NoSources,
}

pub type Result<T> = std::result::Result<T, DashboardError>;
