//! Parking-citation dashboard built on [`tally_engine`].
//!
//! Loading goes CSV/JSON → [`RawCitation`] → optional [`normalize`] pass →
//! validated [`Citation`]s in a [`tally_engine::RecordStore`]. A [`Dashboard`]
//! then registers one dimension and self-excluding count group per chart and
//! answers every view query from the live cross-filter.

pub mod backends;
pub mod citation;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod zip_codes;

pub use backends::CitationSource;
#[cfg(feature = "csv")]
pub use backends::csv::{CsvReadOptions, CsvSource};
pub use backends::json::JsonSource;
pub use citation::{Citation, RawCitation, ZipValue};
pub use config::{DashboardConfig, MapConfig};
pub use dashboard::{Chart, DAY_LABELS, Dashboard, HeatCell, Hotspot, Row, TimeBin, Totals, dims};
pub use error::{DashboardError, Result};
pub use loader::{DatasetLoader, LoaderStats};
pub use normalize::{NormalizeConfig, NormalizeReport, normalize};
pub use zip_codes::ZipBoundaries;

pub use tally_engine as engine;
