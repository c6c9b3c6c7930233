//! Dataset sources. Each produces raw rows; validation happens in the loader.

#[cfg(feature = "csv")]
pub mod csv;
pub mod json;

#[cfg(feature = "csv")]
pub use self::csv::{CsvReadOptions, CsvSource};
pub use self::json::JsonSource;

use crate::citation::RawCitation;
use crate::error::{DashboardError, Result};
use std::path::Path;

pub trait CitationSource {
    /// Short label for stats and log lines (usually the file name).
    fn name(&self) -> &str;

    fn read_rows(&mut self) -> Result<Vec<RawCitation>>;
}

impl<S: CitationSource + ?Sized> CitationSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn read_rows(&mut self) -> Result<Vec<RawCitation>> {
        (**self).read_rows()
    }
}

/// Pick a source by file extension (`.csv` or `.json`).
pub fn open_path(path: &Path) -> Result<Box<dyn CitationSource>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        #[cfg(feature = "csv")]
        Some("csv") => Ok(Box::new(CsvSource::open_path(path)?)),
        Some("json") => Ok(Box::new(JsonSource::open_path(path)?)),
        _ => Err(DashboardError::UnsupportedFormat(path.to_path_buf())),
    }
}

fn label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
