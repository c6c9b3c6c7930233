use super::{CitationSource, label};
use crate::citation::RawCitation;
use crate::error::Result;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// A JSON array of citation objects, the shape of the monthly exports.
pub struct JsonSource {
    name: String,
    reader: Box<dyn Read>,
}

impl JsonSource {
    pub fn open_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(label(path), BufReader::new(file)))
    }

    pub fn from_reader(name: impl Into<String>, reader: impl Read + 'static) -> Self {
        Self {
            name: name.into(),
            reader: Box::new(reader),
        }
    }

    pub fn from_json_str(name: impl Into<String>, json: &str) -> Self {
        Self::from_reader(name, std::io::Cursor::new(json.as_bytes().to_vec()))
    }
}

impl CitationSource for JsonSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_rows(&mut self) -> Result<Vec<RawCitation>> {
        Ok(serde_json::from_reader(&mut self.reader)?)
    }
}
