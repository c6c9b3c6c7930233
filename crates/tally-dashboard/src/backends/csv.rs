use super::{CitationSource, label};
use crate::citation::RawCitation;
use crate::error::Result;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CsvReadOptions {
    /// Field delimiter as a single byte. Use `b'\t'` for TSV.
    pub delimiter: u8,
    /// Trim whitespace around headers and fields.
    pub trim: bool,
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            trim: true,
        }
    }
}

/// CSV with a header row naming the dataset columns. Column order is free and
/// unknown columns are ignored.
pub struct CsvSource {
    name: String,
    reader: Box<dyn Read>,
    options: CsvReadOptions,
}

impl CsvSource {
    pub fn open_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(
            label(path),
            BufReader::new(file),
            CsvReadOptions::default(),
        ))
    }

    pub fn from_reader(name: impl Into<String>, reader: impl Read + 'static, options: CsvReadOptions) -> Self {
        Self {
            name: name.into(),
            reader: Box::new(reader),
            options,
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::from_reader(name, std::io::Cursor::new(bytes), CsvReadOptions::default())
    }
}

impl CitationSource for CsvSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_rows(&mut self) -> Result<Vec<RawCitation>> {
        let mut rb = csv::ReaderBuilder::new();
        rb.delimiter(self.options.delimiter).has_headers(true);
        if self.options.trim {
            rb.trim(csv::Trim::All);
        }
        let mut reader = rb.from_reader(&mut self.reader);
        let mut rows = Vec::new();
        for row in reader.deserialize::<RawCitation>() {
            rows.push(row?);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citation::ZipValue;

    #[test]
    fn columns_are_matched_by_header() {
        let text = "fine,violation_location_zip,timestamp,hour,dayofweek,issuing_agency,violation_description,location,longitude,latitude\n\
                    26,19102,2021-03-04 14:00:00,14,3,PPA,METER EXPIRED,1500 MARKET,,\n";
        let mut src = CsvSource::from_bytes("inline", text.as_bytes().to_vec());
        let rows = src.read_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fine, Some(26.0));
        assert_eq!(rows[0].zip, Some(ZipValue::Int(19102)));
        assert_eq!(rows[0].longitude, None);
        assert_eq!(rows[0].agency.as_deref(), Some("PPA"));
    }

    #[test]
    fn tab_delimited_input() {
        let text = "timestamp\tviolation_location_zip\n2021-03-04 14:00:00\t19103\n";
        let mut src = CsvSource::from_reader(
            "tsv",
            std::io::Cursor::new(text.as_bytes().to_vec()),
            CsvReadOptions {
                delimiter: b'\t',
                ..Default::default()
            },
        );
        let rows = src.read_rows().unwrap();
        assert_eq!(rows[0].timestamp.as_deref(), Some("2021-03-04 14:00:00"));
        assert_eq!(rows[0].fine, None);
    }
}
