//! Immutable record storage with contiguous ordinal ids.

use crate::error::{EngineError, Result};
use tally_common::{FieldError, RecordId};

#[derive(Debug, Clone)]
pub struct RecordStore<R> {
    records: Vec<R>,
}

impl<R> RecordStore<R> {
    /// Take ownership of already-validated records. Ids follow input order.
    pub fn load<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = R>,
    {
        let records: Vec<R> = records.into_iter().collect();
        Self::check_size(records.len())?;
        Ok(Self { records })
    }

    /// Convert raw input into records, failing on the first bad one.
    ///
    /// The error carries the offending record's position in `raw`.
    pub fn try_load<Raw, I, F>(raw: I, mut convert: F) -> Result<Self>
    where
        I: IntoIterator<Item = Raw>,
        F: FnMut(RecordId, Raw) -> std::result::Result<R, FieldError>,
    {
        let iter = raw.into_iter();
        let mut records = Vec::with_capacity(iter.size_hint().0);
        for (index, item) in iter.enumerate() {
            let id = u32::try_from(index).map_err(|_| too_large(index))?;
            let record =
                convert(RecordId::new(id), item).map_err(|e| EngineError::invalid_record(index, e))?;
            records.push(record);
        }
        Self::check_size(records.len())?;
        Ok(Self { records })
    }

    fn check_size(len: usize) -> Result<()> {
        if len == 0 {
            return Err(EngineError::empty_dataset());
        }
        if u32::try_from(len).is_err() {
            return Err(too_large(len));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<&R> {
        self.records.get(id.index())
    }

    /// All records with their ids, in store order. Call again to restart.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (RecordId, &R)> + '_ {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| (RecordId::new(i as u32), r))
    }

    pub fn ids(&self) -> impl ExactSizeIterator<Item = RecordId> + '_ {
        (0..self.records.len() as u32).map(RecordId::new)
    }

    pub fn as_slice(&self) -> &[R] {
        &self.records
    }

    pub(crate) fn record(&self, id: RecordId) -> &R {
        &self.records[id.index()]
    }
}

fn too_large(len: usize) -> EngineError {
    EngineError::InvalidDataset {
        index: None,
        field: None,
        reason: format!("{len} records exceed the u32 id space"),
    }
}
