use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable ordinal of a record inside a loaded dataset.
///
/// Ids are assigned contiguously from zero in input order and never change for
/// the lifetime of the store that issued them.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct RecordId(u32);

impl RecordId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for RecordId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
