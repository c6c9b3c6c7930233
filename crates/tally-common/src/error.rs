//! Field-level validation failure shared by every record loader.
//!
//! A [`FieldError`] says *which* field of a raw record was rejected and why;
//! the loader that owns the record adds the record's position when it lifts
//! the failure into its own error type.

use std::{borrow::Cow, error::Error, fmt};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldError {
    pub field: Cow<'static, str>,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<Cow<'static, str>>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// The field was absent (or `null`).
    pub fn missing(field: impl Into<Cow<'static, str>>) -> Self {
        Self::new(field, "missing required field")
    }

    /// The field was present but could not be interpreted.
    pub fn malformed(field: impl Into<Cow<'static, str>>, detail: impl fmt::Display) -> Self {
        Self::new(field, format!("malformed value: {detail}"))
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

impl Error for FieldError {}
