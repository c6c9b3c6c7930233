use crate::coordinator::InteractionPhase;
use tally_common::{FieldError, RecordId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// Empty input, or a record whose required field is missing or malformed.
    #[error("invalid dataset: {}", describe_invalid(.index, .field, .reason))]
    InvalidDataset {
        index: Option<usize>,
        field: Option<String>,
        reason: String,
    },

    #[error("dimension '{dimension}' produced no usable key for record {record}")]
    DimensionKeyError { dimension: String, record: RecordId },

    #[error("dimension '{0}' is already registered")]
    DuplicateDimension(String),

    #[error("group '{0}' is already registered")]
    DuplicateGroup(String),

    #[error("unknown dimension '{0}'")]
    UnknownDimension(String),

    #[error("unknown group '{0}'")]
    UnknownGroup(String),

    #[error("group '{0}' was accessed through a handle of the wrong kind")]
    GroupTypeMismatch(String),

    #[error("reducer for group '{group}' failed on record {record}: {message}")]
    Reduce {
        group: String,
        record: RecordId,
        message: String,
    },

    #[error("group '{group}' is stale: {reason}")]
    StaleGroup { group: String, reason: String },

    #[error("interaction rejected: coordinator is {phase:?}")]
    Busy { phase: InteractionPhase },
}

fn describe_invalid(index: &Option<usize>, field: &Option<String>, reason: &str) -> String {
    match (index, field) {
        (Some(i), Some(f)) => format!("record {i}: {f}: {reason}"),
        (Some(i), None) => format!("record {i}: {reason}"),
        (None, Some(f)) => format!("{f}: {reason}"),
        (None, None) => reason.to_string(),
    }
}

impl EngineError {
    pub fn empty_dataset() -> Self {
        EngineError::InvalidDataset {
            index: None,
            field: None,
            reason: "dataset contains no records".to_string(),
        }
    }

    /// Lift a per-field failure to a dataset error carrying the record's input position.
    pub fn invalid_record(index: usize, err: FieldError) -> Self {
        EngineError::InvalidDataset {
            index: Some(index),
            field: Some(err.field.into_owned()),
            reason: err.reason,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
