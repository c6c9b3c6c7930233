use std::fmt;
use tally_common::RecordId;

/// Non-fatal findings the coordinator keeps for the host to inspect.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// `remove(add(acc, r), r)` did not give back `acc`.
    ReduceInvariantViolation {
        group: String,
        record: RecordId,
        detail: String,
    },
    /// A filter requested by a listener was not applied.
    DroppedRequest { dimension: String, reason: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ReduceInvariantViolation {
                group,
                record,
                detail,
            } => write!(
                f,
                "group '{group}': remove does not invert add for record {record}: {detail}"
            ),
            Diagnostic::DroppedRequest { dimension, reason } => {
                write!(f, "dropped filter request on '{dimension}': {reason}")
            }
        }
    }
}
