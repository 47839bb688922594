use std::result::Result as StdResult;

use thiserror::Error;

/// Errors raised while validating an incoming trial record, before any
/// database write is attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("malformed nct_id: {0:?} (expected NCT followed by 8 digits)")]
    InvalidNctId(String),
}

pub type RecordResult<T> = StdResult<T, RecordError>;
