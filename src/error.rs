/// Error type returned when a record cannot be turned into a log line.
///
/// There is no partial-output fallback: either the full payload is produced
/// or one of these variants is returned to the caller.
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("invalid date format: {0:?}")]
    InvalidDateFormat(String),

    #[error("failed to serialize log payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write log line: {0}")]
    Io(#[from] std::io::Error),
}
