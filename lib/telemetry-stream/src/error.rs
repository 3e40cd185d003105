use std::fmt;
use std::io;

#[derive(Debug)]
pub enum TsError {
    /// The 4-digit length prefix wasn't ASCII digits, or the filename was not valid UTF-8.
    Framing,
    Io(io::Error),
}

impl fmt::Display for TsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TsError::Framing => write!(f, "malformed TelemetryStream frame"),
            TsError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for TsError {}

impl From<io::Error> for TsError {
    fn from(err: io::Error) -> TsError {
        TsError::Io(err)
    }
}

pub type TsResult<T> = Result<T, TsError>;
