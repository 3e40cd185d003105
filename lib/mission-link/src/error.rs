//! Errors surfaced to callers of the `MissionLink` API. `wire::ParseError` is
//! deliberately not a variant here: malformed datagrams are handled internally and
//! never escape a public call.

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum MlError {
    /// SYN/SYN-ACK/ACK exchange exhausted its retry cap.
    HandshakeFailed,
    /// A Task (`op=T`) payload failed schema validation. The transport layer still
    /// ACKed the packet and ran the session's teardown to completion, so the sender
    /// does not retry and the peer is not left hanging; this error just reports the
    /// outcome back to a caller of `recv` that isn't watching `on_invalid_mission`.
    InvalidMission(String),
    Io(io::Error),
}

impl fmt::Display for MlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlError::HandshakeFailed => write!(f, "handshake failed: retries exhausted"),
            MlError::InvalidMission(reason) => write!(f, "invalid mission payload: {}", reason),
            MlError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for MlError {}

impl From<io::Error> for MlError {
    fn from(err: io::Error) -> MlError {
        MlError::Io(err)
    }
}

pub type MlResult<T> = Result<T, MlError>;
