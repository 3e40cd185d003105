//! TelemetryStream: a framed TCP file push used to ship bulk telemetry/metrics files
//! alongside the MissionLink control channel. No retransmission logic — TCP's own
//! reliability covers that.

pub mod client;
pub mod codec;
pub mod error;
pub mod server;

pub use client::send_file;
pub use error::{TsError, TsResult};
pub use server::TsServer;
