//! The external-collaborator shim surface: ML hands finished, validated units of work
//! up to whatever owns scheduling policy and persistence (both out of scope here) via
//! this trait.

use crate::validator::Mission;
use std::net::SocketAddr;

/// Parses the metrics filename grammar `alert_<missionId>_task-<digits>_<iter>.json`,
/// extracting `iter` by splitting on `_` and taking the 4th component minus its
/// `.json` suffix.
pub fn parse_metrics_iter(filename: &str) -> Option<&str> {
    filename.split('_').nth(3).map(|s| s.trim_end_matches(".json"))
}

pub trait MissionCallbacks: Send + Sync {
    /// A rover registered (op `R`). `payload` is whatever inline message accompanied it.
    fn on_register(&self, peer: SocketAddr, rover_id: &str, payload: &[u8]);

    /// A metrics file name arrived (op `M`); the file itself has already been reported
    /// separately via TelemetryStream, this is just the in-band notice.
    fn on_metrics(&self, peer: SocketAddr, rover_id: &str, filename: &str);

    /// A mission request arrived (op `Q`).
    fn on_request(&self, peer: SocketAddr, rover_id: &str, payload: &[u8]);

    /// A progress report arrived (op `P`).
    fn on_progress(&self, peer: SocketAddr, rover_id: &str, payload: &[u8]);

    /// A Task payload (op `T`) passed schema validation.
    fn on_task(&self, peer: SocketAddr, rover_id: &str, mission: &Mission);

    /// A Task payload (op `T`) failed schema validation; `reason` is the validator's
    /// rejection message. The transport has already ACKed the packet.
    fn on_invalid_mission(&self, peer: SocketAddr, rover_id: &str, reason: &str);
}

/// A callbacks implementation that does nothing but is always available, for callers
/// (and tests) that only care about the transport and not about what happens next.
pub struct NoopCallbacks;

impl MissionCallbacks for NoopCallbacks {
    fn on_register(&self, _peer: SocketAddr, _rover_id: &str, _payload: &[u8]) {}
    fn on_metrics(&self, _peer: SocketAddr, _rover_id: &str, _filename: &str) {}
    fn on_request(&self, _peer: SocketAddr, _rover_id: &str, _payload: &[u8]) {}
    fn on_progress(&self, _peer: SocketAddr, _rover_id: &str, _payload: &[u8]) {}
    fn on_task(&self, _peer: SocketAddr, _rover_id: &str, _mission: &Mission) {}
    fn on_invalid_mission(&self, _peer: SocketAddr, _rover_id: &str, _reason: &str) {}
}
