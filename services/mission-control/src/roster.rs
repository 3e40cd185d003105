//! The rover roster: Mother Ship's in-memory record of who has registered and what it has
//! last heard from them. Grounded in the original `NMS_Server`'s client-address table,
//! generalized to a `MissionCallbacks` implementation so `mission-link` can stay ignorant
//! of Mother Ship's bookkeeping.

use chrono::{DateTime, Utc};
use groundlink::logging::{self, Logger};
use hashbrown::HashMap;
use mission_link::{Mission, MissionCallbacks};
use serde_derive::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoverRecord {
    pub addr: SocketAddr,
    pub registered_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

pub struct RosterCallbacks {
    rovers: Mutex<HashMap<String, RoverRecord>>,
    log: Logger,
}

impl RosterCallbacks {
    pub fn new(log: Logger) -> RosterCallbacks {
        RosterCallbacks { rovers: Mutex::new(HashMap::new()), log }
    }

    pub fn snapshot(&self) -> Vec<(String, RoverRecord)> {
        self.rovers.lock().unwrap().iter().map(|(id, rec)| (id.clone(), rec.clone())).collect()
    }

    fn touch(&self, peer: SocketAddr, rover_id: &str) {
        let now = Utc::now();
        let mut rovers = self.rovers.lock().unwrap();
        rovers
            .entry(rover_id.to_string())
            .and_modify(|rec| {
                rec.addr = peer;
                rec.last_seen = now;
            })
            .or_insert_with(|| RoverRecord { addr: peer, registered_at: now, last_seen: now });
    }
}

impl MissionCallbacks for RosterCallbacks {
    fn on_register(&self, peer: SocketAddr, rover_id: &str, _payload: &[u8]) {
        self.touch(peer, rover_id);
        logging::info!(self.log, "rover registered"; "rover_id" => rover_id, "peer" => peer.to_string());
    }

    fn on_metrics(&self, peer: SocketAddr, rover_id: &str, filename: &str) {
        self.touch(peer, rover_id);
        logging::debug!(self.log, "metrics filename received"; "rover_id" => rover_id, "filename" => filename);
    }

    fn on_request(&self, peer: SocketAddr, rover_id: &str, _payload: &[u8]) {
        self.touch(peer, rover_id);
        logging::debug!(self.log, "mission request received"; "rover_id" => rover_id);
    }

    fn on_progress(&self, peer: SocketAddr, rover_id: &str, _payload: &[u8]) {
        self.touch(peer, rover_id);
        logging::debug!(self.log, "progress report received"; "rover_id" => rover_id);
    }

    fn on_task(&self, peer: SocketAddr, rover_id: &str, mission: &Mission) {
        self.touch(peer, rover_id);
        logging::info!(self.log, "task payload validated"; "rover_id" => rover_id, "mission_id" => &mission.mission_id, "task" => &mission.task);
    }

    fn on_invalid_mission(&self, peer: SocketAddr, rover_id: &str, reason: &str) {
        self.touch(peer, rover_id);
        logging::warn!(self.log, "task payload rejected"; "rover_id" => rover_id, "reason" => reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groundlink::logging;

    fn peer() -> SocketAddr {
        "127.0.0.1:9100".parse().unwrap()
    }

    #[test]
    fn registering_adds_a_roster_entry() {
        let roster = RosterCallbacks::new(logging::init_default());
        roster.on_register(peer(), "rover-1", b"hello");
        let snapshot = roster.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, "rover-1");
    }

    #[test]
    fn repeated_callbacks_update_last_seen_without_duplicating() {
        let roster = RosterCallbacks::new(logging::init_default());
        roster.on_register(peer(), "rover-1", b"hello");
        roster.on_progress(peer(), "rover-1", b"50%");
        assert_eq!(roster.snapshot().len(), 1);
    }
}
