//! Per-peer RTT/variance EWMA estimator, feeding the adaptive receive timeout.
//! Mirrors the source's `_update_rtt` / `_get_adaptive_timeout` exactly.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

const ALPHA: f64 = 0.875;
const MIN_TIMEOUT: f64 = 1.0;
const MAX_TIMEOUT: f64 = 10.0;
const MAX_SAMPLES: usize = 10;

#[derive(Debug, Clone, Copy)]
struct PeerRtt {
    estimate: f64,
    variance: f64,
    samples_seen: usize,
}

/// Keyed by peer address; created on first observation, lives for the lifetime of the
/// owning `MissionLink` instance, never destroyed early.
pub struct RttEstimator {
    base_timeout: Duration,
    peers: Mutex<HashMap<SocketAddr, PeerRtt>>,
}

impl RttEstimator {
    pub fn new(base_timeout: Duration) -> RttEstimator {
        RttEstimator { base_timeout, peers: Mutex::new(HashMap::new()) }
    }

    /// Feed one RTT sample (seconds) observed for `peer`.
    pub fn observe(&self, peer: SocketAddr, sample_secs: f64) {
        let mut peers = self.peers.lock().unwrap();
        let entry = peers.entry(peer).or_insert(PeerRtt { estimate: sample_secs, variance: 0.0, samples_seen: 0 });

        if entry.samples_seen == 0 {
            entry.estimate = sample_secs;
            entry.variance = 0.0;
        } else {
            let prev_estimate = entry.estimate;
            entry.estimate = ALPHA * entry.estimate + (1.0 - ALPHA) * sample_secs;
            entry.variance = ALPHA * entry.variance + (1.0 - ALPHA) * (sample_secs - prev_estimate).abs();
        }
        entry.samples_seen = entry.samples_seen.saturating_add(1).min(MAX_SAMPLES);
    }

    /// Adaptive timeout for `peer`; `base_timeout` if no sample has ever been observed.
    pub fn timeout(&self, peer: SocketAddr) -> Duration {
        let peers = self.peers.lock().unwrap();
        match peers.get(&peer) {
            Some(rtt) => {
                let secs = (rtt.estimate + 4.0 * rtt.variance + 0.5).clamp(MIN_TIMEOUT, MAX_TIMEOUT);
                Duration::from_secs_f64(secs)
            }
            None => self.base_timeout,
        }
    }
}
