//! Tunable protocol knobs. All defaults match the source implementation.

use serde_derive::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Max UDP datagram size, header included.
    pub buffer_size: usize,
    /// Fixed timeout used before any RTT sample exists for a peer.
    pub base_timeout_secs: f64,
    /// Hard retransmission cap for data chunks and FIN packets.
    pub data_retx_cap: u32,
    /// Hard retransmission cap for handshake packets and the teardown ACK-of-FIN wait.
    pub handshake_retx_cap: u32,
    /// Max entries held in a peer's reorder buffer.
    pub reorder_buffer_size: usize,
    /// Max age of a reorder buffer entry before eviction.
    pub reorder_max_wait_secs: f64,
    /// Peek timeout used by the accept loop to avoid starving in-session reads.
    pub accept_peek_timeout_millis: u64,
}

impl Limits {
    pub fn base_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.base_timeout_secs)
    }

    pub fn reorder_max_wait(&self) -> Duration {
        Duration::from_secs_f64(self.reorder_max_wait_secs)
    }

    pub fn accept_peek_timeout(&self) -> Duration {
        Duration::from_millis(self.accept_peek_timeout_millis)
    }
}

impl Default for Limits {
    fn default() -> Limits {
        Limits {
            buffer_size: 1024,
            base_timeout_secs: 2.0,
            data_retx_cap: 20,
            handshake_retx_cap: 5,
            reorder_buffer_size: 10,
            reorder_max_wait_secs: 5.0,
            accept_peek_timeout_millis: 10,
        }
    }
}
