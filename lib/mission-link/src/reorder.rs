//! Per-peer bounded reorder buffer absorbing jitter-induced out-of-order datagrams.
//! Mirrors the source's `_add_to_reorder_buffer` / `_get_from_reorder_buffer` /
//! `_cleanup_reorder_buffer`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry {
    payload: Vec<u8>,
    arrived: Instant,
}

struct PeerBuffer {
    entries: HashMap<u32, Entry>,
}

pub struct ReorderBuffer {
    capacity: usize,
    max_age: Duration,
    peers: Mutex<HashMap<SocketAddr, PeerBuffer>>,
}

impl ReorderBuffer {
    pub fn new(capacity: usize, max_age: Duration) -> ReorderBuffer {
        ReorderBuffer { capacity, max_age, peers: Mutex::new(HashMap::new()) }
    }

    /// Buffers `payload` under `seq` for `peer`. Evicts the oldest-arrived entry first
    /// if the peer's buffer is already at capacity.
    pub fn put(&self, peer: SocketAddr, seq: u32, payload: Vec<u8>) {
        let mut peers = self.peers.lock().unwrap();
        let buf = peers.entry(peer).or_insert_with(|| PeerBuffer { entries: HashMap::new() });

        if buf.entries.len() >= self.capacity && !buf.entries.contains_key(&seq) {
            if let Some(&oldest_seq) =
                buf.entries.iter().min_by_key(|(_, e)| e.arrived).map(|(s, _)| s)
            {
                buf.entries.remove(&oldest_seq);
            }
        }

        buf.entries.insert(seq, Entry { payload, arrived: Instant::now() });
    }

    /// Removes and returns the entry for `expected_seq`, if present.
    pub fn take(&self, peer: SocketAddr, expected_seq: u32) -> Option<Vec<u8>> {
        let mut peers = self.peers.lock().unwrap();
        peers.get_mut(&peer)?.entries.remove(&expected_seq).map(|e| e.payload)
    }

    /// Evicts entries older than `max_age` or with `seq < current_seq`.
    pub fn cleanup(&self, peer: SocketAddr, current_seq: u32) {
        let mut peers = self.peers.lock().unwrap();
        if let Some(buf) = peers.get_mut(&peer) {
            let max_age = self.max_age;
            buf.entries.retain(|&seq, entry| seq >= current_seq && entry.arrived.elapsed() <= max_age);
        }
    }

    pub fn len(&self, peer: SocketAddr) -> usize {
        self.peers.lock().unwrap().get(&peer).map(|b| b.entries.len()).unwrap_or(0)
    }

    /// Drops all buffered entries for `peer`. Called at the start of every new session
    /// to the same peer, since the fixed initial sequence number (100) means a stale
    /// entry left over from a prior, already-closed session could otherwise be mistaken
    /// for one belonging to the new session.
    pub fn clear(&self, peer: SocketAddr) {
        self.peers.lock().unwrap().remove(&peer);
    }
}
