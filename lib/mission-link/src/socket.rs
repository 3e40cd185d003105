//! A `UdpSocket` shared between one accept loop and any number of active sessions.
//!
//! Exactly one `recvfrom` may be in flight at a time (enforced by `lock`), matching the
//! source's single-socket-per-instance model. The accept loop only ever consumes `S`
//! packets off the wire; anything else it reads is filed into the originating peer's
//! spillover inbox rather than dropped, so a session's own read picks it up instead.
//! This is the redesign adopted over the source's drop-on-mismatch behavior.

use crate::wire::{Flag, Packet, WireCodec};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Mutex;
use std::time::Duration;

pub struct SharedSocket {
    socket: UdpSocket,
    lock: Mutex<()>,
    spillover: Mutex<HashMap<SocketAddr, VecDeque<Packet>>>,
    codec: WireCodec,
}

impl SharedSocket {
    pub fn bind(addr: SocketAddr, buffer_size: usize) -> io::Result<SharedSocket> {
        let socket = UdpSocket::bind(addr)?;
        Ok(SharedSocket {
            socket,
            lock: Mutex::new(()),
            spillover: Mutex::new(HashMap::new()),
            codec: WireCodec::new(buffer_size),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn max_payload(&self) -> usize {
        self.codec.max_payload()
    }

    pub fn send_to(&self, peer: SocketAddr, packet: &Packet) -> io::Result<()> {
        let bytes = self.codec.encode(packet);
        self.socket.send_to(&bytes, peer)?;
        Ok(())
    }

    fn timed_recv(&self, timeout: Duration) -> io::Result<Option<(Packet, SocketAddr)>> {
        let _guard = self.lock.lock().unwrap();
        self.socket.set_read_timeout(Some(timeout))?;
        let mut buf = vec![0u8; self.codec.buffer_size];
        match self.socket.recv_from(&mut buf) {
            Ok((n, src)) => match self.codec.decode(&buf[..n]) {
                Ok(packet) => Ok(Some((packet, src))),
                Err(_) => Ok(None),
            },
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn stash(&self, src: SocketAddr, packet: Packet) {
        self.spillover.lock().unwrap().entry(src).or_insert_with(VecDeque::new).push_back(packet);
    }

    /// One short-timeout read for the accept loop. Returns a SYN and its source if that's
    /// what arrived; any other packet is stashed under its source's spillover inbox.
    pub fn accept_peek(&self, timeout: Duration) -> io::Result<Option<(Packet, SocketAddr)>> {
        match self.timed_recv(timeout)? {
            Some((packet, src)) if packet.flag == Flag::Syn => Ok(Some((packet, src))),
            Some((packet, src)) => {
                self.stash(src, packet);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Used by an in-flight session waiting on `peer`. Drains that peer's spillover inbox
    /// first; only falls through to a live read if it's empty. A packet read from a
    /// different source than `peer` is stashed rather than dropped.
    pub fn recv_for_session(&self, peer: SocketAddr, timeout: Duration) -> io::Result<Option<Packet>> {
        if let Some(packet) = self.spillover.lock().unwrap().get_mut(&peer).and_then(|q| q.pop_front()) {
            return Ok(Some(packet));
        }
        match self.timed_recv(timeout)? {
            Some((packet, src)) if src == peer => Ok(Some(packet)),
            Some((packet, src)) => {
                self.stash(src, packet);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Drops any packets queued for `peer`. Called at the start of every new session to
    /// the same peer: the fixed initial sequence number (100) means a stray leftover from
    /// a prior, already-closed session could otherwise be mistaken for part of a new one.
    pub fn clear_spillover(&self, peer: SocketAddr) {
        self.spillover.lock().unwrap().remove(&peer);
    }
}
