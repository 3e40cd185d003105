//! End-to-end sessions over real `UdpSocket` pairs, relayed through a small lossy-link
//! harness that can drop, duplicate, delay and reorder packets by sequence number. This
//! exercises retransmission, the reorder buffer and adaptive timeouts the way a unit
//! test against the in-process types cannot.

use groundlink::logging;
use mission_link::wire::{Flag, Packet, WireCodec};
use mission_link::{Limits, MissionLink, MlError, NoopCallbacks, Op, Payload, ReceivedBody};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    ClientToServer,
    ServerToClient,
}

/// A UDP relay sitting between a client and `server_addr`. The client is told to send to
/// the relay's address instead of the server's; the relay learns the client's real
/// address off the first packet it forwards. `mutate` decides, per packet, what actually
/// goes out the other side — zero, one, or several packets, in whatever order.
struct LossyLink {
    relay_addr: SocketAddr,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl LossyLink {
    /// `mutate` runs only inside the relay's own thread, so it can hold whatever mutable
    /// state it needs (a one-shot flag, a held-back packet for a reorder) as a plain
    /// captured variable, no synchronization required.
    fn spawn(server_addr: SocketAddr, mut mutate: impl FnMut(Direction, Packet) -> Vec<Packet> + Send + 'static) -> LossyLink {
        let relay = UdpSocket::bind("127.0.0.1:0").unwrap();
        relay.set_read_timeout(Some(Duration::from_millis(20))).unwrap();
        let relay_addr = relay.local_addr().unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = stop.clone();
        let codec = WireCodec::new(65536);

        let handle = thread::spawn(move || {
            let mut client_addr: Option<SocketAddr> = None;
            let mut buf = vec![0u8; 65536];
            while !stop_clone.load(Ordering::Relaxed) {
                let (n, src) = match relay.recv_from(&mut buf) {
                    Ok(pair) => pair,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => continue,
                    Err(_) => break,
                };
                let packet = match codec.decode(&buf[..n]) {
                    Ok(p) => p,
                    Err(_) => continue,
                };

                let (direction, dest) = if src == server_addr {
                    match client_addr {
                        Some(addr) => (Direction::ServerToClient, addr),
                        None => continue,
                    }
                } else {
                    client_addr = Some(src);
                    (Direction::ClientToServer, server_addr)
                };

                for out in mutate(direction, packet) {
                    let _ = relay.send_to(&codec.encode(&out), dest);
                }
            }
        });

        LossyLink { relay_addr, stop, handle: Some(handle) }
    }

    fn relay_addr(&self) -> SocketAddr {
        self.relay_addr
    }
}

impl Drop for LossyLink {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// A bare wire-level client that speaks the ML handshake/data/teardown packets directly,
/// bypassing `MissionLink::send`'s stop-and-wait pacing. Used only to manufacture
/// scenarios a compliant sender can never produce on its own — like two distinct data
/// chunks racing on the wire, which stop-and-wait rules out since chunk N+1 is never
/// sent before chunk N is acked.
struct RawClient {
    socket: UdpSocket,
    codec: WireCodec,
    server_addr: SocketAddr,
}

impl RawClient {
    fn connect(server_addr: SocketAddr) -> RawClient {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_millis(50))).unwrap();
        RawClient { socket, codec: WireCodec::new(65536), server_addr }
    }

    fn send(&self, packet: &Packet) {
        self.socket.send_to(&self.codec.encode(packet), self.server_addr).unwrap();
    }

    fn recv_timeout(&self) -> Option<Packet> {
        let mut buf = vec![0u8; 65536];
        match self.socket.recv_from(&mut buf) {
            Ok((n, _)) => self.codec.decode(&buf[..n]).ok(),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => None,
            Err(e) => panic!("raw client recv failed: {}", e),
        }
    }

    fn expect(&self) -> Packet {
        for _ in 0..50 {
            if let Some(packet) = self.recv_timeout() {
                return packet;
            }
        }
        panic!("timed out waiting for a reply");
    }

    fn handshake(&self, rover_id: &str) -> u32 {
        self.send(&Packet::control(Flag::Syn, rover_id, mission_link::INITIAL_SEQ, 0));
        let synack = self.expect();
        assert_eq!(synack.flag, Flag::SynAck);
        self.send(&Packet::control(Flag::Ack, rover_id, mission_link::INITIAL_SEQ, mission_link::INITIAL_SEQ));
        mission_link::INITIAL_SEQ + 1
    }

    /// Sends a chunk and blocks until its matching ack, the way a real stop-and-wait
    /// sender would.
    fn send_and_await_ack(&self, mission_id: &str, op: Option<Op>, seq: u32, payload: Vec<u8>) {
        self.send(&Packet::data(Flag::Data, mission_id, seq, 0, op, payload));
        loop {
            let reply = self.expect();
            if reply.flag == Flag::Ack && reply.ack == seq {
                return;
            }
        }
    }

    /// Sends a chunk without waiting for its ack, so a later chunk can be sent ahead of
    /// it — the one thing a compliant sender never does.
    fn send_no_wait(&self, mission_id: &str, op: Option<Op>, seq: u32, payload: Vec<u8>) {
        self.send(&Packet::data(Flag::Data, mission_id, seq, 0, op, payload));
    }

    fn teardown(&self, mission_id: &str, fin_seq: u32) {
        self.send(&Packet::control(Flag::Fin, mission_id, fin_seq, 0));
        let mut ack_seen = false;
        let mut peer_fin_seen = false;
        for _ in 0..40 {
            if ack_seen && peer_fin_seen {
                return;
            }
            let reply = match self.recv_timeout() {
                Some(p) => p,
                None => continue,
            };
            if reply.mission_id != mission_id {
                continue;
            }
            if reply.flag == Flag::Ack && reply.ack == fin_seq {
                ack_seen = true;
            }
            if reply.flag == Flag::Fin {
                self.send(&Packet::control(Flag::Ack, mission_id, fin_seq, reply.seq));
                peer_fin_seen = true;
            }
        }
        panic!("teardown did not complete");
    }
}

fn fast_limits() -> Limits {
    Limits { base_timeout_secs: 0.15, accept_peek_timeout_millis: 5, ..Limits::default() }
}

fn link(store_dir: &std::path::Path, limits: Limits) -> MissionLink {
    MissionLink::new("127.0.0.1:0".parse().unwrap(), store_dir.to_path_buf(), limits, logging::init_default()).unwrap()
}

/// S2 — a single ACK is dropped in the server-to-client direction. The client must
/// retransmit the unacked data chunk, and the receiver must deliver the payload exactly
/// once despite the resend.
#[test]
fn dropped_ack_triggers_retransmission_without_duplicating_payload() {
    let dir = tempfile::tempdir().unwrap();
    let server = Arc::new(link(dir.path(), fast_limits()));
    let client = link(dir.path(), fast_limits());
    let server_addr = server.local_addr().unwrap();

    let mut dropped_once = false;
    let relay = LossyLink::spawn(server_addr, move |direction, packet| {
        if direction == Direction::ServerToClient && packet.flag == Flag::Ack && packet.ack == 101 && !dropped_once {
            dropped_once = true;
            return Vec::new();
        }
        vec![packet]
    });

    let server_clone = server.clone();
    let handle = thread::spawn(move || server_clone.recv(&NoopCallbacks).unwrap());

    client.send(relay.relay_addr(), Some(Op::Request), "rover-1", "m201", Payload::Inline(b"status?".to_vec())).unwrap();

    let received = handle.join().unwrap();
    match received.body {
        ReceivedBody::Inline(bytes) => assert_eq!(bytes, b"status?"),
        _ => panic!("expected inline body"),
    }
}

/// S3 — a file transfer where chunks at seq 103 and 104 race out of order on the wire.
/// The receiver's reorder buffer must hold 104 back, accept 103, then pull 104 back out
/// so the file lands on disk in the order it was written, not the order it arrived.
#[test]
fn reordered_file_chunks_reassemble_in_order() {
    let server_dir = tempfile::tempdir().unwrap();
    let server = Arc::new(link(server_dir.path(), fast_limits()));
    let server_addr = server.local_addr().unwrap();

    let server_clone = server.clone();
    let handle = thread::spawn(move || server_clone.recv(&NoopCallbacks).unwrap());

    let raw = RawClient::connect(server_addr);
    let mission_id = "m202";
    let mut seq = raw.handshake("rover-2");

    raw.send_and_await_ack(mission_id, Some(Op::Register), seq, b"dump.json".to_vec());
    seq += 1;
    assert_eq!(seq, 102);

    let chunk_a = vec![0xAAu8; 64];
    let chunk_b = vec![0xBBu8; 64];
    let chunk_c = vec![0xCCu8; 64];

    raw.send_and_await_ack(mission_id, Some(Op::Register), seq, chunk_a.clone());
    seq += 1;
    assert_eq!(seq, 103);

    // Send 104 before 103 — something only this raw client can do, since a real sender
    // blocks on 103's ack first.
    raw.send_no_wait(mission_id, Some(Op::Register), seq + 1, chunk_c.clone());
    raw.send_and_await_ack(mission_id, Some(Op::Register), seq, chunk_b.clone());
    seq += 1;
    assert_eq!(seq, 104);

    // 104's ack already arrived once the reorder buffer served it back out; drain it.
    let _ = raw.recv_timeout();

    raw.teardown(mission_id, seq + 1);

    let received = handle.join().unwrap();
    match received.body {
        ReceivedBody::File { filename, path } => {
            assert_eq!(filename, "dump.json");
            let mut expected = chunk_a;
            expected.extend(chunk_b);
            expected.extend(chunk_c);
            assert_eq!(std::fs::read(path).unwrap(), expected);
        }
        _ => panic!("expected file body"),
    }
}

/// S4 — every SYN-ACK is dropped, so the handshake never completes. `send` must give up
/// once its retry cap is exhausted rather than hang forever.
#[test]
fn handshake_fails_when_synack_is_always_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let limits = Limits { handshake_retx_cap: 3, ..fast_limits() };
    let server = Arc::new(link(dir.path(), limits));
    let client = link(dir.path(), limits);
    let server_addr = server.local_addr().unwrap();

    let relay = LossyLink::spawn(server_addr, |direction, packet| {
        if direction == Direction::ServerToClient && packet.flag == Flag::SynAck {
            return Vec::new();
        }
        vec![packet]
    });

    let server_clone = server.clone();
    thread::spawn(move || {
        let _ = server_clone.recv(&NoopCallbacks);
    });

    let err = client.send(relay.relay_addr(), None, "rover-3", "m203", Payload::Inline(b"hi".to_vec())).unwrap_err();
    assert!(matches!(err, MlError::HandshakeFailed));

    server.close();
}

/// S6 — every packet in both directions picks up added latency that varies from one
/// packet to the next. The adaptive timeout is expected to track this rather than fire
/// retransmissions on every round trip; the transfer must still complete and deliver the
/// exact bytes sent.
#[test]
fn transfer_completes_under_variable_latency_jitter() {
    let dir = tempfile::tempdir().unwrap();
    let limits = Limits { base_timeout_secs: 0.05, accept_peek_timeout_millis: 5, ..Limits::default() };
    let server = Arc::new(link(dir.path(), limits));
    let client = link(dir.path(), limits);
    let server_addr = server.local_addr().unwrap();

    let mut jittery = false;
    let relay = LossyLink::spawn(server_addr, move |_direction, packet| {
        jittery = !jittery;
        let delay = if jittery { Duration::from_millis(60) } else { Duration::from_millis(5) };
        thread::sleep(delay);
        vec![packet]
    });

    let payload: Vec<u8> = (0..4000u32).map(|i| (i % 200) as u8).collect();
    let server_clone = server.clone();
    let handle = thread::spawn(move || server_clone.recv(&NoopCallbacks).unwrap());

    client.send(relay.relay_addr(), Some(Op::Progress), "rover-4", "m204", Payload::Inline(payload.clone())).unwrap();

    let received = handle.join().unwrap();
    match received.body {
        ReceivedBody::Inline(bytes) => assert_eq!(bytes, payload),
        _ => panic!("expected inline body"),
    }
}
