//! The `MissionLink` public API: `send` (handshake + stop-and-wait transfer + teardown)
//! and `recv` (accept + stop-and-wait delivery + teardown), wiring together the wire
//! codec, RTT estimator, reorder buffer and the shared socket.

use crate::callbacks::MissionCallbacks;
use crate::error::{MlError, MlResult};
use crate::limits::Limits;
use crate::reorder::ReorderBuffer;
use crate::rtt::RttEstimator;
use crate::socket::SharedSocket;
use crate::validator;
use crate::wire::{Flag, Op, Packet};

use groundlink::logging::{self, Logger};
use std::fs::File;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Initial sequence number. Fixed rather than randomized: every handshake starts a
/// fresh session at the same number.
pub const INITIAL_SEQ: u32 = 100;

/// What a caller hands to `send`.
pub enum Payload {
    Inline(Vec<u8>),
    /// Path to a local file. The filename is sent as the first data packet, the file's
    /// contents follow as subsequent chunks.
    File(PathBuf),
}

pub enum ReceivedBody {
    Inline(Vec<u8>),
    File { filename: String, path: PathBuf },
}

pub struct ReceivedMessage {
    pub peer: SocketAddr,
    pub rover_id: String,
    pub mission_id: String,
    pub op: Option<Op>,
    pub body: ReceivedBody,
}

enum Outcome {
    Delivered,
    Aborted,
}

enum NextUnit {
    Data(Vec<u8>),
    Fin(Packet),
}

pub struct MissionLink {
    socket: SharedSocket,
    limits: Limits,
    rtt: RttEstimator,
    reorder: ReorderBuffer,
    store_dir: PathBuf,
    closed: Arc<AtomicBool>,
    log: Logger,
}

impl MissionLink {
    pub fn new(bind_addr: SocketAddr, store_dir: PathBuf, limits: Limits, log: Logger) -> io::Result<MissionLink> {
        std::fs::create_dir_all(&store_dir)?;
        Ok(MissionLink {
            socket: SharedSocket::bind(bind_addr, limits.buffer_size)?,
            rtt: RttEstimator::new(limits.base_timeout()),
            reorder: ReorderBuffer::new(limits.reorder_buffer_size, limits.reorder_max_wait()),
            limits,
            store_dir,
            closed: Arc::new(AtomicBool::new(false)),
            log,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Stops any in-progress or future `accept` loop on this instance.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    // ---- sender role -----------------------------------------------------

    /// Opens a session to `peer`, transfers `payload` under `op`, then tears the session
    /// down. Data/FIN retransmission caps are "closed-ok": exhausting them ends the
    /// session lossily but `send` still returns `Ok`. Only handshake exhaustion and real
    /// I/O faults are surfaced as errors.
    pub fn send(&self, peer: SocketAddr, op: Option<Op>, agent_id: &str, mission_id: &str, payload: Payload) -> MlResult<()> {
        let mut seq = self.open_handshake(peer, agent_id)?;

        match payload {
            Payload::File(path) => {
                self.send_file(peer, mission_id, op, &mut seq, &path)?;
            }
            Payload::Inline(bytes) => {
                self.send_inline(peer, mission_id, op, &mut seq, bytes)?;
            }
        }

        seq += 1;
        let fin = Packet::control(Flag::Fin, mission_id, seq, 0);
        self.socket.send_to(peer, &fin)?;
        self.teardown_sender(peer, mission_id, seq)?;
        Ok(())
    }

    fn open_handshake(&self, peer: SocketAddr, agent_id: &str) -> MlResult<u32> {
        self.reorder.clear(peer);
        self.socket.clear_spillover(peer);

        let syn = Packet::control(Flag::Syn, agent_id, INITIAL_SEQ, 0);
        self.send_until_acked(peer, &syn, agent_id, self.limits.handshake_retx_cap, |p| p.flag == Flag::SynAck)?
            .ok_or(MlError::HandshakeFailed)?;

        let ack = Packet::control(Flag::Ack, agent_id, INITIAL_SEQ, INITIAL_SEQ);
        self.socket.send_to(peer, &ack)?;
        logging::info!(self.log, "handshake complete, sender role"; "peer" => peer.to_string(), "agent_id" => agent_id);
        Ok(INITIAL_SEQ + 1)
    }

    fn send_inline(&self, peer: SocketAddr, mission_id: &str, op: Option<Op>, seq: &mut u32, payload: Vec<u8>) -> MlResult<Outcome> {
        let max_payload = self.socket.max_payload();
        let chunks: Vec<Vec<u8>> = if payload.is_empty() {
            vec![Vec::new()]
        } else {
            payload.chunks(max_payload).map(|c| c.to_vec()).collect()
        };

        for chunk in chunks {
            *seq += 1;
            if let Outcome::Aborted = self.send_data_chunk(peer, mission_id, op, *seq, &chunk)? {
                return Ok(Outcome::Aborted);
            }
        }
        Ok(Outcome::Delivered)
    }

    fn send_file(&self, peer: SocketAddr, mission_id: &str, op: Option<Op>, seq: &mut u32, path: &Path) -> MlResult<Outcome> {
        let filename = path
            .file_name()
            .and_then(|f| f.to_str())
            .ok_or_else(|| MlError::Io(io::Error::new(io::ErrorKind::InvalidInput, "file path has no utf-8 filename")))?
            .to_string();

        *seq += 1;
        if let Outcome::Aborted = self.send_data_chunk(peer, mission_id, op, *seq, filename.as_bytes())? {
            return Ok(Outcome::Aborted);
        }

        let mut file = File::open(path)?;
        let max_payload = self.socket.max_payload();
        let mut buf = vec![0u8; max_payload];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            *seq += 1;
            if let Outcome::Aborted = self.send_data_chunk(peer, mission_id, op, *seq, &buf[..n])? {
                return Ok(Outcome::Aborted);
            }
        }
        Ok(Outcome::Delivered)
    }

    fn send_data_chunk(&self, peer: SocketAddr, mission_id: &str, op: Option<Op>, seq: u32, chunk: &[u8]) -> MlResult<Outcome> {
        let packet = Packet::data(Flag::Data, mission_id, seq, 0, op, chunk.to_vec());
        match self.send_until_acked(peer, &packet, mission_id, self.limits.data_retx_cap, |p| p.flag == Flag::Ack && p.ack == seq)? {
            Some(_) => Ok(Outcome::Delivered),
            None => {
                logging::warn!(self.log, "data retransmission cap reached, closing lossily";
                    "peer" => peer.to_string(), "mission_id" => mission_id, "seq" => seq);
                Ok(Outcome::Aborted)
            }
        }
    }

    /// Retransmits `packet` to `peer` up to `cap` times, stopping as soon as a reply from
    /// `peer` matching `mission_id_for_validation` satisfies `accept`. Feeds the RTT
    /// estimator on success. `Ok(None)` means the cap was exhausted without a match.
    fn send_until_acked(
        &self,
        peer: SocketAddr,
        packet: &Packet,
        mission_id_for_validation: &str,
        cap: u32,
        accept: impl Fn(&Packet) -> bool,
    ) -> MlResult<Option<Packet>> {
        for _ in 0..cap {
            self.socket.send_to(peer, packet)?;
            let sent_at = Instant::now();
            let timeout = self.rtt.timeout(peer);
            if let Some(reply) = self.socket.recv_for_session(peer, timeout)? {
                if reply.mission_id == mission_id_for_validation && accept(&reply) {
                    self.rtt.observe(peer, sent_at.elapsed().as_secs_f64());
                    return Ok(Some(reply));
                }
            }
        }
        Ok(None)
    }

    fn teardown_sender(&self, peer: SocketAddr, mission_id: &str, our_fin_seq: u32) -> MlResult<()> {
        enum State {
            FinWait,
            TimeWait,
            Closing,
        }
        let mut state = State::FinWait;

        for _ in 0..self.limits.data_retx_cap {
            let timeout = self.rtt.timeout(peer);
            let reply = self.socket.recv_for_session(peer, timeout)?;
            match (&state, reply) {
                (State::FinWait, Some(p)) if p.mission_id == mission_id && p.flag == Flag::Ack && p.ack == our_fin_seq => {
                    state = State::TimeWait;
                }
                (State::FinWait, Some(p)) if p.mission_id == mission_id && p.flag == Flag::Fin => {
                    let ack = Packet::control(Flag::Ack, mission_id, our_fin_seq, p.seq);
                    self.socket.send_to(peer, &ack)?;
                    state = State::Closing;
                }
                (State::FinWait, _) => {
                    let fin = Packet::control(Flag::Fin, mission_id, our_fin_seq, 0);
                    self.socket.send_to(peer, &fin)?;
                }
                (State::TimeWait, Some(p)) if p.mission_id == mission_id && p.flag == Flag::Fin => {
                    let ack = Packet::control(Flag::Ack, mission_id, our_fin_seq, p.seq);
                    self.socket.send_to(peer, &ack)?;
                    return Ok(());
                }
                (State::TimeWait, _) => return Ok(()),
                (State::Closing, Some(p)) if p.mission_id == mission_id && p.flag == Flag::Ack && p.ack == our_fin_seq => {
                    return Ok(());
                }
                (State::Closing, _) => {}
            }
        }
        logging::warn!(self.log, "teardown retransmission cap reached, closing lossily"; "peer" => peer.to_string());
        Ok(())
    }

    // ---- receiver role -----------------------------------------------------

    /// Blocks until a SYN arrives, completes the SYN-ACK/ACK exchange, and returns the
    /// peer address, the rover id carried by the SYN, and the session's initial seq. If a
    /// particular handshake attempt's SYN-ACK is never acked, logs and goes back to
    /// waiting for the next SYN rather than giving up the whole accept loop.
    pub fn accept(&self) -> MlResult<(SocketAddr, String, u32)> {
        loop {
            if self.closed.load(Ordering::Relaxed) {
                return Err(MlError::Io(io::Error::new(io::ErrorKind::Other, "mission link closed")));
            }

            let (syn, peer) = match self.socket.accept_peek(self.limits.accept_peek_timeout())? {
                Some(pair) => pair,
                None => continue,
            };
            let rover_id = syn.mission_id.clone();

            self.reorder.clear(peer);
            self.socket.clear_spillover(peer);

            let synack = Packet::control(Flag::SynAck, &rover_id, INITIAL_SEQ, 0);
            let matched = self.send_until_acked(peer, &synack, &rover_id, self.limits.handshake_retx_cap, |p| {
                p.flag == Flag::Ack && p.seq == INITIAL_SEQ && p.ack == INITIAL_SEQ
            })?;

            match matched {
                Some(_) => {
                    logging::info!(self.log, "accepted session"; "peer" => peer.to_string(), "rover_id" => &rover_id);
                    return Ok((peer, rover_id, INITIAL_SEQ));
                }
                None => {
                    logging::warn!(self.log, "handshake exhausted, resuming accept"; "peer" => peer.to_string(), "rover_id" => &rover_id);
                    continue;
                }
            }
        }
    }

    /// Completes one full receive: accept, read the message (inline or file), dispatch to
    /// `callbacks`, then teardown.
    pub fn recv(&self, callbacks: &dyn MissionCallbacks) -> MlResult<ReceivedMessage> {
        let (peer, rover_id, session_seq) = self.accept()?;
        let mut expected = session_seq + 1;

        let (mission_id, op, first) = self.first_data_unit(peer, expected, session_seq)?;

        match first {
            NextUnit::Fin(fin_packet) => {
                self.teardown_receiver(peer, &mission_id, fin_packet.seq, session_seq)?;
                Ok(ReceivedMessage { peer, rover_id, mission_id, op, body: ReceivedBody::Inline(Vec::new()) })
            }
            NextUnit::Data(first_payload) => {
                expected += 1;
                if looks_like_filename(&first_payload) {
                    let filename = String::from_utf8_lossy(&first_payload).into_owned();
                    let (path, fin_packet) = self.recv_file_body(peer, &mission_id, &mut expected, session_seq, &filename)?;
                    self.teardown_receiver(peer, &mission_id, fin_packet.seq, session_seq)?;
                    logging::info!(self.log, "file received"; "peer" => peer.to_string(), "filename" => &filename);
                    self.dispatch_file(peer, &rover_id, op, &filename, &path, callbacks)?;
                    Ok(ReceivedMessage { peer, rover_id, mission_id, op, body: ReceivedBody::File { filename, path } })
                } else {
                    let (body, fin_packet) = self.recv_inline_body(peer, &mission_id, &mut expected, session_seq, first_payload)?;
                    self.teardown_receiver(peer, &mission_id, fin_packet.seq, session_seq)?;
                    self.dispatch_inline(peer, &rover_id, op, &body, callbacks)?;
                    Ok(ReceivedMessage { peer, rover_id, mission_id, op, body: ReceivedBody::Inline(body) })
                }
            }
        }
    }

    fn first_data_unit(&self, peer: SocketAddr, expected: u32, session_seq: u32) -> MlResult<(String, Option<Op>, NextUnit)> {
        loop {
            let timeout = self.rtt.timeout(peer);
            let packet = match self.socket.recv_for_session(peer, timeout)? {
                Some(p) => p,
                None => continue,
            };
            match packet.flag {
                Flag::Fin if packet.seq == expected => {
                    return Ok((packet.mission_id.clone(), None, NextUnit::Fin(packet)));
                }
                Flag::Data if packet.seq == expected => {
                    let mission_id = packet.mission_id.clone();
                    let op = packet.op;
                    let ack = Packet::control(Flag::Ack, &mission_id, session_seq, packet.seq);
                    self.socket.send_to(peer, &ack)?;
                    return Ok((mission_id, op, NextUnit::Data(packet.payload)));
                }
                _ => continue,
            }
        }
    }

    /// Reads the next in-order unit for `mission_id`: either the next data chunk's
    /// payload, or the FIN that closes the data phase. Applies the reorder buffer and
    /// duplicate-ack policy (resend the last ack without advancing on a stale seq).
    fn next_data_unit(&self, peer: SocketAddr, mission_id: &str, expected: u32, session_seq: u32) -> MlResult<NextUnit> {
        loop {
            if let Some(payload) = self.reorder.take(peer, expected) {
                let ack = Packet::control(Flag::Ack, mission_id, session_seq, expected);
                self.socket.send_to(peer, &ack)?;
                return Ok(NextUnit::Data(payload));
            }

            let timeout = self.rtt.timeout(peer);
            let packet = match self.socket.recv_for_session(peer, timeout)? {
                Some(p) => p,
                None => continue,
            };
            if packet.mission_id != mission_id {
                continue;
            }

            match packet.flag {
                Flag::Fin => return Ok(NextUnit::Fin(packet)),
                Flag::Data if packet.seq == expected => {
                    let ack = Packet::control(Flag::Ack, mission_id, session_seq, packet.seq);
                    self.socket.send_to(peer, &ack)?;
                    return Ok(NextUnit::Data(packet.payload));
                }
                Flag::Data if packet.seq < expected => {
                    let ack = Packet::control(Flag::Ack, mission_id, session_seq, expected - 1);
                    self.socket.send_to(peer, &ack)?;
                }
                Flag::Data => {
                    self.reorder.put(peer, packet.seq, packet.payload);
                    self.reorder.cleanup(peer, expected);
                }
                _ => {}
            }
        }
    }

    fn recv_inline_body(
        &self,
        peer: SocketAddr,
        mission_id: &str,
        expected: &mut u32,
        session_seq: u32,
        first_chunk: Vec<u8>,
    ) -> MlResult<(Vec<u8>, Packet)> {
        let mut buffer = first_chunk;
        loop {
            match self.next_data_unit(peer, mission_id, *expected, session_seq)? {
                NextUnit::Data(payload) => {
                    *expected += 1;
                    buffer.extend_from_slice(&payload);
                }
                NextUnit::Fin(fin_packet) => {
                    if !fin_packet.is_control_payload() {
                        buffer.extend_from_slice(&fin_packet.payload);
                    }
                    return Ok((buffer, fin_packet));
                }
            }
        }
    }

    /// Writes a file transfer to `store_dir`, holding back the most recently accepted
    /// chunk until the next one (or FIN) arrives. This collapses an ACK-loss-induced
    /// duplicate delivery of the same chunk into a single disk write.
    fn recv_file_body(
        &self,
        peer: SocketAddr,
        mission_id: &str,
        expected: &mut u32,
        session_seq: u32,
        filename: &str,
    ) -> MlResult<(PathBuf, Packet)> {
        let path = self.store_dir.join(filename);
        let mut file = File::create(&path)?;
        let mut held_back: Option<Vec<u8>> = None;

        loop {
            match self.next_data_unit(peer, mission_id, *expected, session_seq)? {
                NextUnit::Data(payload) => {
                    *expected += 1;
                    if let Some(prev) = held_back.take() {
                        file.write_all(&prev)?;
                    }
                    held_back = Some(payload);
                }
                NextUnit::Fin(fin_packet) => {
                    if let Some(prev) = held_back.take() {
                        file.write_all(&prev)?;
                    }
                    if !fin_packet.is_control_payload() {
                        file.write_all(&fin_packet.payload)?;
                    }
                    return Ok((path, fin_packet));
                }
            }
        }
    }

    fn teardown_receiver(&self, peer: SocketAddr, mission_id: &str, peer_fin_seq: u32, our_seq: u32) -> MlResult<()> {
        let ack = Packet::control(Flag::Ack, mission_id, our_seq, peer_fin_seq);
        self.socket.send_to(peer, &ack)?;

        let our_fin_seq = our_seq + 1;
        let fin = Packet::control(Flag::Fin, mission_id, our_fin_seq, peer_fin_seq);
        self.socket.send_to(peer, &fin)?;

        for _ in 0..self.limits.handshake_retx_cap {
            let timeout = self.rtt.timeout(peer);
            match self.socket.recv_for_session(peer, timeout)? {
                Some(p) if p.mission_id == mission_id && p.flag == Flag::Ack && p.ack == our_fin_seq => return Ok(()),
                _ => {
                    let fin = Packet::control(Flag::Fin, mission_id, our_fin_seq, peer_fin_seq);
                    self.socket.send_to(peer, &fin)?;
                }
            }
        }
        logging::warn!(self.log, "ack-of-fin cap reached, closing anyway"; "peer" => peer.to_string());
        Ok(())
    }

    /// Dispatches a delivered body to the matching callback. A Task payload that fails
    /// schema validation still gets `on_invalid_mission` called (the transport already
    /// ACKed and tore the session down cleanly), but is additionally reported back to
    /// `recv`'s own caller as `Err(MlError::InvalidMission)` — the only way a caller
    /// using `NoopCallbacks` can observe the rejection at all.
    fn dispatch_inline(&self, peer: SocketAddr, rover_id: &str, op: Option<Op>, body: &[u8], callbacks: &dyn MissionCallbacks) -> MlResult<()> {
        match op {
            Some(Op::Register) => Ok(callbacks.on_register(peer, rover_id, body)),
            Some(Op::Metrics) => Ok(callbacks.on_metrics(peer, rover_id, &String::from_utf8_lossy(body))),
            Some(Op::Request) => Ok(callbacks.on_request(peer, rover_id, body)),
            Some(Op::Progress) => Ok(callbacks.on_progress(peer, rover_id, body)),
            Some(Op::Task) => match validator::validate(body, &self.log) {
                Ok(mission) => Ok(callbacks.on_task(peer, rover_id, &mission)),
                Err(reason) => {
                    callbacks.on_invalid_mission(peer, rover_id, &reason);
                    Err(MlError::InvalidMission(reason))
                }
            },
            None => Ok(()),
        }
    }

    /// Same dispatch as `dispatch_inline`, but for a body that landed on disk via
    /// TelemetryStream-style file delivery rather than inline chunks. Metrics files are
    /// reported by name only (the bytes themselves travel over TelemetryStream); every
    /// other op needs the file's contents read back off disk first, since Task payloads
    /// pushed as a file still have to clear schema validation like any other Task.
    fn dispatch_file(&self, peer: SocketAddr, rover_id: &str, op: Option<Op>, filename: &str, path: &Path, callbacks: &dyn MissionCallbacks) -> MlResult<()> {
        let op = match op {
            Some(op) => op,
            None => return Ok(()),
        };

        if op == Op::Metrics {
            callbacks.on_metrics(peer, rover_id, filename);
            return Ok(());
        }

        let body = std::fs::read(path)?;

        match op {
            Op::Register => Ok(callbacks.on_register(peer, rover_id, &body)),
            Op::Request => Ok(callbacks.on_request(peer, rover_id, &body)),
            Op::Progress => Ok(callbacks.on_progress(peer, rover_id, &body)),
            Op::Task => match validator::validate(&body, &self.log) {
                Ok(mission) => Ok(callbacks.on_task(peer, rover_id, &mission)),
                Err(reason) => {
                    callbacks.on_invalid_mission(peer, rover_id, &reason);
                    Err(MlError::InvalidMission(reason))
                }
            },
            Op::Metrics => unreachable!("handled above"),
        }
    }
}

fn looks_like_filename(payload: &[u8]) -> bool {
    payload.ends_with(b".json")
}
