//! The ML wire format: `flag|id_mission|seq|ack|size|op|payload`, exactly 6 top-level
//! pipes; the payload is everything after the 6th pipe, taken verbatim and never
//! re-split, so it may itself contain raw bytes and further pipe characters.

use std::fmt;

/// The single byte carried by every control packet (SYN/SYN-ACK/ACK/FIN) that has no
/// payload of its own.
pub const CONTROL_SENTINEL: u8 = 0u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Syn,
    SynAck,
    Ack,
    Data,
    Fin,
}

impl Flag {
    fn as_byte(self) -> u8 {
        match self {
            Flag::Syn => b'S',
            Flag::SynAck => b'Z',
            Flag::Ack => b'A',
            Flag::Data => b'D',
            Flag::Fin => b'F',
        }
    }

    fn from_bytes(b: &[u8]) -> Result<Flag, ParseError> {
        match b {
            b"S" => Ok(Flag::Syn),
            b"Z" => Ok(Flag::SynAck),
            b"A" => Ok(Flag::Ack),
            b"D" => Ok(Flag::Data),
            b"F" => Ok(Flag::Fin),
            _ => Err(ParseError),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Register,
    Task,
    Metrics,
    Request,
    Progress,
}

impl Op {
    fn as_byte(self) -> u8 {
        match self {
            Op::Register => b'R',
            Op::Task => b'T',
            Op::Metrics => b'M',
            Op::Request => b'Q',
            Op::Progress => b'P',
        }
    }

    fn from_bytes(b: &[u8]) -> Result<Option<Op>, ParseError> {
        match b {
            b"N" => Ok(None),
            b"R" => Ok(Some(Op::Register)),
            b"T" => Ok(Some(Op::Task)),
            b"M" => Ok(Some(Op::Metrics)),
            b"Q" => Ok(Some(Op::Request)),
            b"P" => Ok(Some(Op::Progress)),
            _ => Err(ParseError),
        }
    }
}

/// Malformed wire packet. Always handled internally (silently dropped by the caller);
/// never surfaced to a library consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError;

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed ML packet")
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub flag: Flag,
    pub mission_id: String,
    pub seq: u32,
    pub ack: u32,
    pub op: Option<Op>,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn control(flag: Flag, mission_id: &str, seq: u32, ack: u32) -> Packet {
        Packet {
            flag,
            mission_id: mission_id.to_string(),
            seq,
            ack,
            op: None,
            payload: vec![CONTROL_SENTINEL],
        }
    }

    pub fn data(flag: Flag, mission_id: &str, seq: u32, ack: u32, op: Option<Op>, payload: Vec<u8>) -> Packet {
        Packet { flag, mission_id: mission_id.to_string(), seq, ack, op, payload }
    }

    pub fn is_control_payload(&self) -> bool {
        self.payload == [CONTROL_SENTINEL]
    }
}

pub struct WireCodec {
    pub buffer_size: usize,
}

impl WireCodec {
    pub fn new(buffer_size: usize) -> WireCodec {
        WireCodec { buffer_size }
    }

    /// Worst-case header size: `flag(1) + | + id_mission(3) + | + seq(4) + | + ack(4) + |
    /// + size(4) + | + op(1) + |` = 23 bytes, matching the source's `getHeaderSize()`.
    pub const HEADER_SIZE: usize = 23;

    pub fn max_payload(&self) -> usize {
        self.buffer_size.saturating_sub(Self::HEADER_SIZE)
    }

    pub fn encode(&self, packet: &Packet) -> Vec<u8> {
        let op_byte = packet.op.map(Op::as_byte).unwrap_or(b'N');
        let mut out = Vec::with_capacity(Self::HEADER_SIZE + packet.payload.len());
        out.push(packet.flag.as_byte());
        out.push(b'|');
        out.extend_from_slice(packet.mission_id.as_bytes());
        out.push(b'|');
        out.extend_from_slice(packet.seq.to_string().as_bytes());
        out.push(b'|');
        out.extend_from_slice(packet.ack.to_string().as_bytes());
        out.push(b'|');
        out.extend_from_slice(packet.payload.len().to_string().as_bytes());
        out.push(b'|');
        out.push(op_byte);
        out.push(b'|');
        out.extend_from_slice(&packet.payload);
        out
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Packet, ParseError> {
        let mut pipes = [0usize; 6];
        let mut found = 0;
        for (i, &b) in bytes.iter().enumerate() {
            if b == b'|' {
                pipes[found] = i;
                found += 1;
                if found == 6 {
                    break;
                }
            }
        }
        if found != 6 {
            return Err(ParseError);
        }

        let flag = Flag::from_bytes(&bytes[0..pipes[0]])?;
        let mission_id = std::str::from_utf8(&bytes[pipes[0] + 1..pipes[1]])
            .map_err(|_| ParseError)?
            .to_string();
        let seq = parse_ascii_u32(&bytes[pipes[1] + 1..pipes[2]])?;
        let ack = parse_ascii_u32(&bytes[pipes[2] + 1..pipes[3]])?;
        // size is declarative (mirrors the source's `len(message)` at encode time); the
        // codec never re-validates it against the actual trailing byte count.
        let op = Op::from_bytes(&bytes[pipes[4] + 1..pipes[5]])?;
        let payload = bytes[pipes[5] + 1..].to_vec();

        Ok(Packet { flag, mission_id, seq, ack, op, payload })
    }
}

fn parse_ascii_u32(b: &[u8]) -> Result<u32, ParseError> {
    std::str::from_utf8(b).map_err(|_| ParseError)?.parse().map_err(|_| ParseError)
}
