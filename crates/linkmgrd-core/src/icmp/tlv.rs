//! TLV tail of the heartbeat payload (§6).
//!
//! `{ type: u8, length: u16 BE, value: [u8; length] }`, terminated by a
//! `SENTINEL` TLV (`length == 0`). Unknown types with non-zero length are
//! skipped, never treated as errors.

/// Known TLV types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlvType {
    Sentinel,
    Command,
    /// Test-only marker TLV; never emitted by the live heartbeat engine.
    Dummy,
    /// Any type byte this build doesn't recognize. Carries the raw byte so
    /// round-tripping (re-encode-what-we-parsed) is lossless.
    Unknown(u8),
}

impl From<u8> for TlvType {
    fn from(byte: u8) -> Self {
        match byte {
            0 => TlvType::Sentinel,
            1 => TlvType::Command,
            2 => TlvType::Dummy,
            other => TlvType::Unknown(other),
        }
    }
}

impl From<TlvType> for u8 {
    fn from(t: TlvType) -> u8 {
        match t {
            TlvType::Sentinel => 0,
            TlvType::Command => 1,
            TlvType::Dummy => 2,
            TlvType::Unknown(b) => b,
        }
    }
}

/// Command carried by a `Command` TLV's single-byte value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SwitchActive,
    MuxProbe,
}

impl Command {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Command::SwitchActive),
            1 => Some(Command::MuxProbe),
            _ => None,
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            Command::SwitchActive => 0,
            Command::MuxProbe => 1,
        }
    }
}

/// A single parsed TLV record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    pub tlv_type: TlvType,
    pub value: Vec<u8>,
}

/// Append a `SENTINEL` TLV (type 0, length 0) to `buf`.
pub fn append_sentinel(buf: &mut Vec<u8>) {
    buf.push(u8::from(TlvType::Sentinel));
    buf.extend_from_slice(&0u16.to_be_bytes());
}

/// Append a `COMMAND` TLV carrying `command` to `buf`.
pub fn append_command(buf: &mut Vec<u8>, command: Command) {
    buf.push(u8::from(TlvType::Command));
    buf.extend_from_slice(&1u16.to_be_bytes());
    buf.push(command.to_byte());
}

/// Walk a TLV tail starting at `tail`, returning every TLV encountered up to
/// (exclusive of) `SENTINEL`. Stops at `SENTINEL` or at the first malformed
/// record (truncated length). Unknown non-zero-length TLVs are kept in the
/// returned list (the caller skips what it doesn't understand) rather than
/// aborting the walk, matching "gracefully skip unknown TLVs" in §4.1.
pub fn parse_tlv_tail(mut tail: &[u8]) -> Vec<Tlv> {
    let mut out = Vec::new();
    loop {
        if tail.len() < 3 {
            break;
        }
        let tlv_type = TlvType::from(tail[0]);
        let length = u16::from_be_bytes([tail[1], tail[2]]) as usize;
        if tlv_type == TlvType::Sentinel {
            break;
        }
        if tail.len() < 3 + length {
            break;
        }
        let value = tail[3..3 + length].to_vec();
        out.push(Tlv { tlv_type, value });
        tail = &tail[3 + length..];
    }
    out
}

/// Extract the [`Command`] embedded in a `Command` TLV, if well formed.
pub fn command_from_tlv(tlv: &Tlv) -> Option<Command> {
    if tlv.tlv_type != TlvType::Command {
        return None;
    }
    tlv.value.first().copied().and_then(Command::from_byte)
}
