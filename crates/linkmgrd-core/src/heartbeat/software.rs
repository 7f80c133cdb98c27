//! Software heartbeat engine (§4.1): owns the TX buffer and drives one
//! send/receive cycle per probe interval.

use std::net::Ipv4Addr;
use std::time::Duration;

use uuid::Uuid;

use crate::icmp::{
    build_frame, classify_guid, command_from_tlv, parse_frame, rewrite_seq_and_tlv, tlv, Command, FrameParams,
    GuidClassification, PayloadHeader, ProberKind,
};
use crate::link_prober::LinkProberEvent;

use super::socket::IcmpSocket;

/// One outcome of a probe cycle, translated into zero or more Link Prober
/// events and (for command TLVs) an action the caller hands to the state
/// machine layer.
#[derive(Debug, Clone)]
pub struct CycleResult {
    pub events: Vec<LinkProberEvent>,
}

/// Per-port software prober: owns the prebuilt frame template, the running
/// sequence number, and the current probe interval (normal or "decreased",
/// §4.1/§6 `decreaseProbeIntervalAfterSwitch`).
pub struct SoftwareProber {
    frame_params: FrameParams,
    self_guid: Uuid,
    seq: u16,
    interval: Duration,
    suspended: bool,
    tx_template: Vec<u8>,
}

impl SoftwareProber {
    pub fn new(frame_params: FrameParams, self_guid: Uuid, interval: Duration) -> Self {
        let payload = PayloadHeader::new(ProberKind::Software, *self_guid.as_bytes());
        let mut tlv_tail = Vec::new();
        tlv::append_sentinel(&mut tlv_tail);
        let tx_template = build_frame(&frame_params, 0, &payload, &tlv_tail);
        Self {
            frame_params,
            self_guid,
            seq: 0,
            interval,
            suspended: false,
            tx_template,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// `decreaseProbeIntervalAfterSwitch`: after issuing a switchover, probe
    /// at the tighter interval until the peer acknowledges (§4.1, §6).
    pub fn set_decreased_interval(&mut self, decreased: Duration) {
        self.interval = decreased;
    }

    pub fn restore_interval(&mut self, normal: Duration) {
        self.interval = normal;
    }

    /// Send one probe carrying an optional command TLV; a no-op while
    /// suspended (§4.2: Link Prober `Wait` state keeps sending with the
    /// command attached until resumed, so suspension here only applies to
    /// the heartbeat-missing detection path, not to switch commands).
    pub fn send_probe(&mut self, socket: &mut dyn IcmpSocket, command: Option<Command>) -> std::io::Result<()> {
        self.seq = self.seq.wrapping_add(1);
        let mut tlv_tail = Vec::new();
        if let Some(cmd) = command {
            tlv::append_command(&mut tlv_tail, cmd);
        }
        tlv::append_sentinel(&mut tlv_tail);
        rewrite_seq_and_tlv(&mut self.tx_template, self.seq, &tlv_tail);
        socket.send(&self.tx_template)
    }

    /// Drain every frame currently queued on `socket`, classify it, and
    /// translate it into Link Prober events. Frames that don't parse or
    /// whose source doesn't match this port's blade IP are silently
    /// dropped (§4.1, §8 invariant 4).
    pub fn poll(&mut self, socket: &mut dyn IcmpSocket, expected_src: Ipv4Addr) -> std::io::Result<CycleResult> {
        let mut events = Vec::new();
        let mut buf = [0u8; 1500];
        loop {
            let Some(n) = socket.try_recv(&mut buf)? else {
                break;
            };
            let Some(parsed) = parse_frame(&buf[..n]) else {
                continue;
            };
            if parsed.ip_src != expected_src {
                continue;
            }
            if self.suspended {
                continue;
            }
            let event = match classify_guid(&self.self_guid, parsed.payload.guid) {
                GuidClassification::Self_ => LinkProberEvent::IcmpSelf,
                GuidClassification::Peer => LinkProberEvent::IcmpPeer,
                GuidClassification::Unset => LinkProberEvent::IcmpUnknown,
            };
            events.push(event);
            for record in &parsed.tlvs {
                match command_from_tlv(record) {
                    Some(Command::MuxProbe) => events.push(LinkProberEvent::MuxProbeRequest),
                    Some(Command::SwitchActive) => events.push(LinkProberEvent::SwitchActiveRequest),
                    None => {}
                }
            }
        }
        Ok(CycleResult { events })
    }

    pub fn frame_params(&self) -> &FrameParams {
        &self.frame_params
    }
}
