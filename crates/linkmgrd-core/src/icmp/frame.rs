//! Ethernet + IPv4 + ICMP Echo framing for the heartbeat wire format (§4.1, §6).
//!
//! The TX buffer is built once per port and subsequently mutated only in the
//! sequence-number field and the TLV tail; the ICMP checksum is recomputed
//! incrementally from that delta rather than over the whole buffer.

use std::net::Ipv4Addr;

use super::payload::{PayloadHeader, PAYLOAD_LEN};
use super::tlv;

const ETH_HEADER_LEN: usize = 14;
const IPV4_HEADER_LEN: usize = 20;
const ICMP_HEADER_LEN: usize = 8;
pub const TLV_START_OFFSET: usize = ETH_HEADER_LEN + IPV4_HEADER_LEN + ICMP_HEADER_LEN + PAYLOAD_LEN;

const ETHERTYPE_IPV4: u16 = 0x0800;
const ICMP_ECHO_REQUEST: u8 = 8;
const ICMP_ECHO_REPLY: u8 = 0;
const IPV4_PROTO_ICMP: u8 = 1;
const TOS_CS7: u8 = 0xB8;
const DEFAULT_TTL: u8 = 64;

/// Parameters fixed for the lifetime of a heartbeat session; only `seq`
/// changes cycle to cycle.
#[derive(Debug, Clone)]
pub struct FrameParams {
    pub eth_dst: [u8; 6],
    pub eth_src: [u8; 6],
    pub ip_src: Ipv4Addr,
    pub ip_dst: Ipv4Addr,
    pub icmp_id: u16,
}

fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }
    if let [last] = chunks.remainder() {
        sum += (*last as u32) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// Build a complete heartbeat frame: Ethernet + IPv4 + ICMP Echo Request +
/// fixed payload + TLV tail (terminated by `SENTINEL`).
pub fn build_frame(params: &FrameParams, seq: u16, payload: &PayloadHeader, tlv_tail: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(TLV_START_OFFSET + tlv_tail.len() + 4);

    // Ethernet header
    buf.extend_from_slice(&params.eth_dst);
    buf.extend_from_slice(&params.eth_src);
    buf.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());

    // IPv4 header (checksum filled after the fact)
    let ip_total_len = IPV4_HEADER_LEN + ICMP_HEADER_LEN + PAYLOAD_LEN + tlv_tail.len();
    let ip_header_start = buf.len();
    buf.push(0x45); // version=4, IHL=5
    buf.push(TOS_CS7);
    buf.extend_from_slice(&(ip_total_len as u16).to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes()); // identification
    buf.extend_from_slice(&0u16.to_be_bytes()); // flags/fragment offset
    buf.push(DEFAULT_TTL);
    buf.push(IPV4_PROTO_ICMP);
    buf.extend_from_slice(&0u16.to_be_bytes()); // checksum placeholder
    buf.extend_from_slice(&params.ip_src.octets());
    buf.extend_from_slice(&params.ip_dst.octets());
    let ip_checksum = internet_checksum(&buf[ip_header_start..ip_header_start + IPV4_HEADER_LEN]);
    buf[ip_header_start + 10..ip_header_start + 12].copy_from_slice(&ip_checksum.to_be_bytes());

    // ICMP header + payload + TLVs (checksum filled after the fact)
    let icmp_start = buf.len();
    buf.push(ICMP_ECHO_REQUEST);
    buf.push(0); // code
    buf.extend_from_slice(&0u16.to_be_bytes()); // checksum placeholder
    buf.extend_from_slice(&params.icmp_id.to_be_bytes());
    buf.extend_from_slice(&seq.to_be_bytes());
    buf.extend_from_slice(&payload.encode());
    buf.extend_from_slice(tlv_tail);

    let icmp_checksum = internet_checksum(&buf[icmp_start..]);
    buf[icmp_start + 2..icmp_start + 4].copy_from_slice(&icmp_checksum.to_be_bytes());

    buf
}

/// Rewrite the sequence number and TLV tail of an existing TX buffer in
/// place and recompute only the ICMP checksum — the incremental update
/// path described in §3 (avoids rebuilding the Ethernet/IPv4 headers).
pub fn rewrite_seq_and_tlv(buf: &mut Vec<u8>, seq: u16, tlv_tail: &[u8]) {
    let icmp_start = ETH_HEADER_LEN + IPV4_HEADER_LEN;
    buf.truncate(TLV_START_OFFSET);
    buf[icmp_start + 6..icmp_start + 8].copy_from_slice(&seq.to_be_bytes());
    buf.extend_from_slice(tlv_tail);
    buf[icmp_start + 2..icmp_start + 4].copy_from_slice(&0u16.to_be_bytes());
    let checksum = internet_checksum(&buf[icmp_start..]);
    buf[icmp_start + 2..icmp_start + 4].copy_from_slice(&checksum.to_be_bytes());
}

/// Fields extracted from an inbound heartbeat reply.
#[derive(Debug, Clone)]
pub struct ParsedFrame {
    pub ip_src: Ipv4Addr,
    pub icmp_type: u8,
    pub icmp_id: u16,
    pub icmp_seq: u16,
    pub payload: PayloadHeader,
    pub tlvs: Vec<tlv::Tlv>,
}

/// Parse a received frame. Returns `None` on any structural mismatch
/// (too short, not ICMP, unparseable payload) — callers silently drop such
/// frames per §4.1/§8 invariant 4.
pub fn parse_frame(bytes: &[u8]) -> Option<ParsedFrame> {
    if bytes.len() < TLV_START_OFFSET {
        return None;
    }
    let ethertype = u16::from_be_bytes([bytes[12], bytes[13]]);
    if ethertype != ETHERTYPE_IPV4 {
        return None;
    }
    let ip_header_start = ETH_HEADER_LEN;
    let ihl = (bytes[ip_header_start] & 0x0F) as usize * 4;
    if ihl < IPV4_HEADER_LEN {
        return None;
    }
    let protocol = bytes[ip_header_start + 9];
    if protocol != IPV4_PROTO_ICMP {
        return None;
    }
    let ip_src = Ipv4Addr::new(
        bytes[ip_header_start + 12],
        bytes[ip_header_start + 13],
        bytes[ip_header_start + 14],
        bytes[ip_header_start + 15],
    );

    let icmp_start = ip_header_start + ihl;
    if bytes.len() < icmp_start + ICMP_HEADER_LEN + PAYLOAD_LEN {
        return None;
    }
    let icmp_type = bytes[icmp_start];
    if icmp_type != ICMP_ECHO_REQUEST && icmp_type != ICMP_ECHO_REPLY {
        return None;
    }
    let icmp_id = u16::from_be_bytes([bytes[icmp_start + 4], bytes[icmp_start + 5]]);
    let icmp_seq = u16::from_be_bytes([bytes[icmp_start + 6], bytes[icmp_start + 7]]);

    let payload_start = icmp_start + ICMP_HEADER_LEN;
    let payload = PayloadHeader::decode(&bytes[payload_start..payload_start + PAYLOAD_LEN])?;

    let tail_start = payload_start + PAYLOAD_LEN;
    let tlvs = tlv::parse_tlv_tail(&bytes[tail_start..]);

    Some(ParsedFrame {
        ip_src,
        icmp_type,
        icmp_id,
        icmp_seq,
        payload,
        tlvs,
    })
}
