//! Shared harness for linkmgrd's end-to-end scenario tests (§8).
//!
//! Builds the [`PortConfig`]/[`GlobalConfig`] fixtures the scenario tests in
//! `tests/scenarios.rs` share, plus small helpers for driving a
//! [`SoftwareProber`] against an [`InMemorySocket`] without needing a real
//! interface.

use std::net::Ipv4Addr;

use uuid::Uuid;

use linkmgrd_core::config::{GlobalConfig, LinkFailureDetectionType, Mode, PortCableType, PortConfig};
use linkmgrd_core::heartbeat::{FrameParams, InMemorySocket, SoftwareProber};
use linkmgrd_core::icmp::{append_sentinel, build_frame, PayloadHeader, ProberKind};

pub fn port_config(name: &str, cable_type: PortCableType, mode: Mode) -> PortConfig {
    PortConfig {
        port_name: name.to_string(),
        server_id: 1,
        blade_ipv4: Ipv4Addr::new(192, 168, 0, 1),
        blade_mac: None,
        well_known_mac: [0x04, 0x27, 0x28, 0x7A, 0x00, 0x01],
        tor_mac: [0x00, 0x11, 0x22, 0x33, 0x44, 0x55],
        vlan_mac: None,
        loopback_src_ipv4: Ipv4Addr::new(10, 1, 0, 1),
        mode,
        cable_type,
        link_failure_detection_type: LinkFailureDetectionType::Software,
    }
}

pub fn frame_params(blade_ip: Ipv4Addr) -> FrameParams {
    FrameParams {
        eth_dst: [0, 1, 2, 3, 4, 5],
        eth_src: [5, 4, 3, 2, 1, 0],
        ip_src: blade_ip,
        ip_dst: Ipv4Addr::new(10, 1, 0, 1),
        icmp_id: 1,
    }
}

/// Build a reply frame carrying `guid`, ready to `inject` into an
/// [`InMemorySocket`]. Pass the port's own GUID for a "self" reply, any
/// other GUID for a "peer" reply.
pub fn reply_frame(blade_ip: Ipv4Addr, guid: Uuid) -> Vec<u8> {
    let payload = PayloadHeader::new(ProberKind::Software, *guid.as_bytes());
    let mut tail = Vec::new();
    append_sentinel(&mut tail);
    build_frame(&frame_params(blade_ip), 1, &payload, &tail)
}

pub fn default_global() -> GlobalConfig {
    GlobalConfig::default()
}

/// A prober plus the GUID it was constructed with and the socket it reads
/// from, so a test can build both self- and peer-attributed reply frames.
pub fn fresh_prober(blade_ip: Ipv4Addr) -> (SoftwareProber, InMemorySocket, Uuid) {
    let guid = Uuid::new_v4();
    (
        SoftwareProber::new(frame_params(blade_ip), guid, std::time::Duration::from_millis(100)),
        InMemorySocket::new(),
        guid,
    )
}
