//! Wires the KV boundary and the heartbeat engine into a running
//! [`MuxManager`] (§2): translates `mux cable` rows into ports, starts one
//! heartbeat I/O loop per port, and drives warm-restart reconciliation.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use linkmgrd_core::config::{parse_ipv4, GlobalConfig, LinkFailureDetectionType, Mode, PortCableType, PortConfig};
use linkmgrd_core::guid::generate_unique_guid;
use linkmgrd_core::heartbeat::{IcmpSocket, RawEthernetSocket, SoftwareProber};
use linkmgrd_core::icmp::FrameParams;
use linkmgrd_core::kv::{KvNotification, KvSubscriber};
use linkmgrd_core::link_prober::LinkProberEvent;
use linkmgrd_core::mac::{server_id_from_port_name, well_known_mac};
use linkmgrd_core::mux_manager::MuxManagerHandle;

/// Device-wide fields the cable table doesn't carry per port: the ToR's own
/// MAC (`device metadata`), the VLAN MAC it falls back to as heartbeat
/// source when the ToR MAC isn't pinned (`vlan`), and the loopback source
/// address used for outbound ICMP (`loopback interface`) (§6).
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub tor_mac: [u8; 6],
    pub vlan_mac: Option<[u8; 6]>,
    pub loopback_src_ipv4: Ipv4Addr,
}

/// Build a [`PortConfig`] from one `mux cable` row (§6: `server_ipv4,
/// server_ipv6, soc_ipv4, cable_type, link_failure_detection_type, state`).
/// `server_ipv4` is "blade IPv4" under this crate's naming (§3) — `server`
/// in the cable table refers to the blade, not this ToR. `server_ipv6` and
/// `soc_ipv4` are accepted on the row but not yet modeled in `PortConfig`:
/// this build's heartbeat engine is IPv4-only and has no SoC NIC path,
/// matching the rest of `linkmgrd-core` (see DESIGN.md).
///
/// Returns `None` (logging why) when the row is missing the one field that
/// can't be defaulted — the blade's own IPv4 address, since there's nothing
/// to send heartbeats to without it.
pub fn port_config_from_row(port_name: &str, fields: &HashMap<String, String>, device: &DeviceConfig) -> Option<PortConfig> {
    let server_id = match server_id_from_port_name(port_name) {
        Some(id) => id,
        None => {
            log::error!("{port_name}: cannot derive server_id from port name, skipping");
            return None;
        }
    };
    let blade_ipv4 = match fields.get("server_ipv4") {
        Some(raw) => match parse_ipv4("server_ipv4", raw) {
            Ok(addr) => addr,
            Err(err) => {
                log::error!("{port_name}: {err}, skipping port");
                return None;
            }
        },
        None => {
            log::error!("{port_name}: mux cable row missing server_ipv4, skipping port");
            return None;
        }
    };
    let well_known = match well_known_mac(server_id) {
        Ok(mac) => mac,
        Err(err) => {
            log::error!("{port_name}: {err}, skipping port");
            return None;
        }
    };
    let cable_type = fields.get("cable_type").map(String::as_str).map(PortCableType::parse).unwrap_or_default();
    let link_failure_detection_type = fields
        .get("link_failure_detection_type")
        .map(String::as_str)
        .map(LinkFailureDetectionType::parse)
        .unwrap_or(LinkFailureDetectionType::Software);
    let mode = fields.get("state").and_then(|raw| Mode::parse(raw)).unwrap_or(Mode::Auto);

    Some(PortConfig {
        port_name: port_name.to_string(),
        server_id,
        blade_ipv4,
        blade_mac: None,
        well_known_mac: well_known,
        tor_mac: device.tor_mac,
        vlan_mac: device.vlan_mac,
        loopback_src_ipv4: device.loopback_src_ipv4,
        mode,
        cable_type,
        link_failure_detection_type,
    })
}

/// Consume `mux cable` notifications for the lifetime of the process,
/// creating ports on first reference and starting a heartbeat loop for
/// each one (§2, §4.7). Each row processed during the initial snapshot
/// counts against the warm-restart reconciliation counter; rows that
/// arrive afterwards (a port added at runtime) don't, since reconciliation
/// only concerns ports that existed when the process started.
pub async fn run_cable_subscriber(
    handle: MuxManagerHandle,
    mut subscriber: Box<dyn KvSubscriber>,
    device: DeviceConfig,
    global: GlobalConfig,
    counts_toward_reconciliation: bool,
) {
    while let Some(notification) = subscriber.recv().await {
        let KvNotification { key, fields, .. } = notification;
        if fields.is_empty() {
            log::debug!("{key}: mux cable row deleted, leaving port in place");
            continue;
        }
        let Some(config) = port_config_from_row(&key, &fields, &device) else {
            if counts_toward_reconciliation {
                let _ = handle.adjust_reconciliation_count(-1);
            }
            continue;
        };
        let port_name = config.port_name.clone();
        let blade_ipv4 = config.blade_ipv4;
        let frame_params = FrameParams {
            eth_dst: config.heartbeat_dst_mac(global.use_well_known_mac),
            eth_src: config.heartbeat_src_mac(global.use_tor_mac_as_src_mac),
            ip_src: config.loopback_src_ipv4,
            ip_dst: blade_ipv4,
            icmp_id: config.server_id as u16,
        };
        if handle.ensure_port(config).is_err() {
            log::warn!("{port_name}: strand already shut down, dropping cable row");
            break;
        }
        if counts_toward_reconciliation {
            let _ = handle.adjust_reconciliation_count(-1);
        }
        match RawEthernetSocket::open(&port_name) {
            Ok(socket) => {
                let prober = SoftwareProber::new(frame_params, generate_unique_guid(), global.interval_v4);
                tokio::spawn(heartbeat_loop(handle.clone(), port_name, prober, Box::new(socket), blade_ipv4));
            }
            Err(err) => {
                log::error!("{port_name}: heartbeat socket unavailable, port will only react to external events: {err}");
            }
        }
    }
    log::warn!("mux cable subscriber channel closed");
}

/// One port's heartbeat I/O loop (§4.1): send a probe every tick, drain
/// whatever replies are queued, and feed the resulting events onto the
/// strand. Runs until the socket is dropped or the strand shuts down.
pub async fn heartbeat_loop(
    handle: MuxManagerHandle,
    port_name: String,
    mut prober: SoftwareProber,
    mut socket: Box<dyn IcmpSocket>,
    expected_src: Ipv4Addr,
) {
    let mut ticker = tokio::time::interval(prober.interval());
    loop {
        ticker.tick().await;
        if let Err(err) = prober.send_probe(socket.as_mut(), None) {
            log::warn!("{port_name}: heartbeat send failed, retrying next cycle: {err}");
            continue;
        }
        match prober.poll(socket.as_mut(), expected_src) {
            Ok(result) => {
                for event in result.events {
                    if dispatch(&handle, &port_name, event).is_err() {
                        log::warn!("{port_name}: strand closed, stopping heartbeat loop");
                        return;
                    }
                }
            }
            Err(err) => log::warn!("{port_name}: heartbeat poll failed, retrying next cycle: {err}"),
        }
    }
}

fn dispatch(handle: &MuxManagerHandle, port_name: &str, event: LinkProberEvent) -> Result<(), linkmgrd_core::MuxManagerError> {
    handle.dispatch_link_prober_event(port_name.to_string(), event)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceConfig {
        DeviceConfig {
            tor_mac: [0, 1, 2, 3, 4, 5],
            vlan_mac: None,
            loopback_src_ipv4: Ipv4Addr::new(10, 1, 0, 1),
        }
    }

    #[test]
    fn row_with_required_fields_builds_a_port_config() {
        let mut fields = HashMap::new();
        fields.insert("server_ipv4".to_string(), "192.168.0.1".to_string());
        fields.insert("cable_type".to_string(), "active-active".to_string());
        fields.insert("link_failure_detection_type".to_string(), "software".to_string());
        fields.insert("state".to_string(), "manual".to_string());

        let config = port_config_from_row("Ethernet4", &fields, &device()).unwrap();
        assert_eq!(config.server_id, 4);
        assert_eq!(config.blade_ipv4, Ipv4Addr::new(192, 168, 0, 1));
        assert_eq!(config.cable_type, PortCableType::ActiveActive);
        assert_eq!(config.mode, Mode::Manual);
        assert_eq!(config.tor_mac, device().tor_mac);
    }

    #[test]
    fn row_missing_server_ipv4_is_rejected() {
        let fields = HashMap::new();
        assert!(port_config_from_row("Ethernet0", &fields, &device()).is_none());
    }

    #[test]
    fn row_with_unparseable_port_name_is_rejected() {
        let mut fields = HashMap::new();
        fields.insert("server_ipv4".to_string(), "192.168.0.1".to_string());
        assert!(port_config_from_row("PortChannel", &fields, &device()).is_none());
    }

    #[test]
    fn missing_optional_fields_fall_back_to_defaults() {
        let mut fields = HashMap::new();
        fields.insert("server_ipv4".to_string(), "192.168.0.1".to_string());
        let config = port_config_from_row("Ethernet0", &fields, &device()).unwrap();
        assert_eq!(config.cable_type, PortCableType::ActiveStandby);
        assert_eq!(config.mode, Mode::Auto);
    }
}
