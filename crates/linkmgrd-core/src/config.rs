//! Per-port and global configuration (§3, §6).

use std::net::Ipv4Addr;
use std::time::Duration;

use crate::error::ConfigError;

/// Fixed at first observation of the cable-table row; defaults to
/// `ActiveStandby` if the row is malformed (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortCableType {
    ActiveStandby,
    ActiveActive,
}

impl Default for PortCableType {
    fn default() -> Self {
        PortCableType::ActiveStandby
    }
}

impl PortCableType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "active-active" => PortCableType::ActiveActive,
            "active-standby" => PortCableType::ActiveStandby,
            other => {
                log::warn!("unrecognized cable_type {other:?}, defaulting to active-standby");
                PortCableType::ActiveStandby
            }
        }
    }
}

/// Whether the heartbeat is sent in userspace software or provisioned into
/// hardware-offloaded ICMP sessions (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkFailureDetectionType {
    Software,
    Hardware,
}

impl LinkFailureDetectionType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "hardware" => LinkFailureDetectionType::Hardware,
            "software" => LinkFailureDetectionType::Software,
            other => {
                log::warn!("unrecognized link_failure_detection_type {other:?}, defaulting to software");
                LinkFailureDetectionType::Software
            }
        }
    }
}

/// Operating mode for a port's MUX switchover behavior (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Auto,
    Manual,
    Active,
    Standby,
}

impl Mode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "auto" => Some(Mode::Auto),
            "manual" => Some(Mode::Manual),
            "active" => Some(Mode::Active),
            "standby" => Some(Mode::Standby),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Auto => "auto",
            Mode::Manual => "manual",
            Mode::Active => "active",
            Mode::Standby => "standby",
        }
    }
}

/// Per-port tunables (§3). Mutated only on the executor strand; read by the
/// heartbeat engine and state machine.
#[derive(Debug, Clone)]
pub struct PortConfig {
    pub port_name: String,
    pub server_id: u32,
    pub blade_ipv4: Ipv4Addr,
    pub blade_mac: Option<[u8; 6]>,
    pub well_known_mac: [u8; 6],
    pub tor_mac: [u8; 6],
    pub vlan_mac: Option<[u8; 6]>,
    pub loopback_src_ipv4: Ipv4Addr,
    pub mode: Mode,
    pub cable_type: PortCableType,
    pub link_failure_detection_type: LinkFailureDetectionType,
}

impl PortConfig {
    /// MAC used as the Ethernet source on outbound heartbeats: ToR MAC when
    /// `use_tor_mac_as_src_mac` is set, VLAN MAC otherwise (§3, §4.1). Only
    /// re-read at frame-build time, never re-evaluated eagerly on a config
    /// write — see Open Question 3 in DESIGN.md.
    pub fn heartbeat_src_mac(&self, use_tor_mac_as_src_mac: bool) -> [u8; 6] {
        if use_tor_mac_as_src_mac {
            self.tor_mac
        } else {
            self.vlan_mac.unwrap_or(self.tor_mac)
        }
    }

    /// MAC used as the Ethernet destination on outbound heartbeats: the
    /// well-known per-server MAC for active-active ports when
    /// `use_well_known_mac` is enabled, otherwise the blade's own resolved
    /// MAC (falling back to the well-known MAC until neighbor resolution
    /// reports one, since there is nothing else to send to yet) (§3, §4.1).
    pub fn heartbeat_dst_mac(&self, use_well_known_mac: bool) -> [u8; 6] {
        if self.cable_type == PortCableType::ActiveActive && use_well_known_mac {
            self.well_known_mac
        } else {
            self.blade_mac.unwrap_or(self.well_known_mac)
        }
    }
}

/// Global tunables from the `mux linkmgr` table (§6), with the exact
/// defaults and clamps carried over from `common::MuxConfig`.
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    pub interval_v4: Duration,
    pub interval_v6: Duration,
    pub positive_signal_count: u32,
    pub negative_signal_count: u32,
    pub decreased_interval_v4: Duration,
    pub mux_state_change_retry_count: u32,
    pub link_state_change_retry_count: u32,
    pub link_prober_stat_update_interval_count: u32,
    suspend_timeout_override: Option<Duration>,
    oscillation_interval: Duration,
    pub mux_reconciliation_timeout: Duration,
    pub use_well_known_mac: bool,
    pub use_tor_mac_as_src_mac: bool,
    pub enable_switchover_measurement: bool,
    pub enable_default_route_feature: bool,
}

/// Minimum oscillation interval; any configured value at or below this is
/// clamped up to it unless `force` is set (§3, §6, S6).
pub const MIN_OSCILLATION_INTERVAL: Duration = Duration::from_secs(300);

/// Loopback source IPv4 used before any `loopback interface` row has
/// arrived (§3, `common::MuxConfig`).
pub const DEFAULT_LOOPBACK_SRC_IPV4: Ipv4Addr = Ipv4Addr::new(10, 212, 64, 0);

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            interval_v4: Duration::from_millis(100),
            interval_v6: Duration::from_millis(1000),
            positive_signal_count: 1,
            negative_signal_count: 3,
            decreased_interval_v4: Duration::from_millis(10),
            mux_state_change_retry_count: 1,
            link_state_change_retry_count: 1,
            link_prober_stat_update_interval_count: 300,
            suspend_timeout_override: None,
            oscillation_interval: MIN_OSCILLATION_INTERVAL,
            mux_reconciliation_timeout: Duration::from_secs(10),
            use_well_known_mac: true,
            use_tor_mac_as_src_mac: false,
            enable_switchover_measurement: false,
            enable_default_route_feature: false,
        }
    }
}

impl GlobalConfig {
    /// Suspend timer: explicit override if set, else
    /// `(negative_signal_count + 1) * interval_v4`.
    pub fn suspend_timeout(&self) -> Duration {
        self.suspend_timeout_override
            .unwrap_or(self.interval_v4 * (self.negative_signal_count + 1))
    }

    pub fn set_suspend_timeout(&mut self, timeout: Duration) {
        self.suspend_timeout_override = Some(timeout);
    }

    pub fn oscillation_interval(&self) -> Duration {
        self.oscillation_interval
    }

    /// Set the oscillation interval, clamping up to
    /// [`MIN_OSCILLATION_INTERVAL`] unless `force` is set (S6).
    pub fn set_oscillation_interval(&mut self, requested: Duration, force: bool) {
        self.oscillation_interval = if force || requested > MIN_OSCILLATION_INTERVAL {
            requested
        } else {
            MIN_OSCILLATION_INTERVAL
        };
    }

    pub fn set_link_prober_stat_update_interval_count(&mut self, count: u32) {
        self.link_prober_stat_update_interval_count = count.max(50);
    }
}

/// Parse a dotted-decimal IPv4 address from a KV field, mapping failures to
/// [`ConfigError::BadAddress`] (§7: "bad IP ⇒ log fatal and keep defaults").
pub fn parse_ipv4(field: &'static str, raw: &str) -> Result<Ipv4Addr, ConfigError> {
    raw.parse()
        .map_err(|source| ConfigError::BadAddress { field, source })
}

/// Parse a colon-separated MAC address (`"aa:bb:cc:dd:ee:ff"`).
pub fn parse_mac(field: &'static str, raw: &str) -> Result<[u8; 6], ConfigError> {
    let mut out = [0u8; 6];
    let mut parts = raw.split(':');
    for slot in out.iter_mut() {
        let part = parts.next().ok_or_else(|| ConfigError::BadMac {
            field,
            value: raw.to_string(),
        })?;
        *slot = u8::from_str_radix(part, 16).map_err(|_| ConfigError::BadMac {
            field,
            value: raw.to_string(),
        })?;
    }
    if parts.next().is_some() {
        return Err(ConfigError::BadMac {
            field,
            value: raw.to_string(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oscillation_clamps_low_values_up_to_300() {
        let mut cfg = GlobalConfig::default();
        cfg.set_oscillation_interval(Duration::from_secs(1), false);
        assert_eq!(cfg.oscillation_interval(), Duration::from_secs(300));
    }

    #[test]
    fn oscillation_preserves_large_values() {
        let mut cfg = GlobalConfig::default();
        cfg.set_oscillation_interval(Duration::from_secs(1200), false);
        assert_eq!(cfg.oscillation_interval(), Duration::from_secs(1200));
    }

    #[test]
    fn oscillation_force_bypasses_clamp() {
        let mut cfg = GlobalConfig::default();
        cfg.set_oscillation_interval(Duration::from_secs(1), true);
        assert_eq!(cfg.oscillation_interval(), Duration::from_secs(1));
    }

    #[test]
    fn suspend_timeout_derives_from_negative_count() {
        let cfg = GlobalConfig::default();
        assert_eq!(cfg.suspend_timeout(), Duration::from_millis(400));
    }

    #[test]
    fn bad_cable_type_falls_back_to_active_standby() {
        assert_eq!(PortCableType::parse("garbage"), PortCableType::ActiveStandby);
    }

    #[test]
    fn bad_link_failure_detection_type_falls_back_to_software() {
        assert_eq!(LinkFailureDetectionType::parse("garbage"), LinkFailureDetectionType::Software);
        assert_eq!(LinkFailureDetectionType::parse("hardware"), LinkFailureDetectionType::Hardware);
    }

    #[test]
    fn mac_parses_and_rejects_malformed() {
        assert_eq!(
            parse_mac("test", "aa:bb:cc:dd:ee:ff").unwrap(),
            [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]
        );
        assert!(parse_mac("test", "not-a-mac").is_err());
    }

    fn port(cable_type: PortCableType) -> PortConfig {
        PortConfig {
            port_name: "Ethernet0".to_string(),
            server_id: 1,
            blade_ipv4: Ipv4Addr::new(10, 0, 0, 2),
            blade_mac: None,
            well_known_mac: [0x04, 0x27, 0x28, 0x7A, 0x00, 0x01],
            tor_mac: [0xAA; 6],
            vlan_mac: Some([0xBB; 6]),
            loopback_src_ipv4: Ipv4Addr::new(10, 1, 0, 1),
            mode: Mode::Auto,
            cable_type,
            link_failure_detection_type: LinkFailureDetectionType::Software,
        }
    }

    #[test]
    fn src_mac_prefers_tor_mac_when_enabled() {
        let cfg = port(PortCableType::ActiveStandby);
        assert_eq!(cfg.heartbeat_src_mac(true), cfg.tor_mac);
        assert_eq!(cfg.heartbeat_src_mac(false), cfg.vlan_mac.unwrap());
    }

    #[test]
    fn src_mac_falls_back_to_tor_mac_without_vlan_mac() {
        let mut cfg = port(PortCableType::ActiveStandby);
        cfg.vlan_mac = None;
        assert_eq!(cfg.heartbeat_src_mac(false), cfg.tor_mac);
    }

    #[test]
    fn dst_mac_uses_well_known_mac_only_for_active_active() {
        let mut cfg = port(PortCableType::ActiveActive);
        cfg.blade_mac = Some([0xCC; 6]);
        assert_eq!(cfg.heartbeat_dst_mac(true), cfg.well_known_mac);
        assert_eq!(cfg.heartbeat_dst_mac(false), [0xCC; 6]);

        let standby = port(PortCableType::ActiveStandby);
        assert_eq!(standby.heartbeat_dst_mac(true), standby.well_known_mac);
    }

    #[test]
    fn dst_mac_falls_back_to_well_known_mac_before_resolution() {
        let cfg = port(PortCableType::ActiveStandby);
        assert_eq!(cfg.heartbeat_dst_mac(false), cfg.well_known_mac);
    }
}
