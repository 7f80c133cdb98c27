//! End-to-end scenarios from the testable-properties list (§8): each
//! drives a [`Port`] (and, where the property is about KV visibility, a
//! [`MuxManager`] in front of an [`InMemoryKv`]) through a realistic event
//! sequence and checks the externally-observable outcome rather than
//! internal state.

use std::sync::Arc;

use linkmgrd_core::composite::Health;
use linkmgrd_core::config::{GlobalConfig, Mode, PortCableType};
use linkmgrd_core::kv::KvTable;
use linkmgrd_core::link_manager::{LinkManagerAction, SwitchCause};
use linkmgrd_core::link_prober::LinkProberEvent;
use linkmgrd_core::link_state::LinkStateEvent;
use linkmgrd_core::mux_manager::MuxManager;
use linkmgrd_core::mux_state::MuxStateEvent;
use linkmgrd_core::port::Port;

use linkmgrd_scenario_tests::{default_global, port_config};

fn new_port(name: &str, cable_type: PortCableType, mode: Mode, global: &GlobalConfig) -> Port {
    Port::new(
        port_config(name, cable_type, mode),
        global.positive_signal_count,
        global.negative_signal_count,
    )
}

/// S1: clean active. Link comes up, self heartbeats confirm before SWSS
/// reports the MUX state, and nothing ever needs switching.
#[test]
fn s1_clean_active_reaches_healthy_without_a_switch() {
    let global = default_global();
    let mut port = new_port("Ethernet0", PortCableType::ActiveStandby, Mode::Auto, &global);

    port.handle_link_state_event(LinkStateEvent::CarrierUp);
    assert_eq!(port.composite_state().health(), Health::Uninitialized);

    let actions = port.handle_link_prober_event(LinkProberEvent::IcmpSelf);
    assert_eq!(port.composite_state().health(), Health::Unhealthy);
    assert!(
        !actions.iter().any(|a| matches!(a, LinkManagerAction::SwitchMuxState { .. })),
        "self heartbeat confirming while MUX is still Unknown must not trigger a switch"
    );

    let actions = port.handle_mux_state_event(MuxStateEvent::NotifyActive);
    assert_eq!(port.composite_state().health(), Health::Healthy);
    assert!(
        actions.is_empty(),
        "landing on a MUX state that already matches Link Prober needs no further action"
    );
}

/// S2: peer takeover on heartbeat loss. A healthy active port stops
/// hearing its own heartbeats; after `negative_signal_count` misses it
/// must request standby, publish exactly that target to the KV row, and
/// land healthy again once SWSS confirms the write.
#[tokio::test]
async fn s2_peer_takeover_publishes_standby_exactly_once() {
    let global = default_global();
    let kv: Arc<dyn KvTable> = linkmgrd_kv::InMemoryKv::new("MUX_CABLE_TABLE");
    let mut mgr = MuxManager::new(global.clone(), kv.clone());
    let port_name = "Ethernet0".to_string();
    mgr.ensure_port(port_config(&port_name, PortCableType::ActiveStandby, Mode::Auto));
    let handle = mgr.spawn();

    handle
        .dispatch_link_state_event(port_name.clone(), LinkStateEvent::CarrierUp)
        .unwrap();
    handle
        .dispatch_link_prober_event(port_name.clone(), LinkProberEvent::IcmpSelf)
        .unwrap();
    handle
        .dispatch_mux_state_event(port_name.clone(), MuxStateEvent::NotifyActive)
        .unwrap();

    // No write yet: the port is healthy and settled.
    assert!(kv.get(&port_name).is_none());

    for _ in 0..global.negative_signal_count {
        handle
            .dispatch_link_prober_event(port_name.clone(), LinkProberEvent::IcmpUnknown)
            .unwrap();
    }
    // `shutdown` drains every job already queued on the strand before it
    // acknowledges, so awaiting it here is a cheap barrier that guarantees
    // the dispatches above have actually run.
    handle.shutdown().await;

    let fields = kv.get(&port_name).expect("standby switch must have published a row");
    assert_eq!(fields.get("state").map(String::as_str), Some("standby"));
}

/// S3: TLV switch command. While healthy active, an externally-received
/// `SWITCH_ACTIVE` TLV (surfaced as [`LinkProberEvent::SwitchActiveRequest`])
/// must be recognized as an unsolicited request and answered with a switch
/// to standby, not mistaken for the completion of a switch we initiated
/// ourselves.
#[test]
fn s3_tlv_switch_command_triggers_switch_to_standby() {
    let global = default_global();
    let mut port = new_port("Ethernet0", PortCableType::ActiveStandby, Mode::Auto, &global);
    port.handle_link_state_event(LinkStateEvent::CarrierUp);
    port.handle_link_prober_event(LinkProberEvent::IcmpSelf);
    port.handle_mux_state_event(MuxStateEvent::NotifyActive);
    assert_eq!(port.composite_state().health(), Health::Healthy);

    let actions = port.handle_link_prober_event(LinkProberEvent::SwitchActiveRequest);
    assert!(actions.contains(&LinkManagerAction::SwitchMuxState {
        target: linkmgrd_core::mux_state::MuxState::Standby,
        cause: SwitchCause::TlvSwitchActiveCommand,
    }));
}

/// S4: warm-restart reconciliation. Five ports come up in "manual" mode
/// (as a warm-restarted process would find them, already configured away
/// from `Auto` from before the restart); once the reconciliation timer
/// fires, every one of them must be rewritten to "auto" exactly once and
/// the service must report itself reconciled.
#[tokio::test]
async fn s4_warm_restart_reconciliation_forces_five_ports_to_auto() {
    let mut global = default_global();
    global.mux_reconciliation_timeout = std::time::Duration::from_millis(50);
    let kv: Arc<dyn KvTable> = linkmgrd_kv::InMemoryKv::new("MUX_CABLE_TABLE");
    let mut mgr = MuxManager::new(global, kv.clone());
    let port_names: Vec<String> = (0..5).map(|i| format!("Ethernet{}", i * 4)).collect();
    for name in &port_names {
        mgr.ensure_port(port_config(name, PortCableType::ActiveStandby, Mode::Manual));
    }
    let handle = mgr.spawn();

    handle.start_warm_restart_reconciliation_timer(port_names.len()).unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    assert!(handle.is_reconciled().await, "service must report itself reconciled after the timer fires");
    for name in &port_names {
        assert_eq!(
            handle.port_mode(name.clone()).await,
            Some(Mode::Auto),
            "{name} must be rewritten to auto"
        );
        assert_eq!(
            kv.get(name).and_then(|fields| fields.get("mode").cloned()),
            Some("auto".to_string()),
            "{name}'s config-DB mode must be published as auto exactly once"
        );
    }
}

/// S5: active-active ports toggle independently. Losing our own heartbeats
/// must drop this leg to standby regardless of what the peer leg is doing;
/// there's no mutual-exclusion table to consult, unlike active-standby.
#[test]
fn s5_active_active_leg_switches_independently_of_peer() {
    let global = default_global();
    let mut port = new_port("Ethernet4", PortCableType::ActiveActive, Mode::Auto, &global);
    port.handle_link_state_event(LinkStateEvent::CarrierUp);
    port.handle_link_prober_event(LinkProberEvent::IcmpSelf);
    port.handle_mux_state_event(MuxStateEvent::NotifyActive);
    assert_eq!(port.composite_state().health(), Health::Healthy);

    let mut actions = Vec::new();
    for _ in 0..global.negative_signal_count {
        actions = port.handle_link_prober_event(LinkProberEvent::IcmpUnknown);
    }
    assert!(actions.contains(&LinkManagerAction::SwitchMuxState {
        target: linkmgrd_core::mux_state::MuxState::Standby,
        cause: SwitchCause::PeerHeartbeatMissing,
    }));
}

/// S6: oscillation guard clamp. Thin restatement of the unit-level
/// coverage in `linkmgrd-core::config` at the point a daemon would apply a
/// config override — low values clamp up to the floor, values already
/// above it pass through untouched.
#[test]
fn s6_oscillation_interval_clamp_applies_at_config_time() {
    let mut global = GlobalConfig::default();
    global.set_oscillation_interval(std::time::Duration::from_secs(1), false);
    assert_eq!(global.oscillation_interval(), std::time::Duration::from_secs(300));

    let mut global = GlobalConfig::default();
    global.set_oscillation_interval(std::time::Duration::from_secs(1200), false);
    assert_eq!(global.oscillation_interval(), std::time::Duration::from_secs(1200));
}
