//! A single MUX cable port: the owner of one Link Prober, MUX State, Link
//! State, and Link Manager quadruple (§4).

use crate::composite::CompositeState;
use crate::config::{Mode, PortCableType, PortConfig};
use crate::link_manager::active_active::ActiveActiveLinkManager;
use crate::link_manager::active_standby::ActiveStandbyLinkManager;
use crate::link_manager::LinkManagerAction;
use crate::link_prober::{LinkProber, LinkProberEvent};
use crate::link_state::{LinkStateEvent, LinkStateMachine};
use crate::mux_state::{MuxStateEvent, MuxStateMachine};

/// Either flavor of Link Manager, selected once at port creation from the
/// port's configured cable type and never swapped afterwards (§4.5/§4.6).
enum Manager {
    ActiveStandby(ActiveStandbyLinkManager),
    ActiveActive(ActiveActiveLinkManager),
}

pub struct Port {
    pub config: PortConfig,
    link_prober: LinkProber,
    mux_state: MuxStateMachine,
    link_state: LinkStateMachine,
    manager: Manager,
}

impl Port {
    pub fn new(config: PortConfig, positive_signal_count: u32, negative_signal_count: u32) -> Self {
        let manager = match config.cable_type {
            PortCableType::ActiveStandby => Manager::ActiveStandby(ActiveStandbyLinkManager::new(config.mode)),
            PortCableType::ActiveActive => Manager::ActiveActive(ActiveActiveLinkManager::new()),
        };
        Self {
            link_prober: LinkProber::new(config.cable_type, positive_signal_count, negative_signal_count),
            mux_state: MuxStateMachine::new(),
            link_state: LinkStateMachine::new(),
            manager,
            config,
        }
    }

    pub fn composite_state(&self) -> CompositeState {
        CompositeState::new(self.link_prober.state(), self.mux_state.state(), self.link_state.state())
    }

    pub fn name(&self) -> &str {
        &self.config.port_name
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.config.mode = mode;
        if let Manager::ActiveStandby(ref mut lm) = self.manager {
            lm.set_mode(mode);
        }
    }

    /// Feed a Link Prober event (from the heartbeat engine) through the
    /// sub-machine and, on a state change, consult the Link Manager for
    /// follow-up actions.
    pub fn handle_link_prober_event(&mut self, event: LinkProberEvent) -> Vec<LinkManagerAction> {
        if self.link_prober.handle_event(event).is_some() {
            self.dispatch()
        } else {
            Vec::new()
        }
    }

    pub fn handle_mux_state_event(&mut self, event: MuxStateEvent) -> Vec<LinkManagerAction> {
        if self.mux_state.handle_event(event).is_some() {
            self.dispatch()
        } else {
            Vec::new()
        }
    }

    pub fn handle_link_state_event(&mut self, event: LinkStateEvent) -> Vec<LinkManagerAction> {
        let currently_active = self.mux_state.state() == crate::mux_state::MuxState::Active;
        if self.link_state.handle_event(event, currently_active).is_some() {
            self.dispatch()
        } else {
            Vec::new()
        }
    }

    /// Consult the Link Manager for the current composite state and apply
    /// any follow-up it requests of the Link Prober itself —
    /// `RequestSwitchActiveCommand` drives Link Prober into `Wait` (same as
    /// an externally-received `SWITCH_ACTIVE` TLV would), `ResumeLinkProber`
    /// releases it back out of `Wait` once the switch has landed. Either
    /// can produce a further composite-state change the Link Manager needs
    /// to see, so this recurses — each of the two events only ever fires
    /// once per switchover, so it terminates within a couple of rounds.
    fn dispatch(&mut self) -> Vec<LinkManagerAction> {
        let next = self.composite_state();
        let mut actions = match &mut self.manager {
            Manager::ActiveStandby(lm) => lm.on_composite_state(next),
            Manager::ActiveActive(lm) => lm.on_composite_state(next),
        };

        let mut followup = None;
        if actions.contains(&LinkManagerAction::RequestSwitchActiveCommand) {
            followup = Some(LinkProberEvent::SwitchActiveRequest);
        } else if actions.contains(&LinkManagerAction::ResumeLinkProber) {
            followup = Some(LinkProberEvent::SwitchActiveCommandComplete);
        }

        if let Some(event) = followup {
            if self.link_prober.handle_event(event).is_some() {
                actions.extend(self.dispatch());
            }
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn config() -> PortConfig {
        PortConfig {
            port_name: "Ethernet0".to_string(),
            server_id: 0,
            blade_ipv4: Ipv4Addr::new(10, 0, 0, 1),
            blade_mac: None,
            well_known_mac: [0x04, 0x27, 0x28, 0x7A, 0x00, 0x00],
            tor_mac: [0, 1, 2, 3, 4, 5],
            vlan_mac: None,
            loopback_src_ipv4: Ipv4Addr::new(10, 1, 0, 1),
            mode: Mode::Auto,
            cable_type: PortCableType::ActiveStandby,
            link_failure_detection_type: crate::config::LinkFailureDetectionType::Software,
        }
    }

    #[test]
    fn self_heartbeat_confirms_active_and_requires_no_action_when_mux_already_active() {
        let mut port = Port::new(config(), 1, 3);
        port.handle_link_state_event(LinkStateEvent::CarrierUp);
        port.handle_mux_state_event(MuxStateEvent::NotifyActive);
        let actions = port.handle_link_prober_event(LinkProberEvent::IcmpSelf);
        assert!(actions.is_empty());
    }

    #[test]
    fn heartbeat_missing_while_mux_active_requests_switch_to_standby() {
        let mut port = Port::new(config(), 1, 3);
        port.handle_link_state_event(LinkStateEvent::CarrierUp);
        port.handle_mux_state_event(MuxStateEvent::NotifyActive);
        port.handle_link_prober_event(LinkProberEvent::IcmpUnknown);
        port.handle_link_prober_event(LinkProberEvent::IcmpUnknown);
        let actions = port.handle_link_prober_event(LinkProberEvent::IcmpUnknown);
        assert!(!actions.is_empty());
    }
}
