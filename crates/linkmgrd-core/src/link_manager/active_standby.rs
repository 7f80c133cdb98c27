//! Active-standby Link Manager: the (Link Prober, MUX, Link) x (Up, Down)
//! transition table (§4.5), reproduced here as a match over the composite
//! state rather than the original's per-cell function-pointer table — same
//! dispatch, idiomatic shape.

use crate::composite::CompositeState;
use crate::config::Mode;
use crate::link_prober::LinkProberState;
use crate::link_state::LinkState;
use crate::mux_state::MuxState;

use super::{next_backoff_factor, LinkManagerAction, SwitchCause, MAX_BACKOFF_FACTOR};

/// Per-port state the active-standby transition table needs beyond the
/// bare composite state: the current back-off factor, the configured mode
/// (manual mode skips automatic switchovers, §4.5), and the bookkeeping
/// needed to tell a freshly-entered `Wait` (switchover not yet requested —
/// e.g. a peer's `SWITCH_ACTIVE` TLV just arrived) from one we ourselves
/// already requested and are only watching land.
pub struct ActiveStandbyLinkManager {
    backoff_factor: u32,
    mode: Mode,
    pending_target: Option<MuxState>,
}

impl ActiveStandbyLinkManager {
    pub fn new(mode: Mode) -> Self {
        Self {
            backoff_factor: 1,
            mode,
            pending_target: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn auto_switch_allowed(&self) -> bool {
        matches!(self.mode, Mode::Auto)
    }

    fn reset_backoff(&mut self) {
        self.backoff_factor = 1;
    }

    /// React to a new composite state, returning the actions the executor
    /// strand should carry out. `next` is already the post-transition
    /// composite state (Link Prober/MUX/Link sub-machines have each
    /// already been updated); this only decides what *this* state implies.
    pub fn on_composite_state(&mut self, next: CompositeState) -> Vec<LinkManagerAction> {
        use LinkProberState as LP;
        use MuxState as MS;

        if next.link == LinkState::Down {
            // Carrier is down: nothing useful to switch, the Link State
            // machine already triggered an immediate switchover if we were
            // active; just make sure we're not holding a stale wait.
            self.reset_backoff();
            self.pending_target = None;
            return vec![LinkManagerAction::ResumeLinkProber];
        }

        match (next.link_prober, next.mux) {
            // Heartbeats say the peer ToR is carrying traffic, but our MUX
            // still points here: switch to standby.
            (LP::Standby, MS::Active) => self.request_switch(MS::Standby, SwitchCause::PeerHeartbeatMissing),

            // Heartbeats are missing entirely while we're supposedly
            // active: same remedy, different cause for the log line.
            (LP::Unknown, MS::Active) => self.request_switch(MS::Standby, SwitchCause::PeerHeartbeatMissing),

            // We're receiving our own heartbeats but the MUX still points
            // at the peer: switch to active.
            (LP::Active, MS::Standby) => self.request_switch(MS::Active, SwitchCause::PeerHeartbeatMissing),

            // MUX state unresolved: ask xcvrd/SWSS to re-probe it and back
            // off while we wait for an answer.
            (LP::Active, MS::Unknown) | (LP::Standby, MS::Unknown) | (LP::Unknown, MS::Unknown) => self.enter_mux_wait(),

            (LP::Active, MS::Error) => self.request_switch(MS::Active, SwitchCause::MatchingHardwareState),
            (LP::Standby, MS::Error) => self.request_switch(MS::Standby, SwitchCause::MatchingHardwareState),

            (LP::Wait, MS::Active) => self.on_wait(MS::Active),
            (LP::Wait, MS::Standby) => self.on_wait(MS::Standby),

            // Still waiting on a MUX answer: re-arm with a larger backoff.
            (LP::Wait, MS::Unknown) => self.enter_mux_wait(),

            // Matching, unresolved, or otherwise steady-state cells
            // (Active/Active, Standby/Standby, Unknown/Standby, Unknown/Error,
            // Wait/Error) need nothing further from us.
            _ => Vec::new(),
        }
    }

    /// Link Prober is in `Wait` and the MUX currently reads `current`.
    /// Either we already know what we're waiting for (`pending_target`
    /// set by [`Self::request_switch`]) and this is progress/completion
    /// toward it, or Link Prober entered `Wait` on its own — a
    /// `SWITCH_ACTIVE` TLV from the peer — and we're the first to decide
    /// what that implies for our own MUX state (§4.5 `Tlv_Switch_Active_Command`).
    fn on_wait(&mut self, current: MuxState) -> Vec<LinkManagerAction> {
        match self.pending_target {
            Some(target) if target == current => {
                self.pending_target = None;
                self.reset_backoff();
                vec![LinkManagerAction::ResumeLinkProber, LinkManagerAction::RestoreProbeInterval]
            }
            Some(_) => Vec::new(),
            None => {
                let target = match current {
                    MuxState::Active => MuxState::Standby,
                    _ => MuxState::Active,
                };
                if !self.auto_switch_allowed() {
                    return Vec::new();
                }
                self.pending_target = Some(target);
                vec![
                    LinkManagerAction::SwitchMuxState {
                        target,
                        cause: SwitchCause::TlvSwitchActiveCommand,
                    },
                    LinkManagerAction::DecreaseProbeInterval,
                ]
            }
        }
    }

    fn request_switch(&mut self, target: MuxState, cause: SwitchCause) -> Vec<LinkManagerAction> {
        if !self.auto_switch_allowed() {
            return Vec::new();
        }
        self.reset_backoff();
        self.pending_target = Some(target);
        vec![
            LinkManagerAction::SwitchMuxState { target, cause },
            LinkManagerAction::RequestSwitchActiveCommand,
            LinkManagerAction::DecreaseProbeInterval,
        ]
    }

    fn enter_mux_wait(&mut self) -> Vec<LinkManagerAction> {
        let factor = next_backoff_factor(self.backoff_factor);
        self.backoff_factor = factor.min(MAX_BACKOFF_FACTOR);
        vec![LinkManagerAction::StartMuxWaitTimer { factor: self.backoff_factor }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cs(lp: LinkProberState, mux: MuxState, link: LinkState) -> CompositeState {
        CompositeState::new(lp, mux, link)
    }

    #[test]
    fn standby_heartbeats_while_mux_active_triggers_switch_to_standby() {
        let mut lm = ActiveStandbyLinkManager::new(Mode::Auto);
        let actions = lm.on_composite_state(cs(LinkProberState::Standby, MuxState::Active, LinkState::Up));
        assert!(actions.contains(&LinkManagerAction::SwitchMuxState {
            target: MuxState::Standby,
            cause: SwitchCause::PeerHeartbeatMissing,
        }));
    }

    #[test]
    fn manual_mode_suppresses_automatic_switch() {
        let mut lm = ActiveStandbyLinkManager::new(Mode::Manual);
        let actions = lm.on_composite_state(cs(LinkProberState::Standby, MuxState::Active, LinkState::Up));
        assert!(actions.is_empty());
    }

    #[test]
    fn wait_confirmed_matching_target_resumes_prober_and_resets_backoff() {
        let mut lm = ActiveStandbyLinkManager::new(Mode::Auto);
        lm.on_composite_state(cs(LinkProberState::Unknown, MuxState::Active, LinkState::Up));
        // SWSS hasn't caught up yet: MUX still reads Active while LP waits.
        let still_waiting = lm.on_composite_state(cs(LinkProberState::Wait, MuxState::Active, LinkState::Up));
        assert!(still_waiting.is_empty());
        // SWSS lands the switch.
        let actions = lm.on_composite_state(cs(LinkProberState::Wait, MuxState::Standby, LinkState::Up));
        assert!(actions.contains(&LinkManagerAction::ResumeLinkProber));
        assert!(actions.contains(&LinkManagerAction::RestoreProbeInterval));
    }

    #[test]
    fn tlv_initiated_wait_while_mux_active_switches_to_standby() {
        let mut lm = ActiveStandbyLinkManager::new(Mode::Auto);
        // Link Prober entered Wait on its own (a SWITCH_ACTIVE TLV arrived)
        // without any prior request_switch call.
        let actions = lm.on_composite_state(cs(LinkProberState::Wait, MuxState::Active, LinkState::Up));
        assert!(actions.contains(&LinkManagerAction::SwitchMuxState {
            target: MuxState::Standby,
            cause: SwitchCause::TlvSwitchActiveCommand,
        }));
    }

    #[test]
    fn repeated_mux_unknown_waits_escalate_backoff_up_to_cap() {
        let mut lm = ActiveStandbyLinkManager::new(Mode::Auto);
        for _ in 0..20 {
            lm.on_composite_state(cs(LinkProberState::Wait, MuxState::Unknown, LinkState::Up));
        }
        assert_eq!(lm.backoff_factor, MAX_BACKOFF_FACTOR);
    }

    #[test]
    fn link_down_resets_backoff_and_resumes_prober() {
        let mut lm = ActiveStandbyLinkManager::new(Mode::Auto);
        lm.on_composite_state(cs(LinkProberState::Wait, MuxState::Unknown, LinkState::Up));
        let actions = lm.on_composite_state(cs(LinkProberState::Unknown, MuxState::Unknown, LinkState::Down));
        assert_eq!(lm.backoff_factor, 1);
        assert!(actions.contains(&LinkManagerAction::ResumeLinkProber));
    }
}
