//! Active-active Link Manager (§4.6): both ToRs may be MUX-active at once,
//! so each side reacts only to its own Link Prober classification plus
//! whatever it currently knows about the peer's, instead of the mutually
//! exclusive active/standby table.

use crate::composite::CompositeState;
use crate::link_prober::{LinkProberState, PeerLinkProberState};
use crate::link_state::LinkState;
use crate::mux_state::MuxState;

use super::{LinkManagerAction, SwitchCause};

pub struct ActiveActiveLinkManager {
    peer_state: PeerLinkProberState,
}

impl ActiveActiveLinkManager {
    pub fn new() -> Self {
        Self {
            peer_state: PeerLinkProberState::Unknown,
        }
    }

    pub fn note_peer_state(&mut self, peer_state: PeerLinkProberState) {
        self.peer_state = peer_state;
    }

    /// React to a composite state change. `next` is taken by value and used
    /// immediately rather than stashed for a later callback: the original
    /// active-active handler captured the composite state snapshot and
    /// read it back after an intervening mutation, so a stale Link Prober
    /// label could decide a transition that no longer matched reality. We
    /// decide everything off the `next` passed in for *this* call only.
    pub fn on_composite_state(&mut self, next: CompositeState) -> Vec<LinkManagerAction> {
        match (next.link_prober, next.mux, next.link) {
            // We can't reach our own ToR over the cable: go standby here
            // regardless of what the peer is doing, traffic still has the
            // other leg.
            (LinkProberState::Unknown, MuxState::Active, LinkState::Up) => vec![
                LinkManagerAction::SwitchMuxState {
                    target: MuxState::Standby,
                    cause: SwitchCause::PeerHeartbeatMissing,
                },
            ],

            // We can reach our own ToR again: reclaim active on this leg.
            (LinkProberState::Active, MuxState::Standby, LinkState::Up) => vec![
                LinkManagerAction::SwitchMuxState {
                    target: MuxState::Active,
                    cause: SwitchCause::MatchingHardwareState,
                },
            ],

            (_, _, LinkState::Down) => vec![LinkManagerAction::ResumeLinkProber],

            _ => Vec::new(),
        }
    }
}

impl Default for ActiveActiveLinkManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cs(lp: LinkProberState, mux: MuxState, link: LinkState) -> CompositeState {
        CompositeState::new(lp, mux, link)
    }

    #[test]
    fn unreachable_self_tor_switches_to_standby_independent_of_peer() {
        let mut lm = ActiveActiveLinkManager::new();
        lm.note_peer_state(PeerLinkProberState::Active);
        let actions = lm.on_composite_state(cs(LinkProberState::Unknown, MuxState::Active, LinkState::Up));
        assert!(actions.contains(&LinkManagerAction::SwitchMuxState {
            target: MuxState::Standby,
            cause: SwitchCause::PeerHeartbeatMissing,
        }));
    }

    #[test]
    fn reachable_again_reclaims_active() {
        let mut lm = ActiveActiveLinkManager::new();
        let actions = lm.on_composite_state(cs(LinkProberState::Active, MuxState::Standby, LinkState::Up));
        assert!(actions.contains(&LinkManagerAction::SwitchMuxState {
            target: MuxState::Active,
            cause: SwitchCause::MatchingHardwareState,
        }));
    }
}
