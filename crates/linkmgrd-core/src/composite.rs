//! Composite State (§4.5, §8 invariant 2): the (Link Prober, MUX, Link)
//! triple a port's transition table is keyed on, plus the derived health
//! label used for syslog/telemetry.

use crate::link_prober::LinkProberState;
use crate::link_state::LinkState;
use crate::mux_state::MuxState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeState {
    pub link_prober: LinkProberState,
    pub mux: MuxState,
    pub link: LinkState,
}

/// Health classification derived from a composite state, used only for
/// logging/telemetry — it does not feed back into any transition decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// Link up, MUX settled (Active or Standby), Link Prober agrees with
    /// the MUX state.
    Healthy,
    /// Link up but Link Prober and MUX disagree, or MUX is Error/Wait.
    Unhealthy,
    /// Any component hasn't reported yet.
    Uninitialized,
}

impl CompositeState {
    pub fn new(link_prober: LinkProberState, mux: MuxState, link: LinkState) -> Self {
        Self { link_prober, mux, link }
    }

    pub fn health(&self) -> Health {
        if self.link_prober == LinkProberState::Unknown || self.link == LinkState::Down {
            return if self.link == LinkState::Down {
                Health::Unhealthy
            } else {
                Health::Uninitialized
            };
        }
        match self.mux {
            MuxState::Active if self.link_prober == LinkProberState::Active => Health::Healthy,
            MuxState::Standby if self.link_prober == LinkProberState::Standby => Health::Healthy,
            MuxState::Wait(_) => Health::Uninitialized,
            _ => Health::Unhealthy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_active_is_healthy() {
        let cs = CompositeState::new(LinkProberState::Active, MuxState::Active, LinkState::Up);
        assert_eq!(cs.health(), Health::Healthy);
    }

    #[test]
    fn mismatched_prober_and_mux_is_unhealthy() {
        let cs = CompositeState::new(LinkProberState::Standby, MuxState::Active, LinkState::Up);
        assert_eq!(cs.health(), Health::Unhealthy);
    }

    #[test]
    fn link_down_is_unhealthy_regardless_of_other_components() {
        let cs = CompositeState::new(LinkProberState::Active, MuxState::Active, LinkState::Down);
        assert_eq!(cs.health(), Health::Unhealthy);
    }

    #[test]
    fn unknown_link_prober_with_link_up_is_uninitialized() {
        let cs = CompositeState::new(LinkProberState::Unknown, MuxState::Active, LinkState::Up);
        assert_eq!(cs.health(), Health::Uninitialized);
    }
}
