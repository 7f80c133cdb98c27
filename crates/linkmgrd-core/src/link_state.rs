//! Link State (§4.4): the netdev carrier state of the server-facing port.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStateEvent {
    CarrierUp,
    CarrierDown,
}

/// Outcome of a Link State transition the caller needs to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStateAction {
    /// Down -> Up: the Link Prober's socket/session needs to be re-created
    /// from scratch (§4.4).
    ReinitializeLinkProber,
    /// Up -> Down while this port's composite state was Active: trigger an
    /// immediate switchover rather than waiting for heartbeat timeout
    /// (§4.4, §4.5).
    TriggerImmediateSwitchover,
}

#[derive(Debug, Clone, Copy)]
pub struct LinkStateMachine {
    state: LinkState,
}

impl LinkStateMachine {
    pub fn new() -> Self {
        Self { state: LinkState::Down }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn handle_event(&mut self, event: LinkStateEvent, currently_active: bool) -> Option<LinkStateAction> {
        let before = self.state;
        self.state = match event {
            LinkStateEvent::CarrierUp => LinkState::Up,
            LinkStateEvent::CarrierDown => LinkState::Down,
        };
        if self.state == before {
            return None;
        }
        match self.state {
            LinkState::Up => Some(LinkStateAction::ReinitializeLinkProber),
            LinkState::Down if currently_active => Some(LinkStateAction::TriggerImmediateSwitchover),
            LinkState::Down => None,
        }
    }
}

impl Default for LinkStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn down_to_up_reinitializes_link_prober() {
        let mut sm = LinkStateMachine::new();
        assert_eq!(
            sm.handle_event(LinkStateEvent::CarrierUp, false),
            Some(LinkStateAction::ReinitializeLinkProber)
        );
    }

    #[test]
    fn up_to_down_while_active_triggers_immediate_switchover() {
        let mut sm = LinkStateMachine::new();
        sm.handle_event(LinkStateEvent::CarrierUp, false);
        assert_eq!(
            sm.handle_event(LinkStateEvent::CarrierDown, true),
            Some(LinkStateAction::TriggerImmediateSwitchover)
        );
    }

    #[test]
    fn up_to_down_while_standby_is_quiet() {
        let mut sm = LinkStateMachine::new();
        sm.handle_event(LinkStateEvent::CarrierUp, false);
        assert_eq!(sm.handle_event(LinkStateEvent::CarrierDown, false), None);
    }

    #[test]
    fn repeated_identical_event_is_a_no_op() {
        let mut sm = LinkStateMachine::new();
        sm.handle_event(LinkStateEvent::CarrierUp, false);
        assert_eq!(sm.handle_event(LinkStateEvent::CarrierUp, false), None);
    }
}
