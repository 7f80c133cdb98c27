//! MUX State (§4.3): the server's view of which ToR the cable is physically
//! pointed at, as reported by SWSS/the driver.

/// Why a `Wait` was entered, distinguishing the two sources of a pending
/// MUX state change so the completion handler knows what it's waiting for
/// (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCause {
    SwssUpdate,
    DriverUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxState {
    Active,
    Standby,
    Unknown,
    Error,
    Wait(WaitCause),
}

/// MUX State notifications, each possibly arriving more than once in a row;
/// duplicate notifications fold into a no-op rather than re-running
/// transition side effects (§4.3, §8 invariant 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxStateEvent {
    NotifyActive,
    NotifyStandby,
    NotifyUnknown,
    NotifyError,
}

#[derive(Debug, Clone)]
pub struct MuxStateMachine {
    state: MuxState,
    duplicate_count: u32,
}

impl MuxStateMachine {
    pub fn new() -> Self {
        Self {
            state: MuxState::Unknown,
            duplicate_count: 0,
        }
    }

    pub fn state(&self) -> MuxState {
        self.state
    }

    pub fn duplicate_count(&self) -> u32 {
        self.duplicate_count
    }

    /// Apply a notification, returning the new state only when it actually
    /// changes; repeated identical notifications just bump
    /// `duplicate_count` and report no transition.
    pub fn handle_event(&mut self, event: MuxStateEvent) -> Option<MuxState> {
        let target = match event {
            MuxStateEvent::NotifyActive => MuxState::Active,
            MuxStateEvent::NotifyStandby => MuxState::Standby,
            MuxStateEvent::NotifyUnknown => MuxState::Unknown,
            MuxStateEvent::NotifyError => MuxState::Error,
        };
        if self.state == target {
            self.duplicate_count += 1;
            return None;
        }
        self.duplicate_count = 0;
        self.state = target;
        Some(target)
    }

    /// Enter a `Wait` state ahead of issuing a write to SWSS or the driver.
    pub fn begin_wait(&mut self, cause: WaitCause) {
        self.state = MuxState::Wait(cause);
        self.duplicate_count = 0;
    }
}

impl Default for MuxStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_notifications_are_folded_not_retransitioned() {
        let mut sm = MuxStateMachine::new();
        assert_eq!(sm.handle_event(MuxStateEvent::NotifyActive), Some(MuxState::Active));
        assert_eq!(sm.handle_event(MuxStateEvent::NotifyActive), None);
        assert_eq!(sm.handle_event(MuxStateEvent::NotifyActive), None);
        assert_eq!(sm.duplicate_count(), 2);
    }

    #[test]
    fn wait_cause_distinguishes_source() {
        let mut sm = MuxStateMachine::new();
        sm.begin_wait(WaitCause::SwssUpdate);
        assert_eq!(sm.state(), MuxState::Wait(WaitCause::SwssUpdate));
    }
}
