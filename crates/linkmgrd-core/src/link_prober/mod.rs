//! Link Prober state machine (§4.2, §4.6): turns raw heartbeat events into a
//! debounced notion of which ToR the server's traffic is actually reaching.

use crate::config::PortCableType;

/// Link Prober states for an active-standby port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkProberState {
    Active,
    Standby,
    Unknown,
    /// Suspended after a switch command, waiting out the suspend timer
    /// before resuming normal classification (§4.2).
    Wait,
}

/// Link Prober states for an active-active port (§4.6): self and peer
/// heartbeats are tracked independently, so the state also carries whether
/// the *peer*'s ToR currently looks reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerLinkProberState {
    Active,
    Unknown,
}

/// Inputs the heartbeat engine feeds into the Link Prober.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkProberEvent {
    /// A heartbeat reply came back carrying our own GUID.
    IcmpSelf,
    /// A heartbeat reply came back carrying the peer ToR's GUID.
    IcmpPeer,
    /// A heartbeat reply came back with an unrecognized or unset GUID.
    IcmpUnknown,
    /// Active-active only: a heartbeat reply on the peer's session carrying
    /// the peer's own GUID.
    IcmpPeerActive,
    /// Active-active only: no recognizable reply on the peer's session.
    IcmpPeerUnknown,
    /// The suspend timer armed by a switch command has expired.
    SuspendTimerExpired,
    /// Link Manager is requesting a switchover; Link Prober enters `Wait`
    /// and emits a `Command::SwitchActive` TLV on the next probe.
    SwitchActiveRequest,
    /// The peer ToR acknowledged the switch-active command.
    SwitchActiveCommandComplete,
    /// A `Command::MuxProbe` TLV arrived, requesting an immediate probe.
    MuxProbeRequest,
}

/// Debounces a raw per-cycle classification (self/peer/unknown) into a
/// stable state using positive/negative signal counters (§4.2, §6 defaults
/// `positive_signal_count=1`, `negative_signal_count=3`).
#[derive(Debug, Clone)]
pub struct Hysteresis {
    positive_threshold: u32,
    negative_threshold: u32,
    positive_count: u32,
    negative_count: u32,
}

impl Hysteresis {
    pub fn new(positive_threshold: u32, negative_threshold: u32) -> Self {
        Self {
            positive_threshold: positive_threshold.max(1),
            negative_threshold: negative_threshold.max(1),
            positive_count: 0,
            negative_count: 0,
        }
    }

    /// Record one cycle's worth of matching/non-matching observation and
    /// report whether the debounced state should flip.
    pub fn observe(&mut self, matched: bool) -> HysteresisOutcome {
        if matched {
            self.negative_count = 0;
            self.positive_count += 1;
            if self.positive_count >= self.positive_threshold {
                HysteresisOutcome::ConfirmPresent
            } else {
                HysteresisOutcome::Pending
            }
        } else {
            self.positive_count = 0;
            self.negative_count += 1;
            if self.negative_count >= self.negative_threshold {
                HysteresisOutcome::ConfirmAbsent
            } else {
                HysteresisOutcome::Pending
            }
        }
    }

    pub fn reset(&mut self) {
        self.positive_count = 0;
        self.negative_count = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HysteresisOutcome {
    ConfirmPresent,
    ConfirmAbsent,
    Pending,
}

/// Link Prober instance owned by a [`crate::link_manager::LinkManager`].
/// Active-active ports additionally track the peer ToR's reachability via
/// `peer_state`; active-standby ports leave it at `Unknown` unused.
#[derive(Debug, Clone)]
pub struct LinkProber {
    cable_type: PortCableType,
    state: LinkProberState,
    peer_state: PeerLinkProberState,
    self_hysteresis: Hysteresis,
    peer_hysteresis: Hysteresis,
}

impl LinkProber {
    pub fn new(cable_type: PortCableType, positive_threshold: u32, negative_threshold: u32) -> Self {
        Self {
            cable_type,
            state: LinkProberState::Unknown,
            peer_state: PeerLinkProberState::Unknown,
            self_hysteresis: Hysteresis::new(positive_threshold, negative_threshold),
            peer_hysteresis: Hysteresis::new(positive_threshold, negative_threshold),
        }
    }

    pub fn state(&self) -> LinkProberState {
        self.state
    }

    pub fn peer_state(&self) -> PeerLinkProberState {
        self.peer_state
    }

    pub fn cable_type(&self) -> PortCableType {
        self.cable_type
    }

    /// Drive the state machine with one event, returning the new state if
    /// it changed (idempotent: re-delivering the same event is a no-op).
    pub fn handle_event(&mut self, event: LinkProberEvent) -> Option<LinkProberState> {
        let before = self.state;
        match event {
            LinkProberEvent::IcmpSelf => self.on_classification(true, false),
            LinkProberEvent::IcmpPeer => self.on_classification(false, true),
            LinkProberEvent::IcmpUnknown => self.on_classification(false, false),
            LinkProberEvent::IcmpPeerActive => {
                if self.peer_hysteresis.observe(true) == HysteresisOutcome::ConfirmPresent {
                    self.peer_state = PeerLinkProberState::Active;
                }
            }
            LinkProberEvent::IcmpPeerUnknown => {
                if self.peer_hysteresis.observe(false) == HysteresisOutcome::ConfirmAbsent {
                    self.peer_state = PeerLinkProberState::Unknown;
                }
            }
            LinkProberEvent::SwitchActiveRequest => {
                self.state = LinkProberState::Wait;
                self.self_hysteresis.reset();
            }
            LinkProberEvent::SuspendTimerExpired | LinkProberEvent::SwitchActiveCommandComplete => {
                if self.state == LinkProberState::Wait {
                    self.state = LinkProberState::Unknown;
                    self.self_hysteresis.reset();
                }
            }
            LinkProberEvent::MuxProbeRequest => {
                // Handled by the heartbeat engine scheduling an immediate
                // probe; no state transition here.
            }
        }
        if self.state != before {
            Some(self.state)
        } else {
            None
        }
    }

    fn on_classification(&mut self, is_self: bool, is_peer: bool) {
        if self.state == LinkProberState::Wait {
            // Switch-active command outstanding: classification updates are
            // suppressed until the suspend timer or ack releases us (§4.2).
            return;
        }
        if is_self {
            if self.self_hysteresis.observe(true) == HysteresisOutcome::ConfirmPresent {
                self.state = LinkProberState::Active;
            }
        } else if is_peer {
            if self.self_hysteresis.observe(true) == HysteresisOutcome::ConfirmPresent {
                self.state = LinkProberState::Standby;
            }
        } else if self.self_hysteresis.observe(false) == HysteresisOutcome::ConfirmAbsent {
            self.state = LinkProberState::Unknown;
        }
    }
}
