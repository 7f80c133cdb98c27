//! Hardware-offloaded heartbeat variant (§4.1): the NIC/ASIC sends and
//! classifies ICMP sessions itself and reports state transitions through a
//! vendor SDK; this module only adapts those reports onto the same
//! [`LinkProberEvent`] surface the software engine produces, plus the
//! dwell-time debounce the ASIC doesn't do for us.

use std::time::Duration;

use crate::link_prober::LinkProberEvent;

/// Boundary to the vendor SDK/driver that actually programs and reports on
/// hardware ICMP sessions. Exists so the dwell-time logic below can be unit
/// tested without real hardware.
pub trait HardwareProber: Send {
    fn program_session(&mut self, peer_ipv4: std::net::Ipv4Addr, guid: [u8; 16]) -> std::io::Result<()>;
    fn teardown_session(&mut self) -> std::io::Result<()>;
}

/// Reports coming from the hardware session, analogous to the software
/// engine's per-cycle classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareReport {
    SelfMatch,
    PeerMatch,
    NoMatch,
}

/// Hardware reports arrive at a cadence the ASIC controls, so state changes
/// are debounced by a dwell timer (holding a candidate state for
/// `dwell_time` before committing it) rather than the software engine's
/// per-cycle signal counters (§4.1: "Matching_Hardware_State" switch
/// cause implies the driver's own debounce, separate from Link Prober's").
pub struct DwellDebouncer {
    dwell_time: Duration,
    candidate: Option<(HardwareReport, Duration)>,
    committed: Option<HardwareReport>,
}

impl DwellDebouncer {
    pub fn new(dwell_time: Duration) -> Self {
        Self {
            dwell_time,
            candidate: None,
            committed: None,
        }
    }

    /// Advance the debouncer by `elapsed` wall-clock time with the latest
    /// `report`, returning an event only once the candidate has dwelled
    /// long enough to commit.
    pub fn tick(&mut self, report: HardwareReport, elapsed: Duration) -> Option<LinkProberEvent> {
        match &mut self.candidate {
            Some((candidate_report, accumulated)) if *candidate_report == report => {
                *accumulated += elapsed;
                if *accumulated >= self.dwell_time && self.committed != Some(report) {
                    self.committed = Some(report);
                    self.candidate = None;
                    return Some(Self::event_for(report));
                }
            }
            _ => {
                self.candidate = Some((report, elapsed));
            }
        }
        None
    }

    fn event_for(report: HardwareReport) -> LinkProberEvent {
        match report {
            HardwareReport::SelfMatch => LinkProberEvent::IcmpSelf,
            HardwareReport::PeerMatch => LinkProberEvent::IcmpPeer,
            HardwareReport::NoMatch => LinkProberEvent::IcmpUnknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commits_only_after_full_dwell_time() {
        let mut deb = DwellDebouncer::new(Duration::from_millis(300));
        assert_eq!(deb.tick(HardwareReport::SelfMatch, Duration::from_millis(100)), None);
        assert_eq!(deb.tick(HardwareReport::SelfMatch, Duration::from_millis(100)), None);
        assert_eq!(
            deb.tick(HardwareReport::SelfMatch, Duration::from_millis(150)),
            Some(LinkProberEvent::IcmpSelf)
        );
    }

    #[test]
    fn flapping_candidate_resets_accumulation() {
        let mut deb = DwellDebouncer::new(Duration::from_millis(300));
        deb.tick(HardwareReport::SelfMatch, Duration::from_millis(200));
        assert_eq!(deb.tick(HardwareReport::PeerMatch, Duration::from_millis(50)), None);
        assert_eq!(deb.tick(HardwareReport::PeerMatch, Duration::from_millis(200)), None);
        assert_eq!(
            deb.tick(HardwareReport::PeerMatch, Duration::from_millis(200)),
            Some(LinkProberEvent::IcmpPeer)
        );
    }

    #[test]
    fn does_not_recommit_same_state_repeatedly() {
        let mut deb = DwellDebouncer::new(Duration::from_millis(100));
        assert_eq!(
            deb.tick(HardwareReport::SelfMatch, Duration::from_millis(150)),
            Some(LinkProberEvent::IcmpSelf)
        );
        assert_eq!(deb.tick(HardwareReport::SelfMatch, Duration::from_millis(150)), None);
    }
}
