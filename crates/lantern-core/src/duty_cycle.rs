//! Duty-cycle state machine for the radio.
//!
//! Alternates between a scanning window of `scan_time` and an idle window.
//! The idle window is `fast_scan_interval` while any beacon is tracked and
//! `scan_interval` otherwise. Fast mode is recomputed from registry occupancy
//! every time a phase is entered.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::ScanConfig;
use crate::expiration::deadline_after;
use crate::types::ScanStatus;

/// Which window the duty cycle is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The radio is scanning.
    Scanning,

    /// The radio is off until the next scan window.
    Idle,
}

/// Durations driving the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTiming {
    /// Length of each scanning window.
    pub scan_time: Duration,

    /// Idle length while no beacon is tracked.
    pub scan_interval: Duration,

    /// Idle length while at least one beacon is tracked.
    pub fast_scan_interval: Duration,
}

impl From<&ScanConfig> for ScanTiming {
    fn from(config: &ScanConfig) -> Self {
        Self {
            scan_time: config.scan_time(),
            scan_interval: config.scan_interval(),
            fast_scan_interval: config.fast_scan_interval(),
        }
    }
}

/// A phase entry, telling the caller what to do with the radio and when the
/// next transition is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Phase just entered.
    pub phase: Phase,

    /// Status to publish.
    pub status: ScanStatus,

    /// Whether at least one beacon was tracked at entry.
    pub fast: bool,

    /// When the next phase is due.
    pub next_at: Instant,
}

/// Two-phase scan/idle toggle.
#[derive(Debug)]
pub struct DutyCycle {
    timing: ScanTiming,
    scan_next: bool,
    current: Option<Phase>,
    deadline: Option<Instant>,
}

impl DutyCycle {
    /// A stopped duty cycle whose first phase will be [`Phase::Scanning`].
    #[must_use]
    pub const fn new(timing: ScanTiming) -> Self {
        Self {
            timing,
            scan_next: true,
            current: None,
            deadline: None,
        }
    }

    /// Enter the next phase at `now`.
    ///
    /// `tracking` is whether the registry currently holds any beacon.
    pub fn advance(&mut self, now: Instant, tracking: bool) -> Transition {
        let (phase, status, window) = if self.scan_next {
            let status = if tracking {
                ScanStatus::FastScanning
            } else {
                ScanStatus::Scanning
            };
            (Phase::Scanning, status, self.timing.scan_time)
        } else {
            let window = if tracking {
                self.timing.fast_scan_interval
            } else {
                self.timing.scan_interval
            };
            (Phase::Idle, ScanStatus::NotScanning, window)
        };

        self.scan_next = !self.scan_next;
        self.current = Some(phase);
        let next_at = deadline_after(now, window);
        self.deadline = Some(next_at);

        Transition {
            phase,
            status,
            fast: tracking,
            next_at,
        }
    }

    /// Whether the pending transition is due at `now`.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }

    /// Pending transition time, `None` once halted.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Current phase, `None` before the first advance and after a halt.
    #[must_use]
    pub const fn phase(&self) -> Option<Phase> {
        self.current
    }

    /// Cancel the pending transition. Returns the phase that was running.
    pub fn halt(&mut self) -> Option<Phase> {
        self.deadline = None;
        self.scan_next = true;
        self.current.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> ScanTiming {
        ScanTiming {
            scan_time: Duration::from_millis(100),
            scan_interval: Duration::from_millis(1000),
            fast_scan_interval: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_first_phase_is_scanning() {
        let t0 = Instant::now();
        let mut cycle = DutyCycle::new(timing());
        assert!(cycle.phase().is_none());
        assert!(!cycle.is_due(t0));

        let transition = cycle.advance(t0, false);
        assert_eq!(transition.phase, Phase::Scanning);
        assert_eq!(transition.status, ScanStatus::Scanning);
        assert_eq!(transition.next_at, t0 + Duration::from_millis(100));
    }

    #[test]
    fn test_empty_registry_idles_for_scan_interval() {
        let t0 = Instant::now();
        let mut cycle = DutyCycle::new(timing());

        let scan = cycle.advance(t0, false);
        let idle = cycle.advance(scan.next_at, false);
        assert_eq!(idle.phase, Phase::Idle);
        assert_eq!(idle.status, ScanStatus::NotScanning);
        assert_eq!(idle.next_at, scan.next_at + Duration::from_millis(1000));
    }

    #[test]
    fn test_tracked_beacon_switches_to_fast_interval() {
        let t0 = Instant::now();
        let mut cycle = DutyCycle::new(timing());

        let scan = cycle.advance(t0, false);
        assert_eq!(scan.status, ScanStatus::Scanning);

        // a beacon was found during the window
        let idle = cycle.advance(scan.next_at, true);
        assert!(idle.fast);
        assert_eq!(idle.next_at, scan.next_at + Duration::from_millis(50));

        let scan = cycle.advance(idle.next_at, true);
        assert_eq!(scan.status, ScanStatus::FastScanning);
    }

    #[test]
    fn test_fast_mode_is_not_latched() {
        let t0 = Instant::now();
        let mut cycle = DutyCycle::new(timing());

        let scan = cycle.advance(t0, true);
        assert_eq!(scan.status, ScanStatus::FastScanning);

        // beacon expired before the idle window started
        let idle = cycle.advance(scan.next_at, false);
        assert_eq!(idle.next_at, scan.next_at + Duration::from_millis(1000));

        let scan = cycle.advance(idle.next_at, false);
        assert_eq!(scan.status, ScanStatus::Scanning);
    }

    #[test]
    fn test_is_due() {
        let t0 = Instant::now();
        let mut cycle = DutyCycle::new(timing());
        let scan = cycle.advance(t0, false);

        assert!(!cycle.is_due(t0 + Duration::from_millis(99)));
        assert!(cycle.is_due(scan.next_at));
    }

    #[test]
    fn test_halt_cancels_and_resets_toggle() {
        let t0 = Instant::now();
        let mut cycle = DutyCycle::new(timing());
        cycle.advance(t0, false);

        assert_eq!(cycle.halt(), Some(Phase::Scanning));
        assert!(cycle.deadline().is_none());
        assert!(!cycle.is_due(t0 + Duration::from_secs(60)));
        assert_eq!(cycle.advance(t0, false).phase, Phase::Scanning);
    }
}
