//! Per-beacon expiration deadlines.
//!
//! Holds at most one pending deadline per identity. Arming an identity that
//! already has a deadline replaces it rather than adding a second one, so a
//! beacon that keeps being observed never expires.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::types::BeaconIdentity;

// Roughly 30 years; stands in for deadlines that would overflow `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + delay`, saturating to a far-future instant instead of overflowing.
pub(crate) fn deadline_after(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Pending expiration deadlines, keyed by beacon identity.
#[derive(Debug, Default)]
pub struct ExpirationTimers {
    deadlines: HashMap<BeaconIdentity, Instant>,
}

impl ExpirationTimers {
    /// Create an empty set of timers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `identity` to expire `delay` after `now`.
    ///
    /// Returns `true` if an earlier deadline for the same identity was replaced.
    pub fn arm(&mut self, identity: BeaconIdentity, delay: Duration, now: Instant) -> bool {
        self.deadlines
            .insert(identity, deadline_after(now, delay))
            .is_some()
    }

    /// Cancel the pending deadline for `identity`, if any.
    pub fn cancel(&mut self, identity: &BeaconIdentity) -> bool {
        self.deadlines.remove(identity).is_some()
    }

    /// Deadline currently pending for `identity`.
    #[must_use]
    pub fn deadline(&self, identity: &BeaconIdentity) -> Option<Instant> {
        self.deadlines.get(identity).copied()
    }

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Remove and return every identity whose deadline is at or before `now`,
    /// earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<BeaconIdentity> {
        let mut due: Vec<(Instant, BeaconIdentity)> = self
            .deadlines
            .iter()
            .filter(|&(_, &deadline)| deadline <= now)
            .map(|(&identity, &deadline)| (deadline, identity))
            .collect();
        due.sort_unstable();

        for (_, identity) in &due {
            self.deadlines.remove(identity);
        }
        due.into_iter().map(|(_, identity)| identity).collect()
    }

    /// Cancel every pending deadline.
    pub fn clear(&mut self) {
        self.deadlines.clear();
    }

    /// Number of pending deadlines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    /// Whether no deadline is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}
