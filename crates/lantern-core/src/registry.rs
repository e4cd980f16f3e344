//! In-memory registry of currently tracked beacons.
//!
//! Keyed by [`BeaconIdentity`]. Each entry also carries a recency stamp so
//! observers can list beacons with the most recently touched one last.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::types::{BeaconIdentity, BeaconObservation};

/// What an [`BeaconRegistry::upsert`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The identity was not tracked and has been added.
    Inserted,

    /// The identity was tracked with a different rssi and has been replaced.
    Updated,

    /// The identity was tracked with the same rssi; nothing observable changed.
    Unchanged,
}

impl UpsertOutcome {
    /// Whether observers should be told about this observation.
    #[must_use]
    pub const fn is_change(self) -> bool {
        matches!(self, Self::Inserted | Self::Updated)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    observation: BeaconObservation,
    touched: u64,
}

/// The set of beacons currently considered in range.
#[derive(Debug, Default)]
pub struct BeaconRegistry {
    entries: HashMap<BeaconIdentity, Entry>,
    next_touch: u64,
}

impl BeaconRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation, stamping it with its expiration time.
    ///
    /// A new identity is inserted. A known identity whose rssi changed is
    /// replaced and becomes the most recent entry. A known identity with the
    /// same rssi keeps its stored observation and position; only its
    /// expiration time is refreshed.
    pub fn upsert(
        &mut self,
        mut observation: BeaconObservation,
        expires_at: DateTime<Utc>,
    ) -> UpsertOutcome {
        observation.set_expires_at(expires_at);
        let identity = *observation.identity();

        match self.entries.get_mut(&identity) {
            Some(entry) if entry.observation.rssi() == observation.rssi() => {
                entry.observation.set_expires_at(expires_at);
                UpsertOutcome::Unchanged
            }
            Some(entry) => {
                entry.observation = observation;
                entry.touched = Self::bump(&mut self.next_touch);
                UpsertOutcome::Updated
            }
            None => {
                let touched = Self::bump(&mut self.next_touch);
                self.entries.insert(identity, Entry { observation, touched });
                UpsertOutcome::Inserted
            }
        }
    }

    /// Stop tracking `identity`, returning its last observation.
    ///
    /// Removing an identity that is not tracked is a no-op.
    pub fn remove(&mut self, identity: &BeaconIdentity) -> Option<BeaconObservation> {
        self.entries.remove(identity).map(|entry| entry.observation)
    }

    /// Latest observation for `identity`.
    #[must_use]
    pub fn get(&self, identity: &BeaconIdentity) -> Option<&BeaconObservation> {
        self.entries.get(identity).map(|entry| &entry.observation)
    }

    /// Whether `identity` is tracked.
    #[must_use]
    pub fn contains(&self, identity: &BeaconIdentity) -> bool {
        self.entries.contains_key(identity)
    }

    /// Whether no beacon is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of tracked beacons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Tracked observations, most recently inserted or updated last.
    #[must_use]
    pub fn observations(&self) -> Vec<&BeaconObservation> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_unstable_by_key(|entry| entry.touched);
        entries.into_iter().map(|entry| &entry.observation).collect()
    }

    /// Owned copy of [`Self::observations`].
    #[must_use]
    pub fn snapshot(&self) -> Vec<BeaconObservation> {
        self.observations().into_iter().cloned().collect()
    }

    /// Forget every tracked beacon.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn bump(counter: &mut u64) -> u64 {
        *counter += 1;
        *counter
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use uuid::Uuid;

    use super::*;

    const UUID: Uuid = Uuid::from_u128(0x2f23_4454_cf6d_4a0f_adf2_f491_1ba9_ffa6);

    fn observation(minor: u16, rssi: i16) -> BeaconObservation {
        BeaconObservation::new(BeaconIdentity::new(UUID, 1, minor), -59, rssi, None)
    }

    fn minors(registry: &BeaconRegistry) -> Vec<u16> {
        registry
            .observations()
            .iter()
            .map(|obs| obs.identity().minor)
            .collect()
    }

    #[test]
    fn test_insert_then_same_rssi_is_unchanged() {
        let mut registry = BeaconRegistry::new();
        let now = Utc::now();

        assert_eq!(registry.upsert(observation(1, -60), now), UpsertOutcome::Inserted);
        assert_eq!(registry.upsert(observation(1, -60), now), UpsertOutcome::Unchanged);
        assert_eq!(registry.upsert(observation(1, -60), now), UpsertOutcome::Unchanged);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_rssi_change_updates_and_moves_to_end() {
        let mut registry = BeaconRegistry::new();
        let now = Utc::now();

        registry.upsert(observation(1, -60), now);
        registry.upsert(observation(2, -70), now);
        registry.upsert(observation(3, -80), now);
        assert_eq!(minors(&registry), vec![1, 2, 3]);

        assert_eq!(registry.upsert(observation(1, -61), now), UpsertOutcome::Updated);
        assert_eq!(minors(&registry), vec![2, 3, 1]);
        assert_eq!(registry.get(&BeaconIdentity::new(UUID, 1, 1)).unwrap().rssi(), -61);
    }

    #[test]
    fn test_unchanged_keeps_position_but_refreshes_expiry() {
        let mut registry = BeaconRegistry::new();
        let first = Utc::now();
        let later = first + Duration::seconds(30);

        registry.upsert(observation(1, -60), first);
        registry.upsert(observation(2, -70), first);
        registry.upsert(observation(1, -60), later);

        assert_eq!(minors(&registry), vec![1, 2]);
        let stored = registry.get(&BeaconIdentity::new(UUID, 1, 1)).unwrap();
        assert_eq!(stored.expires_at(), Some(later));
    }

    #[test]
    fn test_unchanged_keeps_stored_address() {
        let mut registry = BeaconRegistry::new();
        let now = Utc::now();
        let identity = BeaconIdentity::new(UUID, 1, 1);

        registry.upsert(BeaconObservation::new(identity, -59, -60, Some("A".into())), now);
        registry.upsert(BeaconObservation::new(identity, -59, -60, Some("B".into())), now);
        assert_eq!(registry.get(&identity).unwrap().address(), Some("A"));
    }

    #[test]
    fn test_identity_ignores_signal_fields() {
        let mut registry = BeaconRegistry::new();
        let now = Utc::now();
        let identity = BeaconIdentity::new(UUID, 1, 1);

        registry.upsert(BeaconObservation::new(identity, -59, -60, None), now);
        let outcome = registry.upsert(BeaconObservation::new(identity, -70, -90, None), now);
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut registry = BeaconRegistry::new();
        assert!(registry.remove(&BeaconIdentity::new(UUID, 9, 9)).is_none());

        registry.upsert(observation(1, -60), Utc::now());
        let removed = registry.remove(&BeaconIdentity::new(UUID, 1, 1)).unwrap();
        assert_eq!(removed.rssi(), -60);
        assert!(registry.is_empty());
        assert!(registry.remove(&BeaconIdentity::new(UUID, 1, 1)).is_none());
    }

    #[test]
    fn test_upsert_stamps_expiration() {
        let mut registry = BeaconRegistry::new();
        let expires_at = Utc::now() + Duration::seconds(60);

        registry.upsert(observation(4, -55), expires_at);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].expires_at(), Some(expires_at));
    }

    #[test]
    fn test_outcome_is_change() {
        assert!(UpsertOutcome::Inserted.is_change());
        assert!(UpsertOutcome::Updated.is_change());
        assert!(!UpsertOutcome::Unchanged.is_change());
    }

    #[test]
    fn test_clear() {
        let mut registry = BeaconRegistry::new();
        registry.upsert(observation(1, -60), Utc::now());
        registry.upsert(observation(2, -60), Utc::now());
        registry.clear();
        assert!(registry.is_empty());
        assert!(!registry.contains(&BeaconIdentity::new(UUID, 1, 1)));
    }
}
