//! Shared beacon types.
//!
//! [`BeaconIdentity`] names a beacon independently of signal conditions,
//! [`BeaconObservation`] is one decoded sighting of it, and [`ScanStatus`]
//! describes what the scan loop is doing.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::distance::{estimate_distance, Proximity};

/// The `(uuid, major, minor)` triple that identifies a beacon.
///
/// Two observations refer to the same beacon iff their identities are equal.
/// Signal strength, address and timestamps are not part of the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BeaconIdentity {
    /// Proximity UUID, printed as lowercase hyphenated hex.
    pub uuid: Uuid,

    /// Major group number.
    pub major: u16,

    /// Minor number within the major group.
    pub minor: u16,
}

impl BeaconIdentity {
    /// Create a new identity.
    #[must_use]
    pub const fn new(uuid: Uuid, major: u16, minor: u16) -> Self {
        Self { uuid, major, minor }
    }
}

impl fmt::Display for BeaconIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.uuid.hyphenated(), self.major, self.minor)
    }
}

/// A single sighting of a beacon.
///
/// Distance and proximity are derived from `tx_power` and `rssi` when the
/// observation is built and cannot be changed independently afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconObservation {
    identity: BeaconIdentity,
    tx_power: i8,
    rssi: i16,
    distance: f64,
    proximity: Proximity,
    address: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl BeaconObservation {
    /// Build an observation, deriving distance and proximity from the signal data.
    #[must_use]
    pub fn new(identity: BeaconIdentity, tx_power: i8, rssi: i16, address: Option<String>) -> Self {
        let distance = estimate_distance(tx_power, f64::from(rssi));
        Self {
            identity,
            tx_power,
            rssi,
            distance,
            proximity: Proximity::from_distance(distance),
            address,
            expires_at: None,
        }
    }

    /// The beacon this observation belongs to.
    #[must_use]
    pub const fn identity(&self) -> &BeaconIdentity {
        &self.identity
    }

    /// Calibrated power at one meter, in dBm.
    #[must_use]
    pub const fn tx_power(&self) -> i8 {
        self.tx_power
    }

    /// Measured signal strength, in dBm.
    #[must_use]
    pub const fn rssi(&self) -> i16 {
        self.rssi
    }

    /// Estimated distance in meters, `-1.0` when unknown.
    #[must_use]
    pub const fn distance(&self) -> f64 {
        self.distance
    }

    /// Coarse proximity bucket for [`Self::distance`].
    #[must_use]
    pub const fn proximity(&self) -> Proximity {
        self.proximity
    }

    /// Bluetooth hardware address of the advertiser, if the radio reported one.
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// When this beacon expires unless seen again. Set by the registry.
    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub(crate) fn set_expires_at(&mut self, expires_at: DateTime<Utc>) {
        self.expires_at = Some(expires_at);
    }
}

/// What the scan loop is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// The service is stopped.
    Off,

    /// Scanning with no beacon currently tracked.
    Scanning,

    /// Scanning while at least one beacon is tracked.
    FastScanning,

    /// Idle between two scan windows.
    NotScanning,
}

impl ScanStatus {
    /// Numeric status code as broadcast to status listeners.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Scanning => 1,
            Self::FastScanning => 2,
            Self::NotScanning => 3,
        }
    }

    /// Whether the radio is scanning in this state.
    #[must_use]
    pub const fn is_scanning(self) -> bool {
        matches!(self, Self::Scanning | Self::FastScanning)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Off => "off",
            Self::Scanning => "scanning",
            Self::FastScanning => "fast scanning",
            Self::NotScanning => "not scanning",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    const UUID: Uuid = Uuid::from_u128(0xe2c5_6db5_dffb_48d2_b060_d0f5_a710_96e0);

    #[test]
    fn test_identity_display_is_lowercase_hyphenated() {
        let identity = BeaconIdentity::new(UUID, 1, 2);
        assert_eq!(identity.to_string(), "e2c56db5-dffb-48d2-b060-d0f5a71096e0:1:2");
    }

    #[test]
    fn test_identity_hash_uses_full_triple() {
        let mut seen = HashSet::new();
        seen.insert(BeaconIdentity::new(UUID, 1, 7));
        seen.insert(BeaconIdentity::new(UUID, 2, 7));
        seen.insert(BeaconIdentity::new(Uuid::nil(), 1, 7));
        seen.insert(BeaconIdentity::new(UUID, 1, 7));
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_observation_derives_distance_and_proximity() {
        let obs = BeaconObservation::new(BeaconIdentity::new(UUID, 1, 2), -59, -59, None);
        assert!((obs.distance() - 1.010_76).abs() < 1e-3);
        assert_eq!(obs.proximity(), Proximity::Near);
        assert!(obs.expires_at().is_none());
    }

    #[test]
    fn test_observation_zero_rssi_is_unknown() {
        let obs = BeaconObservation::new(BeaconIdentity::new(UUID, 1, 2), -59, 0, None);
        assert!((obs.distance() + 1.0).abs() < f64::EPSILON);
        assert_eq!(obs.proximity(), Proximity::Unknown);
    }

    #[test]
    fn test_scan_status_codes() {
        assert_eq!(ScanStatus::Off.code(), 0);
        assert_eq!(ScanStatus::Scanning.code(), 1);
        assert_eq!(ScanStatus::FastScanning.code(), 2);
        assert_eq!(ScanStatus::NotScanning.code(), 3);
        assert!(ScanStatus::FastScanning.is_scanning());
        assert!(!ScanStatus::NotScanning.is_scanning());
    }

    #[test]
    fn test_observation_serialization() {
        let obs = BeaconObservation::new(
            BeaconIdentity::new(UUID, 10, 20),
            -59,
            -80,
            Some("AA:BB:CC:DD:EE:FF".to_string()),
        );
        let json = serde_json::to_string(&obs).unwrap();
        assert!(json.contains("\"uuid\":\"e2c56db5-dffb-48d2-b060-d0f5a71096e0\""));
        assert!(json.contains("\"proximity\":\"far\""));
        assert!(json.contains("\"address\":\"AA:BB:CC:DD:EE:FF\""));
    }
}
