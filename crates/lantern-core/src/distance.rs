//! RSSI-based distance estimation.
//!
//! Converts a measured RSSI and the beacon's calibrated tx power into an
//! approximate distance in meters, then buckets that into a [`Proximity`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Returned by [`estimate_distance`] when no estimate can be made.
pub const UNKNOWN_DISTANCE: f64 = -1.0;

/// Upper bound (exclusive) of [`Proximity::Immediate`], in meters.
pub const IMMEDIATE_MAX_METERS: f64 = 0.5;

/// Upper bound (inclusive) of [`Proximity::Near`], in meters.
pub const NEAR_MAX_METERS: f64 = 4.0;

/// Coarse distance bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Proximity {
    /// Distance could not be estimated.
    Unknown,

    /// Less than half a meter.
    Immediate,

    /// Between half a meter and four meters.
    Near,

    /// More than four meters.
    Far,
}

impl Proximity {
    /// Classify an estimated distance.
    ///
    /// Negative distances (the unknown sentinel) map to [`Proximity::Unknown`].
    #[must_use]
    pub fn from_distance(meters: f64) -> Self {
        if meters < 0.0 {
            Self::Unknown
        } else if meters < IMMEDIATE_MAX_METERS {
            Self::Immediate
        } else if meters <= NEAR_MAX_METERS {
            Self::Near
        } else {
            Self::Far
        }
    }
}

impl fmt::Display for Proximity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unknown => "Unknown",
            Self::Immediate => "Immediate",
            Self::Near => "Near",
            Self::Far => "Far",
        };
        f.write_str(label)
    }
}

/// Estimate the distance to a beacon in meters.
///
/// Both values are normally negative dBm, so `rssi / tx_power` is positive.
/// Below a ratio of 1 the curve is `ratio^10`; above it the fitted
/// `0.89976 * ratio^7.7095 + 0.111` is used.
///
/// Returns [`UNKNOWN_DISTANCE`] when `rssi` is zero, or when `tx_power` is
/// zero and there is no calibration to normalise against.
#[must_use]
pub fn estimate_distance(tx_power: i8, rssi: f64) -> f64 {
    if rssi == 0.0 || tx_power == 0 {
        return UNKNOWN_DISTANCE;
    }

    let ratio = rssi / f64::from(tx_power);
    if ratio < 1.0 {
        ratio.powi(10)
    } else {
        0.89976f64.mul_add(ratio.powf(7.7095), 0.111)
    }
}
