//! Events published by the scan service.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::{BeaconObservation, ScanStatus};

/// Something observers should know about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum BeaconEvent {
    /// A beacon was seen for the first time or its rssi changed.
    Detected(BeaconObservation),

    /// A beacon was not seen for a full expiration interval.
    Expired(BeaconObservation),

    /// The scan status changed.
    StatusChanged(ScanStatus),
}

impl BeaconEvent {
    /// The observation carried by this event, if any.
    #[must_use]
    pub const fn observation(&self) -> Option<&BeaconObservation> {
        match self {
            Self::Detected(observation) | Self::Expired(observation) => Some(observation),
            Self::StatusChanged(_) => None,
        }
    }
}

/// Receives service events.
///
/// Callbacks run on the service task and must return quickly.
pub trait EventSink: Send + 'static {
    /// A beacon was inserted into the registry or its rssi changed.
    fn beacon_detected(&mut self, observation: &BeaconObservation);

    /// A beacon left the registry after its expiration interval.
    fn beacon_expired(&mut self, observation: &BeaconObservation);

    /// The scan status changed.
    fn scan_status_changed(&mut self, status: ScanStatus);
}

/// Forwards events over a channel. Events sent after the receiver is gone
/// are dropped.
impl EventSink for mpsc::UnboundedSender<BeaconEvent> {
    fn beacon_detected(&mut self, observation: &BeaconObservation) {
        let _ = self.send(BeaconEvent::Detected(observation.clone()));
    }

    fn beacon_expired(&mut self, observation: &BeaconObservation) {
        let _ = self.send(BeaconEvent::Expired(observation.clone()));
    }

    fn scan_status_changed(&mut self, status: ScanStatus) {
        let _ = self.send(BeaconEvent::StatusChanged(status));
    }
}
