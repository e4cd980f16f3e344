//! Bluetooth Low Energy radio abstraction.
//!
//! The scan service only needs to turn scanning on and off and to receive
//! raw advertisement records while it is on. [`Radio`] is that seam:
//!
//! - [`BluezRadio`] drives a BlueZ adapter through `bluer` (feature `bluetooth`)
//! - [`MockRadio`] records calls and injects advertisements in tests
//!
//! Radios hand advertisements to the service through an [`AdvertisementSink`].

use thiserror::Error;
use tokio::sync::mpsc;

use crate::service::Command;

#[cfg(feature = "bluetooth")]
mod bluez;
#[cfg(any(test, feature = "mock-radio", not(feature = "bluetooth")))]
mod mock;

#[cfg(feature = "bluetooth")]
pub use bluez::BluezRadio;
#[cfg(any(test, feature = "mock-radio", not(feature = "bluetooth")))]
pub use mock::MockRadio;

/// Errors raised by a radio implementation.
#[derive(Debug, Error)]
pub enum RadioError {
    /// No Bluetooth adapter is present.
    #[error("no Bluetooth adapter found")]
    AdapterNotFound,

    /// The adapter is present but powered off.
    #[error("Bluetooth adapter is powered off")]
    AdapterPoweredOff,

    /// The connection to the Bluetooth stack could not be opened.
    #[error("failed to open Bluetooth session: {message}")]
    SessionInitFailed {
        /// Underlying error message.
        message: String,
    },

    /// Device discovery could not be started.
    #[error("failed to start discovery: {message}")]
    DiscoveryFailed {
        /// Underlying error message.
        message: String,
    },
}

/// Result alias for radio operations.
pub type RadioResult<T> = std::result::Result<T, RadioError>;

/// One raw advertisement as reported by the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Raw advertisement record.
    pub payload: Vec<u8>,

    /// Received signal strength in dBm.
    pub rssi: i16,

    /// Advertiser hardware address.
    pub address: Option<String>,
}

impl Advertisement {
    /// Create an advertisement.
    #[must_use]
    pub fn new(payload: impl Into<Vec<u8>>, rssi: i16, address: Option<String>) -> Self {
        Self {
            payload: payload.into(),
            rssi,
            address,
        }
    }
}

/// Delivers advertisements into a running scan service.
///
/// Cheap to clone. Delivery never blocks. Advertisements are processed in
/// the order they were delivered, interleaved with the service's own
/// commands.
#[derive(Debug, Clone)]
pub struct AdvertisementSink {
    tx: mpsc::UnboundedSender<Command>,
}

impl AdvertisementSink {
    pub(crate) const fn new(tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { tx }
    }

    /// Hand one advertisement to the service.
    ///
    /// Returns `false` once the service has stopped.
    pub fn deliver(&self, advertisement: Advertisement) -> bool {
        self.tx.send(Command::Advertisement(advertisement)).is_ok()
    }

    /// Whether the receiving service is gone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A BLE radio the scan service can switch on and off.
///
/// Calls must not block: implementations start background work in
/// [`Radio::start_scan`] and cancel it in [`Radio::stop_scan`].
pub trait Radio: Send + 'static {
    /// Whether the radio is present and enabled. Checked once at service start.
    fn is_enabled(&self) -> bool;

    /// Start scanning, delivering every advertisement seen to `sink`.
    ///
    /// Starting an already running scan is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan could not be started.
    fn start_scan(&mut self, sink: AdvertisementSink) -> RadioResult<()>;

    /// Stop scanning. Stopping an idle radio is a no-op.
    fn stop_scan(&mut self);
}
