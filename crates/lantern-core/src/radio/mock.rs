//! In-memory radio for tests and for running without Bluetooth hardware.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::{Advertisement, AdvertisementSink, Radio, RadioError, RadioResult};

#[derive(Debug, Default)]
struct MockState {
    disabled: AtomicBool,
    fail_scans: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    sink: Mutex<Option<AdvertisementSink>>,
}

/// A radio that records scan calls and lets tests inject advertisements.
///
/// Clones share state, so a test can keep one clone and hand the other to
/// the service.
#[derive(Debug, Clone, Default)]
pub struct MockRadio {
    state: Arc<MockState>,
}

impl MockRadio {
    /// An enabled radio.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A radio that reports itself disabled.
    #[must_use]
    pub fn disabled() -> Self {
        let radio = Self::default();
        radio.state.disabled.store(true, Ordering::SeqCst);
        radio
    }

    /// Make subsequent [`Radio::start_scan`] calls fail.
    pub fn fail_scans(&self, fail: bool) {
        self.state.fail_scans.store(fail, Ordering::SeqCst);
    }

    /// Whether a scan is currently running.
    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.sink().is_some()
    }

    /// Number of successful [`Radio::start_scan`] calls.
    #[must_use]
    pub fn scan_starts(&self) -> usize {
        self.state.starts.load(Ordering::SeqCst)
    }

    /// Number of [`Radio::stop_scan`] calls.
    #[must_use]
    pub fn scan_stops(&self) -> usize {
        self.state.stops.load(Ordering::SeqCst)
    }

    /// Report an advertisement as if it had been received over the air.
    ///
    /// Only delivered while scanning; returns whether it was delivered.
    pub fn advertise(&self, advertisement: Advertisement) -> bool {
        self.sink().is_some_and(|sink| sink.deliver(advertisement))
    }

    fn sink(&self) -> Option<AdvertisementSink> {
        self.state
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_sink(&self, sink: Option<AdvertisementSink>) {
        *self.state.sink.lock().unwrap_or_else(PoisonError::into_inner) = sink;
    }
}

impl Radio for MockRadio {
    fn is_enabled(&self) -> bool {
        !self.state.disabled.load(Ordering::SeqCst)
    }

    fn start_scan(&mut self, sink: AdvertisementSink) -> RadioResult<()> {
        if self.state.fail_scans.load(Ordering::SeqCst) {
            return Err(RadioError::DiscoveryFailed {
                message: "mock radio configured to fail".to_string(),
            });
        }
        if !self.is_scanning() {
            self.state.starts.fetch_add(1, Ordering::SeqCst);
            self.set_sink(Some(sink));
        }
        Ok(())
    }

    fn stop_scan(&mut self) {
        self.state.stops.fetch_add(1, Ordering::SeqCst);
        self.set_sink(None);
    }
}
