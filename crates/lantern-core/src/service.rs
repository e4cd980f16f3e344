//! The beacon scan service.
//!
//! [`BeaconService`] owns every piece of mutable scan state (registry,
//! expiration deadlines, duty cycle, radio) and runs as a single tokio task.
//! Advertisements, control commands and timer firings are all handled on
//! that task, one at a time, so no state is ever shared or locked.
//!
//! The service is driven from outside through a [`ServiceHandle`]:
//!
//! ```rust,no_run
//! use lantern_core::{BeaconService, Radio, ScanConfig};
//! use tokio::sync::mpsc;
//!
//! # async fn run(radio: impl Radio) -> lantern_core::Result<()> {
//! let (events, mut rx) = mpsc::unbounded_channel();
//! let handle = BeaconService::start(ScanConfig::default(), radio, events)?;
//!
//! while let Some(event) = rx.recv().await {
//!     println!("{event:?}");
//! }
//! handle.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, trace, warn};

use crate::config::ScanConfig;
use crate::duty_cycle::{DutyCycle, Phase, ScanTiming};
use crate::error::{LanternError, Result};
use crate::events::EventSink;
use crate::expiration::ExpirationTimers;
use crate::frame;
use crate::radio::{Advertisement, AdvertisementSink, Radio};
use crate::registry::{BeaconRegistry, UpsertOutcome};
use crate::types::{BeaconObservation, ScanStatus};

/// Messages processed by the service task, in arrival order.
#[derive(Debug)]
pub(crate) enum Command {
    Advertisement(Advertisement),
    Snapshot(oneshot::Sender<Vec<BeaconObservation>>),
    Clear,
    Stop,
}

/// Scan loop state. Lives on the service task between start and stop.
pub struct BeaconService<R, E> {
    config: ScanConfig,
    registry: BeaconRegistry,
    expirations: ExpirationTimers,
    duty_cycle: DutyCycle,
    radio: R,
    events: E,
    sink: AdvertisementSink,
}

impl<R: Radio, E: EventSink> BeaconService<R, E> {
    /// Validate `config`, check the radio and spawn the service task.
    ///
    /// The first scan window starts immediately. Must be called from within
    /// a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`LanternError::ConfigValidationError`] for invalid timing and
    /// [`LanternError::AdapterUnavailable`] when the radio is disabled. No
    /// task is spawned in either case.
    pub fn start(config: ScanConfig, radio: R, events: E) -> Result<ServiceHandle> {
        config.validate()?;
        if !radio.is_enabled() {
            error!("Bluetooth radio is disabled; not starting beacon service");
            return Err(LanternError::AdapterUnavailable);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let sink = AdvertisementSink::new(tx.clone());
        let service = Self::new(config, radio, events, sink);
        let task = tokio::spawn(service.run(rx));

        Ok(ServiceHandle {
            commands: tx,
            task: Some(task),
        })
    }

    fn new(config: ScanConfig, radio: R, events: E, sink: AdvertisementSink) -> Self {
        let duty_cycle = DutyCycle::new(ScanTiming::from(&config));
        Self {
            config,
            registry: BeaconRegistry::new(),
            expirations: ExpirationTimers::new(),
            duty_cycle,
            radio,
            events,
            sink,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        info!(
            scan_time_ms = self.config.scan_time_ms,
            scan_interval_ms = self.config.scan_interval_ms,
            fast_scan_interval_ms = self.config.fast_scan_interval_ms,
            expiration_interval_ms = self.config.expiration_interval_ms,
            "Beacon service started"
        );
        self.enter_next_phase(Instant::now());

        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                biased;

                () = wait_until(deadline) => self.on_timers(Instant::now()),
                command = commands.recv() => match command {
                    Some(Command::Advertisement(advertisement)) => {
                        self.handle_advertisement(&advertisement, Instant::now());
                    }
                    Some(Command::Snapshot(reply)) => {
                        let _ = reply.send(self.registry.snapshot());
                    }
                    Some(Command::Clear) => self.clear(),
                    Some(Command::Stop) | None => break,
                },
            }
        }

        self.shutdown();
    }

    /// Decode, filter and record one advertisement.
    ///
    /// Returns how the registry changed, or `None` when the advertisement was
    /// not an accepted beacon.
    fn handle_advertisement(
        &mut self,
        advertisement: &Advertisement,
        now: Instant,
    ) -> Option<UpsertOutcome> {
        let Some(observation) = frame::decode(
            &advertisement.payload,
            advertisement.rssi,
            advertisement.address.as_deref(),
        ) else {
            trace!(len = advertisement.payload.len(), "Ignoring non-beacon advertisement");
            return None;
        };

        let identity = *observation.identity();
        if !self.config.accepts(&identity.uuid) {
            trace!(%identity, "Beacon filtered out by uuid allow-list");
            return None;
        }

        let expiration = self.config.expiration_interval();
        let outcome = self
            .registry
            .upsert(observation, wall_clock_after(expiration));
        self.expirations.arm(identity, expiration, now);

        match outcome {
            UpsertOutcome::Inserted => {
                info!(%identity, rssi = advertisement.rssi, "Beacon detected");
            }
            UpsertOutcome::Updated => {
                debug!(%identity, rssi = advertisement.rssi, "Beacon signal changed");
            }
            UpsertOutcome::Unchanged => trace!(%identity, "Beacon still in range"),
        }

        if outcome.is_change() {
            if let Some(observation) = self.registry.get(&identity) {
                self.events.beacon_detected(observation);
            }
        }
        Some(outcome)
    }

    /// Process everything due at `now`: expirations first, then the duty cycle.
    fn on_timers(&mut self, now: Instant) {
        for identity in self.expirations.take_due(now) {
            match self.registry.remove(&identity) {
                Some(observation) => {
                    info!(%identity, "Beacon expired");
                    self.events.beacon_expired(&observation);
                }
                None => debug!(%identity, "Expiration for untracked beacon ignored"),
            }
        }

        if self.duty_cycle.is_due(now) {
            self.enter_next_phase(now);
        }
    }

    fn enter_next_phase(&mut self, now: Instant) {
        let transition = self.duty_cycle.advance(now, !self.registry.is_empty());
        debug!(
            phase = ?transition.phase,
            fast = transition.fast,
            tracked = self.registry.len(),
            "Duty cycle transition"
        );
        self.events.scan_status_changed(transition.status);

        match transition.phase {
            Phase::Scanning => {
                if let Err(e) = self.radio.start_scan(self.sink.clone()) {
                    warn!(error = %e, "Failed to start BLE scan; retrying next window");
                }
            }
            Phase::Idle => self.radio.stop_scan(),
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        match (self.duty_cycle.deadline(), self.expirations.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Forget every tracked beacon without publishing expirations.
    ///
    /// Pending deadlines are left in place and fire silently.
    fn clear(&mut self) {
        info!(tracked = self.registry.len(), "Clearing beacon registry");
        self.registry.clear();
    }

    fn shutdown(&mut self) {
        self.duty_cycle.halt();
        self.radio.stop_scan();
        self.expirations.clear();
        self.registry.clear();
        self.events.scan_status_changed(ScanStatus::Off);
        info!("Beacon service stopped");
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn wall_clock_after(delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Controls a running [`BeaconService`].
///
/// Dropping the handle stops the service.
#[derive(Debug)]
pub struct ServiceHandle {
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl ServiceHandle {
    /// A sink radios (or tests) can use to deliver advertisements.
    #[must_use]
    pub fn advertisement_sink(&self) -> AdvertisementSink {
        AdvertisementSink::new(self.commands.clone())
    }

    /// Deliver one advertisement to the service.
    ///
    /// # Errors
    ///
    /// Returns [`LanternError::ServiceStopped`] if the service is gone.
    pub fn deliver(&self, advertisement: Advertisement) -> Result<()> {
        self.send(Command::Advertisement(advertisement))
    }

    /// Every currently tracked beacon, most recently changed last.
    ///
    /// # Errors
    ///
    /// Returns [`LanternError::ServiceStopped`] if the service is gone.
    pub async fn snapshot(&self) -> Result<Vec<BeaconObservation>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply))?;
        rx.await.map_err(|_| LanternError::ServiceStopped)
    }

    /// Forget every tracked beacon. No expiration events are published for
    /// them.
    ///
    /// # Errors
    ///
    /// Returns [`LanternError::ServiceStopped`] if the service is gone.
    pub fn clear(&self) -> Result<()> {
        self.send(Command::Clear)
    }

    /// Whether the service task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop scanning and wait for the service task to finish.
    ///
    /// The last event published is [`ScanStatus::Off`]. No expiration fires
    /// after this returns.
    ///
    /// # Errors
    ///
    /// Returns [`LanternError::ServiceStopped`] if the task had already died.
    pub async fn stop(mut self) -> Result<()> {
        let _ = self.commands.send(Command::Stop);
        match self.task.take() {
            Some(task) => task.await.map_err(|e| {
                error!(error = %e, "Beacon service task failed");
                LanternError::ServiceStopped
            }),
            None => Ok(()),
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| LanternError::ServiceStopped)
    }
}

impl Drop for ServiceHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.commands.send(Command::Stop);
        }
    }
}
