//! # lantern-core
//!
//! Core logic for the lantern iBeacon scanner.
//!
//! This crate provides:
//! - iBeacon advertisement decoding and distance estimation
//! - A registry of beacons currently in range, with per-beacon expiration
//! - A duty-cycled scan service that switches to fast scanning while
//!   beacons are tracked
//! - Configuration loading and validation
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`frame`] - iBeacon frame decoding and advertisement record building
//! - [`distance`] - RSSI based distance estimation and proximity buckets
//! - [`registry`] - Tracked beacons keyed by identity
//! - [`expiration`] - One pending expiration deadline per tracked beacon
//! - [`duty_cycle`] - Scan/idle phase state machine
//! - [`service`] - The scan service task and its control handle
//! - [`radio`] - BLE radio abstraction (BlueZ, mock)
//! - [`events`] - Events published to observers
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Unified error types for the crate
//! - [`types`] - Shared beacon types

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod config;
pub mod distance;
pub mod duty_cycle;
pub mod error;
pub mod events;
pub mod expiration;
pub mod frame;
pub mod radio;
pub mod registry;
pub mod service;
pub mod types;

// Re-export primary types for convenience
pub use config::{BluetoothConfig, Config, ConfigError, ConfigResult, ScanConfig};
pub use distance::{estimate_distance, Proximity};
pub use error::{LanternError, Result};
pub use events::{BeaconEvent, EventSink};
pub use frame::decode;
#[cfg(feature = "bluetooth")]
pub use radio::BluezRadio;
#[cfg(any(feature = "mock-radio", not(feature = "bluetooth")))]
pub use radio::MockRadio;
pub use radio::{Advertisement, AdvertisementSink, Radio, RadioError};
pub use registry::{BeaconRegistry, UpsertOutcome};
pub use service::{BeaconService, ServiceHandle};
pub use types::{BeaconIdentity, BeaconObservation, ScanStatus};
