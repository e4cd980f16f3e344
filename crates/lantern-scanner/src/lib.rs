//! # lantern-scanner
//!
//! Command-line host for the lantern iBeacon scanner.
//!
//! This library provides the pieces the binary wires together:
//! - [`logging`] - Environment-aware tracing setup
//! - [`output`] - Newline-delimited JSON event output
//! - [`replay`] - A radio replaying advertisements from text input

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod logging;
pub mod output;
pub mod replay;
