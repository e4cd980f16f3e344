//! A radio that replays advertisements from text input.
//!
//! Each input line describes one advertisement:
//!
//! ```text
//! <rssi> <hex payload> [address]
//! -60 0201061aff4c000215e2c56db5dffb48d2b060d0f5a71096e000010002c5 AA:BB:CC:DD:EE:FF
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Lines read while the
//! duty cycle is idle are dropped, as a real radio would miss them.

use std::sync::{Arc, Mutex, PoisonError};

use lantern_core::radio::RadioResult;
use lantern_core::{Advertisement, AdvertisementSink, Radio};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Why a replay line could not be parsed.
#[derive(Debug, Error, PartialEq)]
pub enum ReplayError {
    /// The line has no payload field.
    #[error("expected '<rssi> <hex payload> [address]'")]
    MissingField,

    /// The rssi is not a signed integer.
    #[error("invalid rssi '{0}'")]
    InvalidRssi(String),

    /// The payload is not an even number of hex digits.
    #[error("invalid hex payload '{payload}'")]
    InvalidPayload {
        /// The offending field.
        payload: String,
        /// What the hex decoder rejected.
        #[source]
        source: hex::FromHexError,
    },

    /// More than three fields.
    #[error("unexpected trailing field '{0}'")]
    TrailingField(String),
}

/// Parse one replay line.
///
/// Returns `Ok(None)` for blank and comment lines.
///
/// # Errors
///
/// Returns a [`ReplayError`] describing the first malformed field.
pub fn parse_line(line: &str) -> Result<Option<Advertisement>, ReplayError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut fields = line.split_whitespace();
    let (Some(rssi), Some(payload)) = (fields.next(), fields.next()) else {
        return Err(ReplayError::MissingField);
    };
    let address = fields.next().map(str::to_string);
    if let Some(extra) = fields.next() {
        return Err(ReplayError::TrailingField(extra.to_string()));
    }

    let rssi = rssi
        .parse::<i16>()
        .map_err(|_| ReplayError::InvalidRssi(rssi.to_string()))?;
    let payload = hex::decode(payload.strip_prefix("0x").unwrap_or(payload)).map_err(|source| {
        ReplayError::InvalidPayload {
            payload: payload.to_string(),
            source,
        }
    })?;

    Ok(Some(Advertisement::new(payload, rssi, address)))
}

type ActiveSink = Arc<Mutex<Option<AdvertisementSink>>>;

/// Replays advertisements read from an async line source.
#[derive(Debug)]
pub struct ReplayRadio {
    active: ActiveSink,
    reader: JoinHandle<()>,
}

impl ReplayRadio {
    /// Replay advertisements from stdin.
    #[must_use]
    pub fn stdin() -> Self {
        Self::spawn(BufReader::new(tokio::io::stdin()))
    }

    /// Replay advertisements from `input`. Must be called within a tokio
    /// runtime.
    pub fn spawn<R>(input: R) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let active = ActiveSink::default();
        let reader = tokio::spawn(read_lines(input, Arc::clone(&active)));
        Self { active, reader }
    }

    fn set_active(&self, sink: Option<AdvertisementSink>) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = sink;
    }
}

impl Radio for ReplayRadio {
    fn is_enabled(&self) -> bool {
        true
    }

    fn start_scan(&mut self, sink: AdvertisementSink) -> RadioResult<()> {
        self.set_active(Some(sink));
        Ok(())
    }

    fn stop_scan(&mut self) {
        self.set_active(None);
    }
}

impl Drop for ReplayRadio {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_lines<R>(input: R, active: ActiveSink)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut line_number = 0_usize;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read replay input");
                break;
            }
        };
        line_number += 1;

        let advertisement = match parse_line(&line) {
            Ok(Some(advertisement)) => advertisement,
            Ok(None) => continue,
            Err(e) => {
                warn!(line = line_number, error = %e, "Skipping malformed replay line");
                continue;
            }
        };

        let sink = active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match sink {
            Some(sink) => {
                if !sink.deliver(advertisement) {
                    debug!("Beacon service gone; stopping replay");
                    return;
                }
            }
            None => trace!(line = line_number, "Radio idle; advertisement dropped"),
        }
    }

    info!(lines = line_number, "Replay input finished");
}
