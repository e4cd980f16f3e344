//! Newline-delimited JSON event output.
//!
//! Every service event becomes one JSON object on its own line:
//!
//! ```text
//! {"event":"status_changed","data":"scanning"}
//! {"event":"detected","data":{"identity":{"uuid":"…","major":1,"minor":2},"rssi":-60,…}}
//! ```

use std::io::{self, Write};

use lantern_core::{BeaconEvent, BeaconObservation, EventSink, ScanStatus};
use tracing::warn;

/// Serialize one event as a JSON line, including the trailing newline.
///
/// # Errors
///
/// Returns an error if the event cannot be serialized.
pub fn to_json_line(event: &BeaconEvent) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(event)?;
    line.push('\n');
    Ok(line)
}

/// Writes every event it receives as a JSON line.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: W,
    failed: bool,
}

impl JsonLinesSink<io::Stdout> {
    /// A sink writing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonLinesSink<W> {
    /// A sink writing to `writer`.
    pub const fn new(writer: W) -> Self {
        Self {
            writer,
            failed: false,
        }
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn emit(&mut self, event: &BeaconEvent) {
        let result = to_json_line(event)
            .map_err(io::Error::from)
            .and_then(|line| {
                self.writer.write_all(line.as_bytes())?;
                self.writer.flush()
            });

        // a closed pipe would otherwise log once per event
        match result {
            Ok(()) => self.failed = false,
            Err(e) if !self.failed => {
                warn!(error = %e, "Failed to write event");
                self.failed = true;
            }
            Err(_) => {}
        }
    }
}

impl<W: Write + Send + 'static> EventSink for JsonLinesSink<W> {
    fn beacon_detected(&mut self, observation: &BeaconObservation) {
        self.emit(&BeaconEvent::Detected(observation.clone()));
    }

    fn beacon_expired(&mut self, observation: &BeaconObservation) {
        self.emit(&BeaconEvent::Expired(observation.clone()));
    }

    fn scan_status_changed(&mut self, status: ScanStatus) {
        self.emit(&BeaconEvent::StatusChanged(status));
    }
}

#[cfg(test)]
mod tests {
    use lantern_core::BeaconIdentity;
    use serde_json::Value;
    use uuid::Uuid;

    use super::*;

    fn observation() -> BeaconObservation {
        BeaconObservation::new(
            BeaconIdentity::new(Uuid::from_u128(0xabcd), 10, 20),
            -59,
            -60,
            Some("AA:BB:CC:DD:EE:FF".to_string()),
        )
    }

    fn lines(sink: JsonLinesSink<Vec<u8>>) -> Vec<Value> {
        let bytes = sink.into_inner();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_one_line_per_event() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.scan_status_changed(ScanStatus::Scanning);
        sink.beacon_detected(&observation());
        sink.beacon_expired(&observation());

        let events = lines(sink);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["event"], "status_changed");
        assert_eq!(events[0]["data"], "scanning");
        assert_eq!(events[1]["event"], "detected");
        assert_eq!(events[1]["data"]["identity"]["major"], 10);
        assert_eq!(events[1]["data"]["rssi"], -60);
        assert_eq!(events[1]["data"]["proximity"], "near");
        assert_eq!(events[2]["event"], "expired");
    }

    #[test]
    fn test_json_line_is_newline_terminated() {
        let line = to_json_line(&BeaconEvent::StatusChanged(ScanStatus::Off)).unwrap();
        assert_eq!(line, "{\"event\":\"status_changed\",\"data\":\"off\"}\n");
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_errors_are_swallowed() {
        let mut sink = JsonLinesSink::new(BrokenPipe);
        sink.scan_status_changed(ScanStatus::Scanning);
        assert!(sink.failed);
        sink.scan_status_changed(ScanStatus::Off);
        assert!(sink.failed);
    }
}
