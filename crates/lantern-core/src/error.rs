//! Unified error types for the lantern core library.
//!
//! This module provides a unified error type [`LanternError`] that covers all failure
//! modes across lantern. Each module also has its own specific error type
//! ([`ConfigError`](crate::config::ConfigError), [`RadioError`](crate::radio::RadioError))
//! for internal use.
//!
//! Note that a payload that is not an iBeacon is never an error: the decoder
//! returns `None` for it.
//!
//! # Example
//!
//! ```rust
//! use lantern_core::error::{LanternError, Result};
//!
//! fn require_enabled(enabled: bool) -> Result<()> {
//!     if !enabled {
//!         return Err(LanternError::AdapterUnavailable);
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The unified error type for all lantern operations.
#[derive(Debug, Error)]
pub enum LanternError {
    // =========================================================================
    // RADIO ERRORS
    // =========================================================================
    /// No Bluetooth adapter was found on this system.
    #[error(
        "No Bluetooth adapter found. Ensure Bluetooth hardware is present and drivers are loaded."
    )]
    AdapterNotFound,

    /// The Bluetooth adapter exists but is powered off.
    #[error("Bluetooth adapter is powered off. Run 'bluetoothctl power on' to enable.")]
    AdapterPoweredOff,

    /// The radio reported itself unavailable when the service was started.
    #[error("Bluetooth radio is unavailable or disabled; the scan service was not started")]
    AdapterUnavailable,

    /// Starting or running a BLE scan failed.
    #[error("Bluetooth scan failed: {0}")]
    ScanFailed(String),

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// An explicitly requested configuration file does not exist.
    #[error("Configuration file not found: {0}")]
    ConfigNotFound(String),

    /// The configuration sources could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // SERVICE ERRORS
    // =========================================================================
    /// The scan service is no longer running.
    #[error("Beacon service has stopped")]
    ServiceStopped,
}

/// A specialized [`Result`] type for lantern operations.
pub type Result<T> = std::result::Result<T, LanternError>;

impl LanternError {
    /// Returns `true` if this error is related to the Bluetooth radio.
    #[inline]
    #[must_use]
    pub const fn is_radio_error(&self) -> bool {
        matches!(
            self,
            Self::AdapterNotFound
                | Self::AdapterPoweredOff
                | Self::AdapterUnavailable
                | Self::ScanFailed(_)
        )
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_) | Self::ConfigParseError(_) | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if retrying later may succeed without user intervention.
    ///
    /// Adapter problems are not retried: the caller must restart the service.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::ScanFailed(_))
    }

    /// Returns a machine-readable error code.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::AdapterNotFound => "BLUETOOTH_ADAPTER_NOT_FOUND",
            Self::AdapterPoweredOff => "BLUETOOTH_ADAPTER_POWERED_OFF",
            Self::AdapterUnavailable => "BLUETOOTH_ADAPTER_UNAVAILABLE",
            Self::ScanFailed(_) => "BLUETOOTH_SCAN_FAILED",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::ServiceStopped => "SERVICE_STOPPED",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::config::ConfigError> for LanternError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::NotFound(path) => Self::ConfigNotFound(path),
            ConfigError::Load(e) => Self::ConfigParseError(e.to_string()),
            err @ ConfigError::ValidationError { .. } => {
                Self::ConfigValidationError(err.to_string())
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

impl From<crate::radio::RadioError> for LanternError {
    fn from(err: crate::radio::RadioError) -> Self {
        use crate::radio::RadioError;
        match err {
            RadioError::AdapterNotFound => Self::AdapterNotFound,
            RadioError::AdapterPoweredOff => Self::AdapterPoweredOff,
            RadioError::SessionInitFailed { message }
            | RadioError::DiscoveryFailed { message } => Self::ScanFailed(message),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::radio::RadioError;

    #[test]
    fn test_radio_error_classification() {
        assert!(LanternError::AdapterNotFound.is_radio_error());
        assert!(LanternError::AdapterPoweredOff.is_radio_error());
        assert!(LanternError::AdapterUnavailable.is_radio_error());
        assert!(LanternError::ScanFailed("test".into()).is_radio_error());

        assert!(!LanternError::ServiceStopped.is_radio_error());
    }

    #[test]
    fn test_config_error_classification() {
        assert!(LanternError::ConfigNotFound("/test".into()).is_config_error());
        assert!(LanternError::ConfigParseError("syntax error".into()).is_config_error());
        assert!(LanternError::ConfigValidationError("invalid value".into()).is_config_error());

        assert!(!LanternError::AdapterNotFound.is_config_error());
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(LanternError::ScanFailed("timeout".into()).is_recoverable());
        assert!(!LanternError::AdapterUnavailable.is_recoverable());
        assert!(!LanternError::AdapterPoweredOff.is_recoverable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            LanternError::AdapterNotFound.error_code(),
            "BLUETOOTH_ADAPTER_NOT_FOUND"
        );
        assert_eq!(LanternError::ServiceStopped.error_code(), "SERVICE_STOPPED");
        assert_eq!(
            LanternError::ConfigNotFound(String::new()).error_code(),
            "CONFIG_NOT_FOUND"
        );
    }

    #[test]
    fn test_from_config_error() {
        let err: LanternError = ConfigError::ValidationError {
            field: "scan_time_ms",
            message: "must be greater than zero".into(),
        }
        .into();
        assert!(matches!(err, LanternError::ConfigValidationError(ref m) if m.contains("scan_time_ms")));

        let err: LanternError = ConfigError::NotFound("/etc/lantern.toml".into()).into();
        assert!(matches!(err, LanternError::ConfigNotFound(_)));
    }

    #[test]
    fn test_from_radio_error() {
        let err: LanternError = RadioError::AdapterPoweredOff.into();
        assert!(matches!(err, LanternError::AdapterPoweredOff));

        let err: LanternError = RadioError::DiscoveryFailed {
            message: "dbus".into(),
        }
        .into();
        assert!(matches!(err, LanternError::ScanFailed(ref m) if m == "dbus"));
    }

    #[test]
    fn test_error_display_messages() {
        let err = LanternError::AdapterNotFound;
        assert!(format!("{err}").contains("No Bluetooth adapter found"));

        let err = LanternError::ScanFailed("busy".into());
        assert!(format!("{err}").contains("busy"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<LanternError>();
        assert_sync::<LanternError>();
    }
}
