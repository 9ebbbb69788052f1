//! Unified error types for the bluegate core library.
//!
//! [`BluegateError`] covers every failure mode the core can surface. The three
//! Bluetooth variants mirror where a failure happened:
//!
//! - [`BluegateError::TransportFault`]: talking to `bluetoothd` failed (bus down,
//!   timeout, object tree unreadable).
//! - [`BluegateError::AdapterFault`]: the adapter rejected a command.
//! - [`BluegateError::DeviceFault`]: an operation on one remote device was
//!   rejected, or its object path could not be formed.
//!
//! Upstream error text is carried verbatim so callers can diagnose BlueZ
//! rejections such as `org.bluez.Error.AlreadyExists`.
//!
//! # Example
//!
//! ```rust
//! use bluegate_core::error::{BluegateError, Result};
//!
//! fn reject(address: &str) -> Result<()> {
//!     Err(BluegateError::device(address, "org.bluez.Error.NotReady"))
//! }
//!
//! assert!(reject("AA:BB:CC:DD:EE:FF").unwrap_err().is_bluetooth_error());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// The unified error type for all bluegate operations.
#[derive(Debug, Error)]
pub enum BluegateError {
    // =========================================================================
    // BLUETOOTH ERRORS
    // =========================================================================
    /// Communication with the Bluetooth management service failed.
    #[error("Bluetooth transport failure: {0}")]
    TransportFault(String),

    /// An adapter-level command was rejected.
    #[error("Adapter {operation} failed: {cause}")]
    AdapterFault {
        /// The adapter operation that failed (e.g. `StartDiscovery`).
        operation: String,
        /// Upstream error text.
        cause: String,
    },

    /// An operation on a specific device was rejected.
    #[error("Device {address}: {cause}")]
    DeviceFault {
        /// Address of the device the operation targeted.
        address: String,
        /// Upstream error text, verbatim.
        cause: String,
    },

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration sources could not be read or parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),
}

/// A specialized [`Result`] type for bluegate operations.
pub type Result<T> = std::result::Result<T, BluegateError>;

impl BluegateError {
    /// Builds a [`BluegateError::TransportFault`].
    pub fn transport(cause: impl Into<String>) -> Self {
        Self::TransportFault(cause.into())
    }

    /// Builds a [`BluegateError::AdapterFault`].
    pub fn adapter(operation: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::AdapterFault {
            operation: operation.into(),
            cause: cause.into(),
        }
    }

    /// Builds a [`BluegateError::DeviceFault`].
    pub fn device(address: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::DeviceFault {
            address: address.into(),
            cause: cause.into(),
        }
    }

    /// Returns `true` if this error is related to Bluetooth operations.
    #[inline]
    #[must_use]
    pub const fn is_bluetooth_error(&self) -> bool {
        matches!(
            self,
            Self::TransportFault(_) | Self::AdapterFault { .. } | Self::DeviceFault { .. }
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

    /// Returns the upstream cause text for Bluetooth faults.
    #[must_use]
    pub fn upstream_cause(&self) -> Option<&str> {
        match self {
            Self::TransportFault(cause)
            | Self::AdapterFault { cause, .. }
            | Self::DeviceFault { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 404 Not Found
            Self::ConfigNotFound(_) => 404,

            // 422 Unprocessable Entity - semantic errors
            Self::ConfigParseError(_) | Self::ConfigValidationError(_) => 422,

            // 500 Internal Server Error - the device rejected the request
            Self::DeviceFault { .. } => 500,

            // 503 Service Unavailable - bluetoothd or the radio is unusable
            Self::TransportFault(_) | Self::AdapterFault { .. } => 503,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::TransportFault(_) => "BLUETOOTH_TRANSPORT_FAULT",
            Self::AdapterFault { .. } => "BLUETOOTH_ADAPTER_FAULT",
            Self::DeviceFault { .. } => "BLUETOOTH_DEVICE_FAULT",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::config::ConfigError> for BluegateError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::NotFound(path) => Self::ConfigNotFound(path),
            ConfigError::Load(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::ValidationError { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bluetooth_error_classification() {
        assert!(BluegateError::transport("bus closed").is_bluetooth_error());
        assert!(BluegateError::adapter("StartDiscovery", "NotReady").is_bluetooth_error());
        assert!(BluegateError::device("AA:BB:CC:DD:EE:FF", "NotPaired").is_bluetooth_error());

        assert!(!BluegateError::ConfigParseError("x".into()).is_bluetooth_error());
        assert_eq!(BluegateError::ConfigParseError("x".into()).upstream_cause(), None);
    }

    #[test]
    fn test_config_error_classification() {
        assert!(BluegateError::ConfigNotFound(PathBuf::from("/test")).is_config_error());
        assert!(BluegateError::ConfigValidationError("bad".into()).is_config_error());
        assert!(!BluegateError::transport("x").is_config_error());
    }

    #[test]
    fn test_device_fault_keeps_cause_verbatim() {
        let err = BluegateError::device("AA:BB:CC:DD:EE:FF", "org.bluez.Error.AlreadyExists");
        assert_eq!(err.upstream_cause(), Some("org.bluez.Error.AlreadyExists"));
        assert!(err.to_string().contains("AA:BB:CC:DD:EE:FF"));
        assert!(err.to_string().contains("org.bluez.Error.AlreadyExists"));
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(BluegateError::transport("x").http_status_code(), 503);
        assert_eq!(BluegateError::adapter("SetPowered", "x").http_status_code(), 503);
        assert_eq!(BluegateError::device("a", "x").http_status_code(), 500);
        assert_eq!(
            BluegateError::ConfigValidationError("x".into()).http_status_code(),
            422
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            BluegateError::transport("x").error_code(),
            "BLUETOOTH_TRANSPORT_FAULT"
        );
        assert_eq!(
            BluegateError::device("a", "x").error_code(),
            "BLUETOOTH_DEVICE_FAULT"
        );
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<BluegateError>();
        assert_sync::<BluegateError>();
    }
}
