//! Shared types and OpenAPI schemas.
//!
//! These are the normalized records the core hands out: the devices seen by
//! the last completed scan, the GATT services of one device, and the kinds of
//! connection operation a caller may request.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Name used when a device does not advertise one.
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown";

/// A remote Bluetooth device as of the last completed scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Device {
    /// Bluetooth MAC address.
    #[schema(example = "AA:BB:CC:DD:EE:FF")]
    pub address: String,

    /// Advertised name, or `"Unknown"`.
    #[schema(example = "Pixel Buds")]
    pub name: String,

    /// Whether the device is paired with the adapter.
    #[schema(example = false)]
    pub paired: bool,

    /// Whether the device is currently connected.
    #[schema(example = false)]
    pub connected: bool,
}

/// One GATT service exposed by a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GattServiceEntry {
    /// Service UUID.
    #[schema(example = "0000180f-0000-1000-8000-00805f9b34fb")]
    pub uuid: String,

    /// Whether this is a primary service.
    #[schema(example = true)]
    pub primary: bool,
}

/// A connection-state operation on a single device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeviceOperation {
    /// `org.bluez.Device1.Pair`
    Pair,
    /// `org.bluez.Device1.Connect`
    Connect,
    /// `org.bluez.Device1.Disconnect`
    Disconnect,
}

impl DeviceOperation {
    /// D-Bus method name on `org.bluez.Device1`.
    #[must_use]
    pub const fn method_name(self) -> &'static str {
        match self {
            Self::Pair => "Pair",
            Self::Connect => "Connect",
            Self::Disconnect => "Disconnect",
        }
    }

    /// Past-tense phrase for user-facing messages, e.g. "Paired with".
    #[must_use]
    pub const fn done_phrase(self) -> &'static str {
        match self {
            Self::Pair => "Paired with",
            Self::Connect => "Connected to",
            Self::Disconnect => "Disconnected from",
        }
    }
}

impl fmt::Display for DeviceOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_serialization() {
        let device = Device {
            address: "AA:BB:CC:DD:EE:FF".to_string(),
            name: UNKNOWN_DEVICE_NAME.to_string(),
            paired: false,
            connected: true,
        };
        let json = serde_json::to_string(&device).unwrap();
        assert!(json.contains("\"name\":\"Unknown\""));
        assert!(json.contains("\"connected\":true"));
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(DeviceOperation::Pair.to_string(), "Pair");
        assert_eq!(DeviceOperation::Disconnect.method_name(), "Disconnect");
        assert_eq!(DeviceOperation::Connect.done_phrase(), "Connected to");
        let op: DeviceOperation = serde_json::from_str("\"connect\"").unwrap();
        assert_eq!(op, DeviceOperation::Connect);
    }
}
