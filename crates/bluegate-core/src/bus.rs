//! Capabilities the core needs from the Bluetooth management service.
//!
//! Each trait is one seam to `bluetoothd`. [`crate::bluez::BluezBackend`]
//! implements all three over D-Bus; [`crate::mock::MockBackend`] implements
//! them in memory.

use async_trait::async_trait;

use crate::error::Result;
use crate::tree::ManagedObjectTree;
use crate::types::DeviceOperation;

/// Control over one local radio.
///
/// Every method fails with [`crate::BluegateError::AdapterFault`] carrying the
/// upstream error text. State changes live in `bluetoothd`, not locally.
#[async_trait]
pub trait AdapterHandle: Send + Sync {
    /// Object path of the adapter, e.g. `/org/bluez/hci0`.
    fn path(&self) -> &str;

    /// Sets the `Powered` property.
    async fn set_powered(&self, powered: bool) -> Result<()>;

    /// Sets the `Discoverable` property.
    async fn set_discoverable(&self, discoverable: bool) -> Result<()>;

    /// Sets the `Pairable` property.
    async fn set_pairable(&self, pairable: bool) -> Result<()>;

    /// Calls `StartDiscovery`.
    async fn start_discovery(&self) -> Result<()>;

    /// Calls `StopDiscovery`.
    async fn stop_discovery(&self) -> Result<()>;
}

/// Read access to the managed object tree.
#[async_trait]
pub trait ObjectTreeReader: Send + Sync {
    /// Fetches the whole tree. Never cached: every call queries the service.
    ///
    /// Fails with [`crate::BluegateError::TransportFault`].
    async fn fetch_all(&self) -> Result<ManagedObjectTree>;
}

/// Per-device method invocation.
#[async_trait]
pub trait DeviceInvoker: Send + Sync {
    /// Invokes `operation` on the device object at `path`.
    ///
    /// Fails with [`crate::BluegateError::DeviceFault`] for `address`, carrying
    /// the upstream error text verbatim.
    async fn invoke(&self, address: &str, path: &str, operation: DeviceOperation) -> Result<()>;
}
