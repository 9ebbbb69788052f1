//! The adapter-facing facade used by outer layers.
//!
//! [`BluetoothService`] wires one backend into the scan orchestrator, the
//! device registry, the connection manager and the GATT resolver, so callers
//! hold a single handle. [`prepare_adapter`] applies the startup flags.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::bus::{AdapterHandle, DeviceInvoker, ObjectTreeReader};
use crate::config::AdapterConfig;
use crate::connection::ConnectionManager;
use crate::error::Result;
use crate::gatt::GattServiceResolver;
use crate::registry::DeviceRegistry;
use crate::scan::{ScanOrchestrator, ScanStatus, ScanTicket};
use crate::types::{Device, DeviceOperation, GattServiceEntry};

/// Powers the adapter and applies the discoverable/pairable flags.
///
/// Runs once at startup. The first failing call aborts with its
/// [`crate::BluegateError::AdapterFault`].
pub async fn prepare_adapter(adapter: &dyn AdapterHandle, settings: &AdapterConfig) -> Result<()> {
    apply_flag(adapter, "powered", settings.powered, adapter.set_powered(settings.powered)).await?;
    apply_flag(
        adapter,
        "discoverable",
        settings.discoverable,
        adapter.set_discoverable(settings.discoverable),
    )
    .await?;
    apply_flag(adapter, "pairable", settings.pairable, adapter.set_pairable(settings.pairable)).await?;

    info!(adapter = adapter.path(), "Adapter ready");
    Ok(())
}

async fn apply_flag(
    adapter: &dyn AdapterHandle,
    flag: &str,
    value: bool,
    call: impl Future<Output = Result<()>>,
) -> Result<()> {
    if let Err(e) = call.await {
        error!(adapter = adapter.path(), flag, value, error = %e, "Failed to prepare adapter");
        return Err(e);
    }
    info!(adapter = adapter.path(), flag, value, "Adapter flag set");
    Ok(())
}

/// One adapter's worth of Bluetooth operations.
pub struct BluetoothService {
    adapter: Arc<dyn AdapterHandle>,
    registry: Arc<DeviceRegistry>,
    scanner: ScanOrchestrator,
    connections: ConnectionManager,
    gatt: GattServiceResolver,
}

impl BluetoothService {
    /// Builds the service on top of a backend that provides all three bus
    /// capabilities.
    pub fn new<B>(backend: Arc<B>, window: Duration) -> Self
    where
        B: AdapterHandle + ObjectTreeReader + DeviceInvoker + 'static,
    {
        let adapter: Arc<dyn AdapterHandle> = Arc::clone(&backend) as Arc<dyn AdapterHandle>;
        let objects: Arc<dyn ObjectTreeReader> = Arc::clone(&backend) as Arc<dyn ObjectTreeReader>;
        let invoker: Arc<dyn DeviceInvoker> = backend;

        let adapter_path = adapter.path().to_string();
        let registry = Arc::new(DeviceRegistry::new());

        Self {
            scanner: ScanOrchestrator::new(
                Arc::clone(&adapter),
                Arc::clone(&objects),
                Arc::clone(&registry),
                window,
            ),
            connections: ConnectionManager::new(adapter_path.clone(), invoker),
            gatt: GattServiceResolver::new(adapter_path, objects),
            adapter,
            registry,
        }
    }

    /// The adapter this service drives.
    #[must_use]
    pub fn adapter(&self) -> &dyn AdapterHandle {
        &*self.adapter
    }

    /// The device registry fed by completed scans.
    #[must_use]
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Triggers a background scan. See [`ScanOrchestrator::begin`].
    pub fn begin_scan(&self) -> ScanTicket {
        self.scanner.begin()
    }

    /// Current scan status.
    #[must_use]
    pub fn scan_status(&self) -> ScanStatus {
        self.scanner.status()
    }

    /// Whether a scan is running.
    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.scanner.is_running()
    }

    /// Length of the discovery window.
    #[must_use]
    pub const fn discovery_window(&self) -> Duration {
        self.scanner.window()
    }

    /// Waits for any running scan to finish.
    pub async fn wait_idle(&self) {
        self.scanner.wait_idle().await;
    }

    /// Devices found by the last completed scan.
    #[must_use]
    pub fn list_devices(&self) -> Arc<Vec<Device>> {
        self.registry.snapshot()
    }

    /// Runs a connection-state operation on one device.
    pub async fn operate(&self, operation: DeviceOperation, address: &str) -> Result<()> {
        self.connections.operate(operation, address).await
    }

    /// Pairs with a device.
    pub async fn pair(&self, address: &str) -> Result<()> {
        self.connections.pair(address).await
    }

    /// Connects a device.
    pub async fn connect(&self, address: &str) -> Result<()> {
        self.connections.connect(address).await
    }

    /// Disconnects a device.
    pub async fn disconnect(&self, address: &str) -> Result<()> {
        self.connections.disconnect(address).await
    }

    /// GATT services BlueZ has resolved for a device.
    pub async fn list_services(&self, address: &str) -> Result<Vec<GattServiceEntry>> {
        self.gatt.list_services(address).await
    }
}
