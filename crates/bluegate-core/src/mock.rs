//! In-memory stand-in for `bluetoothd`.
//!
//! Used by the test suites and by builds without the `bluetooth` feature.
//! The tree it serves is set by the caller; faults can be injected per
//! adapter operation, per device operation, or for the tree fetch, and every
//! call is counted so tests can assert on what the core actually did.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::bus::{AdapterHandle, DeviceInvoker, ObjectTreeReader};
use crate::error::{BluegateError, Result};
use crate::tree::{
    adapter_path, device_path, ManagedObjectTree, PropertyMap, PropertyValue, DEVICE_INTERFACE,
    GATT_SERVICE_INTERFACE,
};
use crate::types::DeviceOperation;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A fake Bluetooth management service.
#[derive(Debug)]
pub struct MockBackend {
    adapter_path: String,
    tree: Mutex<ManagedObjectTree>,
    fetch_fault: Mutex<Option<String>>,
    adapter_faults: Mutex<HashMap<String, String>>,
    device_faults: Mutex<HashMap<(String, DeviceOperation), String>>,
    invocations: Mutex<Vec<(String, DeviceOperation)>>,
    powered: AtomicBool,
    discoverable: AtomicBool,
    pairable: AtomicBool,
    discovering: AtomicBool,
    start_discovery_calls: AtomicUsize,
    stop_discovery_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MockBackend {
    /// Creates a backend for the adapter called `adapter` (e.g. `hci0`) with an
    /// empty object tree.
    #[must_use]
    pub fn new(adapter: &str) -> Self {
        Self {
            adapter_path: adapter_path(adapter),
            tree: Mutex::new(ManagedObjectTree::new()),
            fetch_fault: Mutex::new(None),
            adapter_faults: Mutex::new(HashMap::new()),
            device_faults: Mutex::new(HashMap::new()),
            invocations: Mutex::new(Vec::new()),
            powered: AtomicBool::new(false),
            discoverable: AtomicBool::new(false),
            pairable: AtomicBool::new(false),
            discovering: AtomicBool::new(false),
            start_discovery_calls: AtomicUsize::new(0),
            stop_discovery_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// Replaces the whole object tree.
    pub fn set_tree(&self, tree: ManagedObjectTree) {
        *lock(&self.tree) = tree;
    }

    /// Adds a `Device1` object for `address`. `name: None` leaves the `Name`
    /// property out, as BlueZ does for devices that never advertised one.
    pub fn add_device(&self, address: &str, name: Option<&str>, paired: bool, connected: bool) {
        let mut props = PropertyMap::new();
        props.insert("Address".into(), PropertyValue::from(address));
        if let Some(name) = name {
            props.insert("Name".into(), PropertyValue::from(name));
        }
        props.insert("Paired".into(), PropertyValue::Bool(paired));
        props.insert("Connected".into(), PropertyValue::Bool(connected));
        props.insert(
            "Adapter".into(),
            PropertyValue::ObjectPath(self.adapter_path.clone()),
        );

        let path = device_path(&self.adapter_path, address);
        lock(&self.tree).insert(path, DEVICE_INTERFACE, props);
    }

    /// Adds a `GattService1` object below the device with `address`.
    pub fn add_gatt_service(&self, address: &str, handle: u16, uuid: &str, primary: bool) {
        let device = device_path(&self.adapter_path, address);
        let mut props = PropertyMap::new();
        props.insert("UUID".into(), PropertyValue::from(uuid));
        props.insert("Primary".into(), PropertyValue::Bool(primary));
        props.insert("Device".into(), PropertyValue::ObjectPath(device.clone()));

        lock(&self.tree).insert(
            format!("{device}/service{handle:04x}"),
            GATT_SERVICE_INTERFACE,
            props,
        );
    }

    /// Makes every tree fetch fail with `cause` until cleared.
    pub fn fail_fetch(&self, cause: &str) {
        *lock(&self.fetch_fault) = Some(cause.to_string());
    }

    /// Lets tree fetches succeed again.
    pub fn clear_fetch_fault(&self) {
        *lock(&self.fetch_fault) = None;
    }

    /// Makes the adapter operation `operation` (e.g. `StartDiscovery`) fail.
    pub fn fail_adapter(&self, operation: &str, cause: &str) {
        lock(&self.adapter_faults).insert(operation.to_string(), cause.to_string());
    }

    /// Makes `operation` on the device with `address` fail with `cause`.
    pub fn fail_device(&self, address: &str, operation: DeviceOperation, cause: &str) {
        let path = device_path(&self.adapter_path, address);
        lock(&self.device_faults).insert((path, operation), cause.to_string());
    }

    /// Number of `StartDiscovery` calls so far.
    pub fn start_discovery_calls(&self) -> usize {
        self.start_discovery_calls.load(Ordering::SeqCst)
    }

    /// Number of `StopDiscovery` calls so far.
    pub fn stop_discovery_calls(&self) -> usize {
        self.stop_discovery_calls.load(Ordering::SeqCst)
    }

    /// Number of tree fetches so far.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Device methods invoked so far, as `(object path, operation)`.
    pub fn invocations(&self) -> Vec<(String, DeviceOperation)> {
        lock(&self.invocations).clone()
    }

    /// Current `(powered, discoverable, pairable)` flags.
    pub fn adapter_flags(&self) -> (bool, bool, bool) {
        (
            self.powered.load(Ordering::SeqCst),
            self.discoverable.load(Ordering::SeqCst),
            self.pairable.load(Ordering::SeqCst),
        )
    }

    /// Whether discovery is currently on.
    pub fn is_discovering(&self) -> bool {
        self.discovering.load(Ordering::SeqCst)
    }

    fn check_adapter(&self, operation: &str) -> Result<()> {
        match lock(&self.adapter_faults).get(operation) {
            Some(cause) => Err(BluegateError::adapter(operation, cause.clone())),
            None => Ok(()),
        }
    }

    fn set_flag(&self, operation: &str, flag: &AtomicBool, value: bool) -> Result<()> {
        self.check_adapter(operation)?;
        flag.store(value, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl AdapterHandle for MockBackend {
    fn path(&self) -> &str {
        &self.adapter_path
    }

    async fn set_powered(&self, powered: bool) -> Result<()> {
        self.set_flag("SetPowered", &self.powered, powered)
    }

    async fn set_discoverable(&self, discoverable: bool) -> Result<()> {
        self.set_flag("SetDiscoverable", &self.discoverable, discoverable)
    }

    async fn set_pairable(&self, pairable: bool) -> Result<()> {
        self.set_flag("SetPairable", &self.pairable, pairable)
    }

    async fn start_discovery(&self) -> Result<()> {
        self.start_discovery_calls.fetch_add(1, Ordering::SeqCst);
        self.set_flag("StartDiscovery", &self.discovering, true)
    }

    async fn stop_discovery(&self) -> Result<()> {
        self.stop_discovery_calls.fetch_add(1, Ordering::SeqCst);
        self.set_flag("StopDiscovery", &self.discovering, false)
    }
}

#[async_trait]
impl ObjectTreeReader for MockBackend {
    async fn fetch_all(&self) -> Result<ManagedObjectTree> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(cause) = lock(&self.fetch_fault).clone() {
            return Err(BluegateError::transport(cause));
        }
        Ok(lock(&self.tree).clone())
    }
}

#[async_trait]
impl DeviceInvoker for MockBackend {
    async fn invoke(&self, address: &str, path: &str, operation: DeviceOperation) -> Result<()> {
        lock(&self.invocations).push((path.to_string(), operation));

        if let Some(cause) = lock(&self.device_faults).get(&(path.to_string(), operation)) {
            return Err(BluegateError::device(address, cause.clone()));
        }
        if lock(&self.tree).get(path).is_none() {
            return Err(BluegateError::device(
                address,
                "org.freedesktop.DBus.Error.UnknownObject",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tree_contains_seeded_objects() {
        let mock = MockBackend::new("hci0");
        mock.add_device("AA:BB:CC:DD:EE:FF", None, false, false);
        mock.add_gatt_service("AA:BB:CC:DD:EE:FF", 0x10, "1800", true);

        let tree = mock.fetch_all().await.unwrap();
        assert_eq!(tree.len(), 2);
        assert!(tree
            .get("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF/service0010")
            .is_some());
        assert_eq!(mock.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let mock = MockBackend::new("hci0");
        mock.fail_fetch("org.freedesktop.DBus.Error.NoReply");
        assert!(matches!(
            mock.fetch_all().await,
            Err(BluegateError::TransportFault(_))
        ));

        mock.fail_adapter("SetPowered", "org.bluez.Error.Failed");
        assert!(matches!(
            mock.set_powered(true).await,
            Err(BluegateError::AdapterFault { .. })
        ));
        assert_eq!(mock.adapter_flags(), (false, false, false));
    }

    #[tokio::test]
    async fn test_unknown_device_is_rejected() {
        let mock = MockBackend::new("hci0");
        let err = mock
            .invoke("11:22:33:44:55:66", "/org/bluez/hci0/dev_11_22_33_44_55_66", DeviceOperation::Connect)
            .await
            .unwrap_err();
        assert_eq!(
            err.upstream_cause(),
            Some("org.freedesktop.DBus.Error.UnknownObject")
        );
        assert_eq!(mock.invocations().len(), 1);
    }
}
