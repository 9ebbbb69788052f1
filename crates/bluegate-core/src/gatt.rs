//! GATT service listing for one device.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::bus::ObjectTreeReader;
use crate::error::Result;
use crate::tree::{device_path, ManagedObjectTree, GATT_SERVICE_INTERFACE};
use crate::types::GattServiceEntry;

/// Resolves the GATT services BlueZ has exported for a device.
pub struct GattServiceResolver {
    adapter_path: String,
    objects: Arc<dyn ObjectTreeReader>,
}

impl GattServiceResolver {
    /// Creates a resolver for devices under `adapter_path`.
    pub fn new(adapter_path: impl Into<String>, objects: Arc<dyn ObjectTreeReader>) -> Self {
        Self {
            adapter_path: adapter_path.into(),
            objects,
        }
    }

    /// Lists the services of the device at `address`, in object path order.
    ///
    /// An unknown device, or one with no resolved services, yields an empty
    /// list.
    ///
    /// # Errors
    ///
    /// Only a [`crate::BluegateError::TransportFault`] from the tree fetch.
    pub async fn list_services(&self, address: &str) -> Result<Vec<GattServiceEntry>> {
        let tree = self.objects.fetch_all().await.map_err(|e| {
            error!(%address, error = %e, "Failed to get GATT services for {address}");
            e
        })?;

        let services = services_for_device(&tree, &device_path(&self.adapter_path, address));
        info!(%address, count = services.len(), "Retrieved {} GATT services for {address}", services.len());
        Ok(services)
    }
}

/// Every `org.bluez.GattService1` object under `device_path`, in tree order.
#[must_use]
pub fn services_for_device(tree: &ManagedObjectTree, device_path: &str) -> Vec<GattServiceEntry> {
    tree.under_path(device_path)
        .filter_map(|(path, ifaces)| {
            let props = ifaces.get(GATT_SERVICE_INTERFACE)?;
            let uuid = props.get("UUID").and_then(|v| v.as_str());
            let primary = props.get("Primary").and_then(|v| v.as_bool());

            let (Some(uuid), Some(primary)) = (uuid, primary) else {
                warn!(path, "Skipping GATT service object with missing properties");
                return None;
            };
            Some(GattServiceEntry {
                uuid: uuid.to_string(),
                primary,
            })
        })
        .collect()
}
