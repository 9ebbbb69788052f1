//! In-memory device registry.
//!
//! Holds the device set produced by the most recently completed scan. Writers
//! swap in a whole new set; readers get the set that was current when they
//! asked, so nobody ever observes a half-populated registry.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::types::Device;

/// Concurrent store of normalized devices with atomic replace-all.
#[derive(Debug)]
pub struct DeviceRegistry {
    devices: ArcSwap<Vec<Device>>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            devices: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Replaces the whole device set at once. An empty set clears the registry.
    pub fn replace_all(&self, devices: Vec<Device>) {
        self.devices.store(Arc::new(devices));
    }

    /// Current device set. The returned value is immutable and unaffected by
    /// later replacements.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<Device>> {
        self.devices.load_full()
    }

    /// Number of devices in the current set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.load().len()
    }

    /// Whether the current set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.load().is_empty()
    }
}
