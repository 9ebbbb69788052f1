//! Managed object tree as reported by BlueZ's `ObjectManager`.
//!
//! The tree maps object paths to the interfaces each object exposes, and each
//! interface to its property map. It is ordered by object path so every
//! consumer walks it in the same order.

use std::collections::BTreeMap;

/// Interface marking an object as a remote Bluetooth device.
pub const DEVICE_INTERFACE: &str = "org.bluez.Device1";

/// Interface marking an object as a GATT service of a device.
pub const GATT_SERVICE_INTERFACE: &str = "org.bluez.GattService1";

/// Interface marking an object as a local adapter.
pub const ADAPTER_INTERFACE: &str = "org.bluez.Adapter1";

/// Object path prefix shared by every BlueZ adapter.
pub const BLUEZ_ROOT_PATH: &str = "/org/bluez";

/// A single property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Boolean (`b`).
    Bool(bool),
    /// String (`s`).
    Str(String),
    /// Object path (`o`).
    ObjectPath(String),
    /// Any signed integer width.
    Int(i64),
    /// Any unsigned integer width.
    UInt(u64),
    /// Double (`d`).
    Float(f64),
    /// Containers and types the core never reads.
    Other,
}

impl PropertyValue {
    /// Returns the string payload of a string or object path value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::ObjectPath(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the payload of a boolean value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Property name → value.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// Interface name → properties.
pub type InterfaceMap = BTreeMap<String, PropertyMap>;

/// Snapshot of every object managed by the Bluetooth service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManagedObjectTree {
    objects: BTreeMap<String, InterfaceMap>,
}

impl ManagedObjectTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts (or replaces) one interface on one object.
    pub fn insert(
        &mut self,
        path: impl Into<String>,
        interface: impl Into<String>,
        properties: PropertyMap,
    ) {
        self.objects
            .entry(path.into())
            .or_default()
            .insert(interface.into(), properties);
    }

    /// Number of objects in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the tree has no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Interfaces exposed by `path`, if the object exists.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&InterfaceMap> {
        self.objects.get(path)
    }

    /// All objects in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &InterfaceMap)> {
        self.objects.iter().map(|(path, ifaces)| (path.as_str(), ifaces))
    }

    /// Objects exposing `interface`, yielded with that interface's properties.
    pub fn with_interface<'a>(
        &'a self,
        interface: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a PropertyMap)> + 'a {
        self.iter()
            .filter_map(move |(path, ifaces)| ifaces.get(interface).map(|props| (path, props)))
    }

    /// Objects belonging to `prefix`: the object at `prefix` itself and every
    /// object below it.
    pub fn under_path<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a InterfaceMap)> + 'a {
        self.iter().filter(move |(path, _)| is_under(path, prefix))
    }
}

impl FromIterator<(String, InterfaceMap)> for ManagedObjectTree {
    fn from_iter<I: IntoIterator<Item = (String, InterfaceMap)>>(iter: I) -> Self {
        Self {
            objects: iter.into_iter().collect(),
        }
    }
}

/// Whether `path` equals `prefix` or lies below it.
#[must_use]
pub fn is_under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Object path of the adapter called `name` (e.g. `hci0`).
#[must_use]
pub fn adapter_path(name: &str) -> String {
    format!("{BLUEZ_ROOT_PATH}/{name}")
}

/// Canonical object path of the device with `address` under `adapter_path`.
///
/// `AA:BB:CC:DD:EE:FF` under `/org/bluez/hci0` becomes
/// `/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF`.
#[must_use]
pub fn device_path(adapter_path: &str, address: &str) -> String {
    format!("{adapter_path}/dev_{}", address.replace(':', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, PropertyValue)]) -> PropertyMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_device_path_derivation() {
        assert_eq!(
            device_path("/org/bluez/hci0", "AA:BB:CC:DD:EE:FF"),
            "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF"
        );
        assert_eq!(adapter_path("hci1"), "/org/bluez/hci1");
    }

    #[test]
    fn test_is_under_respects_path_segments() {
        let dev = "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF";
        assert!(is_under(dev, dev));
        assert!(is_under(&format!("{dev}/service0010"), dev));
        assert!(!is_under(&format!("{dev}0"), dev));
        assert!(!is_under("/org/bluez/hci0", dev));
    }

    #[test]
    fn test_with_interface_filters_and_orders_by_path() {
        let mut tree = ManagedObjectTree::new();
        tree.insert("/org/bluez/hci0/dev_B", DEVICE_INTERFACE, props(&[]));
        tree.insert("/org/bluez/hci0", ADAPTER_INTERFACE, props(&[]));
        tree.insert("/org/bluez/hci0/dev_A", DEVICE_INTERFACE, props(&[]));

        let paths: Vec<&str> = tree.with_interface(DEVICE_INTERFACE).map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["/org/bluez/hci0/dev_A", "/org/bluez/hci0/dev_B"]);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_under_path() {
        let mut tree = ManagedObjectTree::new();
        tree.insert("/org/bluez/hci0/dev_A", DEVICE_INTERFACE, props(&[]));
        tree.insert("/org/bluez/hci0/dev_A/service0001", GATT_SERVICE_INTERFACE, props(&[]));
        tree.insert("/org/bluez/hci0/dev_B/service0001", GATT_SERVICE_INTERFACE, props(&[]));

        let paths: Vec<&str> = tree.under_path("/org/bluez/hci0/dev_A").map(|(p, _)| p).collect();
        assert_eq!(
            paths,
            vec!["/org/bluez/hci0/dev_A", "/org/bluez/hci0/dev_A/service0001"]
        );
    }

    #[test]
    fn test_property_accessors() {
        assert_eq!(PropertyValue::from("x").as_str(), Some("x"));
        assert_eq!(PropertyValue::ObjectPath("/a".into()).as_str(), Some("/a"));
        assert_eq!(PropertyValue::from(true).as_bool(), Some(true));
        assert_eq!(PropertyValue::Int(1).as_bool(), None);
        assert_eq!(PropertyValue::Other.as_str(), None);
    }
}
