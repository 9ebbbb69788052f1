//! BlueZ backend over the D-Bus system bus.
//!
//! One [`BluezBackend`] drives one adapter (`/org/bluez/hciN`). It implements
//! all three capability traits: adapter control through `org.bluez.Adapter1`,
//! the object tree through `org.freedesktop.DBus.ObjectManager` on `/`, and
//! device methods through `org.bluez.Device1`.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, info};
use zbus::proxy;
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};
use zbus::Connection;

use crate::bus::{AdapterHandle, DeviceInvoker, ObjectTreeReader};
use crate::error::{BluegateError, Result};
use crate::tree::{adapter_path, InterfaceMap, ManagedObjectTree, PropertyMap, PropertyValue};
use crate::types::DeviceOperation;

// ============================================================================
// D-Bus proxies
// ============================================================================

#[proxy(
    interface = "org.bluez.Adapter1",
    default_service = "org.bluez",
    gen_blocking = false
)]
trait Adapter1 {
    fn start_discovery(&self) -> zbus::Result<()>;

    fn stop_discovery(&self) -> zbus::Result<()>;

    #[zbus(property)]
    fn set_powered(&self, value: bool) -> zbus::Result<()>;

    #[zbus(property)]
    fn set_discoverable(&self, value: bool) -> zbus::Result<()>;

    #[zbus(property)]
    fn set_pairable(&self, value: bool) -> zbus::Result<()>;
}

#[proxy(
    interface = "org.bluez.Device1",
    default_service = "org.bluez",
    gen_blocking = false
)]
trait Device1 {
    fn pair(&self) -> zbus::Result<()>;

    fn connect(&self) -> zbus::Result<()>;

    fn disconnect(&self) -> zbus::Result<()>;
}

type RawObjects = HashMap<OwnedObjectPath, HashMap<String, HashMap<String, OwnedValue>>>;

#[proxy(
    interface = "org.freedesktop.DBus.ObjectManager",
    default_service = "org.bluez",
    default_path = "/",
    gen_blocking = false
)]
trait BluezObjectManager {
    /// `{ object_path: { interface_name: { property: value } } }`
    fn get_managed_objects(&self) -> zbus::Result<RawObjects>;
}

// ============================================================================
// Backend
// ============================================================================

/// Connection to `bluetoothd` for one adapter.
#[derive(Clone)]
pub struct BluezBackend {
    connection: Connection,
    adapter_path: String,
}

impl BluezBackend {
    /// Connects to the system bus and targets the adapter called `adapter`.
    ///
    /// The adapter's presence is not checked here; the first adapter call
    /// reports it.
    pub async fn connect(adapter: &str) -> Result<Self> {
        let connection = Connection::system()
            .await
            .map_err(|e| BluegateError::transport(e.to_string()))?;
        let adapter_path = adapter_path(adapter);
        info!(adapter = %adapter_path, "Connected to BlueZ on the system bus");
        Ok(Self {
            connection,
            adapter_path,
        })
    }

    /// Uses an existing bus connection.
    #[must_use]
    pub fn with_connection(connection: Connection, adapter: &str) -> Self {
        Self {
            connection,
            adapter_path: adapter_path(adapter),
        }
    }

    async fn adapter_proxy(&self) -> zbus::Result<Adapter1Proxy<'_>> {
        Adapter1Proxy::builder(&self.connection)
            .path(self.adapter_path.as_str())?
            .build()
            .await
    }

    async fn device_proxy<'a>(&self, path: &'a str) -> zbus::Result<Device1Proxy<'a>> {
        Device1Proxy::builder(&self.connection)
            .path(path)?
            .build()
            .await
    }

    async fn adapter_call(&self, call: AdapterCall) -> Result<()> {
        let result = async {
            let adapter = self.adapter_proxy().await?;
            match call {
                AdapterCall::SetPowered(v) => adapter.set_powered(v).await,
                AdapterCall::SetDiscoverable(v) => adapter.set_discoverable(v).await,
                AdapterCall::SetPairable(v) => adapter.set_pairable(v).await,
                AdapterCall::StartDiscovery => adapter.start_discovery().await,
                AdapterCall::StopDiscovery => adapter.stop_discovery().await,
            }
        }
        .await;

        debug!(adapter = %self.adapter_path, ?call, ok = result.is_ok(), "Adapter call");
        result.map_err(|e| BluegateError::adapter(call.name(), upstream_text(&e)))
    }
}

#[derive(Debug, Clone, Copy)]
enum AdapterCall {
    SetPowered(bool),
    SetDiscoverable(bool),
    SetPairable(bool),
    StartDiscovery,
    StopDiscovery,
}

impl AdapterCall {
    const fn name(self) -> &'static str {
        match self {
            Self::SetPowered(_) => "SetPowered",
            Self::SetDiscoverable(_) => "SetDiscoverable",
            Self::SetPairable(_) => "SetPairable",
            Self::StartDiscovery => "StartDiscovery",
            Self::StopDiscovery => "StopDiscovery",
        }
    }
}

#[async_trait]
impl AdapterHandle for BluezBackend {
    fn path(&self) -> &str {
        &self.adapter_path
    }

    async fn set_powered(&self, powered: bool) -> Result<()> {
        self.adapter_call(AdapterCall::SetPowered(powered)).await
    }

    async fn set_discoverable(&self, discoverable: bool) -> Result<()> {
        self.adapter_call(AdapterCall::SetDiscoverable(discoverable)).await
    }

    async fn set_pairable(&self, pairable: bool) -> Result<()> {
        self.adapter_call(AdapterCall::SetPairable(pairable)).await
    }

    async fn start_discovery(&self) -> Result<()> {
        self.adapter_call(AdapterCall::StartDiscovery).await
    }

    async fn stop_discovery(&self) -> Result<()> {
        self.adapter_call(AdapterCall::StopDiscovery).await
    }
}

#[async_trait]
impl ObjectTreeReader for BluezBackend {
    async fn fetch_all(&self) -> Result<ManagedObjectTree> {
        let objects = async {
            BluezObjectManagerProxy::new(&self.connection)
                .await?
                .get_managed_objects()
                .await
        }
        .await
        .map_err(|e| BluegateError::transport(upstream_text(&e)))?;

        Ok(objects
            .into_iter()
            .map(|(path, interfaces)| (path.as_str().to_string(), convert_interfaces(interfaces)))
            .collect())
    }
}

#[async_trait]
impl DeviceInvoker for BluezBackend {
    async fn invoke(&self, address: &str, path: &str, operation: DeviceOperation) -> Result<()> {
        let result = async {
            let device = self.device_proxy(path).await?;
            match operation {
                DeviceOperation::Pair => device.pair().await,
                DeviceOperation::Connect => device.connect().await,
                DeviceOperation::Disconnect => device.disconnect().await,
            }
        }
        .await;

        result.map_err(|e| BluegateError::device(address, upstream_text(&e)))
    }
}

// ============================================================================
// Conversions
// ============================================================================

/// Error text as BlueZ reported it: the D-Bus error name, plus its message
/// when there is one.
fn upstream_text(err: &zbus::Error) -> String {
    match err {
        zbus::Error::MethodError(name, Some(detail), _) if !detail.is_empty() => {
            format!("{}: {detail}", name.as_str())
        }
        zbus::Error::MethodError(name, _, _) => name.as_str().to_string(),
        other => other.to_string(),
    }
}

fn convert_interfaces(interfaces: HashMap<String, HashMap<String, OwnedValue>>) -> InterfaceMap {
    interfaces
        .into_iter()
        .map(|(name, props)| {
            let props: PropertyMap = props
                .iter()
                .map(|(key, value)| (key.clone(), convert_value(value)))
                .collect();
            (name, props)
        })
        .collect()
}

fn convert_value(value: &Value<'_>) -> PropertyValue {
    match value {
        Value::Bool(b) => PropertyValue::Bool(*b),
        Value::Str(s) => PropertyValue::Str(s.as_str().to_string()),
        Value::ObjectPath(p) => PropertyValue::ObjectPath(p.as_str().to_string()),
        Value::U8(n) => PropertyValue::UInt(u64::from(*n)),
        Value::U16(n) => PropertyValue::UInt(u64::from(*n)),
        Value::U32(n) => PropertyValue::UInt(u64::from(*n)),
        Value::U64(n) => PropertyValue::UInt(*n),
        Value::I16(n) => PropertyValue::Int(i64::from(*n)),
        Value::I32(n) => PropertyValue::Int(i64::from(*n)),
        Value::I64(n) => PropertyValue::Int(*n),
        Value::F64(n) => PropertyValue::Float(*n),
        Value::Value(inner) => convert_value(inner),
        _ => PropertyValue::Other,
    }
}
