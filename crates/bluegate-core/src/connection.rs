//! Pair, connect and disconnect by device address.
//!
//! These calls go straight to `bluetoothd` and do not wait for, or coordinate
//! with, a running scan. The device registry is not updated afterwards; it
//! reflects the new pairing/connection state after the next completed scan.

use std::sync::Arc;

use tracing::{error, info};

use crate::bus::DeviceInvoker;
use crate::config::is_valid_mac_address;
use crate::error::{BluegateError, Result};
use crate::tree::device_path;
use crate::types::DeviceOperation;

/// Executes connection-state operations against single devices.
pub struct ConnectionManager {
    adapter_path: String,
    invoker: Arc<dyn DeviceInvoker>,
}

impl ConnectionManager {
    /// Creates a manager for devices under `adapter_path`.
    pub fn new(adapter_path: impl Into<String>, invoker: Arc<dyn DeviceInvoker>) -> Self {
        Self {
            adapter_path: adapter_path.into(),
            invoker,
        }
    }

    /// Pairs with the device at `address`.
    pub async fn pair(&self, address: &str) -> Result<()> {
        self.operate(DeviceOperation::Pair, address).await
    }

    /// Connects to the device at `address`.
    pub async fn connect(&self, address: &str) -> Result<()> {
        self.operate(DeviceOperation::Connect, address).await
    }

    /// Disconnects the device at `address`.
    pub async fn disconnect(&self, address: &str) -> Result<()> {
        self.operate(DeviceOperation::Disconnect, address).await
    }

    /// Runs `operation` on the device at `address`.
    ///
    /// # Errors
    ///
    /// Any failure is a [`BluegateError::DeviceFault`] for `address` carrying
    /// the upstream error text.
    pub async fn operate(&self, operation: DeviceOperation, address: &str) -> Result<()> {
        if !is_valid_mac_address(address) {
            error!(%address, %operation, "Rejected malformed Bluetooth address");
            return Err(BluegateError::device(address, "Invalid Bluetooth address"));
        }

        let path = device_path(&self.adapter_path, address);
        match self.invoker.invoke(address, &path, operation).await {
            Ok(()) => {
                info!(%address, %operation, "{} {address}", operation.done_phrase());
                Ok(())
            }
            Err(e) => {
                let fault = into_device_fault(address, e);
                error!(%address, %operation, error = %fault, "{operation} failed for {address}");
                Err(fault)
            }
        }
    }
}

fn into_device_fault(address: &str, err: BluegateError) -> BluegateError {
    match err {
        fault @ BluegateError::DeviceFault { .. } => fault,
        other => {
            let cause = other
                .upstream_cause()
                .map_or_else(|| other.to_string(), str::to_string);
            BluegateError::device(address, cause)
        }
    }
}
