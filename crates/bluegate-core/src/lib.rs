//! # bluegate-core
//!
//! Core logic for driving a local BlueZ adapter.
//!
//! This crate provides:
//! - Single-flight discovery scans feeding an atomically replaced device registry
//! - Pair, connect and disconnect by device address
//! - GATT service listing per device
//! - Configuration loading and validation
//!
//! ## Architecture
//!
//! - [`bus`] - Capability traits over the Bluetooth management service
//! - [`bluez`] - The D-Bus implementation of those traits (feature `bluetooth`)
//! - [`mock`] - An in-memory implementation for tests and non-Linux builds
//! - [`tree`] - The managed object tree snapshot and path helpers
//! - [`scan`] - [`ScanOrchestrator`], discovery sessions and their status
//! - [`registry`] - [`DeviceRegistry`], the last completed scan's devices
//! - [`connection`] - [`ConnectionManager`], per-device operations
//! - [`gatt`] - [`GattServiceResolver`], per-device GATT services
//! - [`service`] - [`BluetoothService`], the facade the server holds
//! - [`config`] - Application configuration
//! - [`error`] - Unified error types for the crate
//! - [`types`] - Shared types and OpenAPI schemas

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

#[cfg(feature = "bluetooth")]
pub mod bluez;
pub mod bus;
pub mod config;
pub mod connection;
pub mod error;
pub mod gatt;
#[cfg(any(test, feature = "mock-bluetooth", not(feature = "bluetooth")))]
pub mod mock;
pub mod registry;
pub mod scan;
pub mod service;
pub mod tree;
pub mod types;

#[cfg(feature = "bluetooth")]
pub use bluez::BluezBackend;
pub use bus::{AdapterHandle, DeviceInvoker, ObjectTreeReader};
pub use config::{
    is_valid_adapter_name, is_valid_mac_address, AdapterConfig, Config, ConfigError, ConfigResult,
    LoggingConfig, ScanConfig, ServerConfig,
};
pub use connection::ConnectionManager;
pub use error::{BluegateError, Result};
pub use gatt::GattServiceResolver;
#[cfg(any(test, feature = "mock-bluetooth", not(feature = "bluetooth")))]
pub use mock::MockBackend;
pub use registry::DeviceRegistry;
pub use scan::{
    RunningScan, ScanOrchestrator, ScanOutcome, ScanResult, ScanStatus, ScanTicket,
    DEFAULT_DISCOVERY_WINDOW,
};
pub use service::{prepare_adapter, BluetoothService};
pub use tree::{ManagedObjectTree, PropertyValue};
pub use types::{Device, DeviceOperation, GattServiceEntry};
