//! Application state shared across handlers.

use std::sync::Arc;

use bluegate_core::BluetoothService;

/// Shared application state.
pub type SharedState = Arc<AppState>;

/// Everything a handler can reach.
pub struct AppState {
    /// The adapter's scan, registry, connection and GATT operations.
    pub bluetooth: Arc<BluetoothService>,
}

impl AppState {
    /// Wraps the service into shared state.
    #[must_use]
    pub fn new(bluetooth: BluetoothService) -> SharedState {
        Arc::new(Self {
            bluetooth: Arc::new(bluetooth),
        })
    }
}
