//! HTTP API routes and handlers.
//!
//! - `bluetooth` - Scans, devices, pairing, connections and GATT services
//! - `health` - Service health checks
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub mod bluetooth;
pub mod error;
pub mod health;
pub mod openapi;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                    - Health check
/// /api
/// ├── /scan                  - Trigger a background scan (GET or POST)
/// ├── /scan/status           - Running scan and last outcome
/// ├── /devices               - Devices from the last completed scan
/// ├── /pair/{address}        - Pair with a device
/// ├── /connect/{address}     - Connect a device
/// ├── /disconnect/{address}  - Disconnect a device
/// ├── /services/{address}    - GATT services of a device
/// └── /openapi.json          - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            bluetooth::router().route("/openapi.json", get(openapi::get_openapi_spec)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum_test::TestServer;
    use bluegate_core::{
        BluetoothService, Device, DeviceOperation, GattServiceEntry, MockBackend,
        ScanResult, ScanStatus,
    };

    use super::*;
    use crate::api::bluetooth::{OperationResponse, ScanResponse};
    use crate::api::health::HealthResponse;
    use crate::state::AppState;

    const ADDR: &str = "AA:BB:CC:DD:EE:FF";

    fn setup(mock: &Arc<MockBackend>) -> (TestServer, SharedState) {
        let service = BluetoothService::new(Arc::clone(mock), Duration::from_secs(10));
        let state = AppState::new(service);
        let server = TestServer::new(create_router(Arc::clone(&state))).unwrap();
        (server, state)
    }

    #[tokio::test]
    async fn test_health_reports_adapter() {
        let mock = Arc::new(MockBackend::new("hci0"));
        let (server, _) = setup(&mock);

        let response = server.get("/health").await;
        response.assert_status_ok();
        let health: HealthResponse = response.json();
        assert_eq!(health.status, "ok");
        assert_eq!(health.adapter, "/org/bluez/hci0");
        assert!(!health.scanning);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_populates_device_list() {
        let mock = Arc::new(MockBackend::new("hci0"));
        mock.add_device(ADDR, None, false, false);
        let (server, state) = setup(&mock);

        let devices: Vec<Device> = server.get("/api/devices").await.json();
        assert!(devices.is_empty());

        let scan: ScanResponse = server.post("/api/scan").await.json();
        assert_eq!(scan.status, "scanning");
        assert!(scan.started);

        let again: ScanResponse = server.get("/api/scan").await.json();
        assert!(!again.started);
        assert_eq!(again.scan_id, scan.scan_id);

        state.bluetooth.wait_idle().await;
        assert_eq!(mock.start_discovery_calls(), 1);

        let devices: Vec<Device> = server.get("/api/devices").await.json();
        assert_eq!(
            devices,
            vec![Device {
                address: ADDR.to_string(),
                name: "Unknown".to_string(),
                paired: false,
                connected: false,
            }]
        );

        let status: ScanStatus = server.get("/api/scan/status").await.json();
        assert!(status.running.is_none());
        let last = status.last.unwrap();
        assert_eq!(last.scan_id, scan.scan_id);
        assert_eq!(last.result, ScanResult::Completed { device_count: 1 });
    }

    #[tokio::test]
    async fn test_pair_success_message() {
        let mock = Arc::new(MockBackend::new("hci0"));
        mock.add_device(ADDR, Some("Keyboard"), false, false);
        let (server, _) = setup(&mock);

        let response = server.post(&format!("/api/pair/{ADDR}")).await;
        response.assert_status_ok();
        let body: OperationResponse = response.json();
        assert_eq!(body.status, "success");
        assert_eq!(body.message, format!("Paired with {ADDR}"));
    }

    #[tokio::test]
    async fn test_rejected_pair_is_500_with_upstream_cause() {
        let mock = Arc::new(MockBackend::new("hci0"));
        mock.add_device(ADDR, None, true, false);
        mock.fail_device(ADDR, DeviceOperation::Pair, "org.bluez.Error.AlreadyExists");
        let (server, _) = setup(&mock);

        let response = server.post(&format!("/api/pair/{ADDR}")).await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorResponse = response.json();
        assert_eq!(body.error, "bluetooth_device_fault");
        assert_eq!(
            body.details,
            Some(serde_json::Value::String("org.bluez.Error.AlreadyExists".to_string()))
        );
    }

    #[tokio::test]
    async fn test_connect_and_disconnect_routes() {
        let mock = Arc::new(MockBackend::new("hci0"));
        mock.add_device(ADDR, None, true, false);
        let (server, _) = setup(&mock);

        let body: OperationResponse = server.post(&format!("/api/connect/{ADDR}")).await.json();
        assert_eq!(body.message, format!("Connected to {ADDR}"));
        let body: OperationResponse = server.post(&format!("/api/disconnect/{ADDR}")).await.json();
        assert_eq!(body.message, format!("Disconnected from {ADDR}"));
        assert_eq!(mock.invocations().len(), 2);
    }

    #[tokio::test]
    async fn test_services_in_tree_order() {
        let mock = Arc::new(MockBackend::new("hci0"));
        mock.add_device(ADDR, None, true, true);
        mock.add_gatt_service(ADDR, 0x0020, "U2", false);
        mock.add_gatt_service(ADDR, 0x0010, "U1", true);
        let (server, _) = setup(&mock);

        let services: Vec<GattServiceEntry> =
            server.get(&format!("/api/services/{ADDR}")).await.json();
        let uuids: Vec<&str> = services.iter().map(|s| s.uuid.as_str()).collect();
        assert_eq!(uuids, vec!["U1", "U2"]);
    }

    #[tokio::test]
    async fn test_services_unknown_device_is_empty() {
        let mock = Arc::new(MockBackend::new("hci0"));
        let (server, _) = setup(&mock);

        let services: Vec<GattServiceEntry> =
            server.get("/api/services/00:11:22:33:44:55").await.json();
        assert!(services.is_empty());
    }

    #[tokio::test]
    async fn test_services_transport_fault_is_503() {
        let mock = Arc::new(MockBackend::new("hci0"));
        mock.fail_fetch("org.freedesktop.DBus.Error.ServiceUnknown");
        let (server, _) = setup(&mock);

        let response = server.get(&format!("/api/services/{ADDR}")).await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_openapi_document_is_served() {
        let mock = Arc::new(MockBackend::new("hci0"));
        let (server, _) = setup(&mock);

        let spec: serde_json::Value = server.get("/api/openapi.json").await.json();
        assert_eq!(spec["info"]["title"], "bluegate API");
    }
}
