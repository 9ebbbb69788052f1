//! OpenAPI specification for the bluegate API.

use axum::Json;
use bluegate_core::{
    Device, GattServiceEntry, RunningScan, ScanOutcome, ScanResult, ScanStatus,
};
use utoipa::OpenApi;

use super::bluetooth::{OperationResponse, ScanResponse};
use super::error::ErrorResponse;
use super::health::HealthResponse;

/// Serve the OpenAPI specification as JSON at `/api/openapi.json`.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Returns the OpenAPI specification as pretty JSON.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document structure for bluegate.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "bluegate API",
        version = "0.1.0",
        description = r#"
# bluegate API

bluegate drives a local Bluetooth Low Energy adapter through BlueZ.

## Workflow

1. **triggerScan** starts a discovery window in the background (10 seconds by default).
2. **getScanStatus** reports when it has finished.
3. **listDevices** returns what the last completed scan found.
4. **pairDevice**, **connectDevice** and **disconnectDevice** act on one device by address.
5. **listServices** reads the GATT services BlueZ has resolved for a connected device.

The device list is only refreshed by scans; run another scan to see pairing or
connection changes.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local bluegate server")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "scan", description = "Background discovery scans"),
        (name = "devices", description = "Discovered devices, pairing, connections and GATT services")
    ),
    paths(
        super::health::health_check,
        super::bluetooth::trigger_scan,
        super::bluetooth::scan_status,
        super::bluetooth::list_devices,
        super::bluetooth::pair_device,
        super::bluetooth::connect_device,
        super::bluetooth::disconnect_device,
        super::bluetooth::list_services,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            ScanResponse,
            ScanStatus,
            RunningScan,
            ScanOutcome,
            ScanResult,
            Device,
            OperationResponse,
            GattServiceEntry,
        )
    )
)]
pub struct ApiDoc;
