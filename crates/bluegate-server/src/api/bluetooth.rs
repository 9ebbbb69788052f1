//! Bluetooth API endpoints.
//!
//! Scans run in the background: triggering one returns immediately, and
//! `GET /api/devices` serves whatever the last completed scan found.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use bluegate_core::{Device, DeviceOperation, GattServiceEntry, ScanStatus};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::{ApiResult, ErrorResponse};
use crate::state::SharedState;

/// Creates the Bluetooth router, mounted under `/api`.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/scan", get(trigger_scan).post(trigger_scan))
        .route("/scan/status", get(scan_status))
        .route("/devices", get(list_devices))
        .route("/pair/{address}", post(pair_device))
        .route("/connect/{address}", post(connect_device))
        .route("/disconnect/{address}", post(disconnect_device))
        .route("/services/{address}", get(list_services))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Scan trigger response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "status": "scanning",
    "scan_id": "6f1c2b8e-1d3a-4c55-9a47-0b8f3f2f4c11",
    "started": true
}))]
pub struct ScanResponse {
    /// Always `"scanning"`.
    #[schema(example = "scanning")]
    pub status: String,

    /// Id of the scan now running.
    pub scan_id: Uuid,

    /// `false` when a scan was already running and this trigger joined it.
    #[schema(example = true)]
    pub started: bool,
}

/// Result of a pair, connect or disconnect request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "status": "success",
    "message": "Paired with AA:BB:CC:DD:EE:FF"
}))]
pub struct OperationResponse {
    /// Always `"success"`.
    #[schema(example = "success")]
    pub status: String,

    /// What was done.
    #[schema(example = "Paired with AA:BB:CC:DD:EE:FF")]
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Start a device scan.
#[utoipa::path(
    method(get, post),
    path = "/api/scan",
    tag = "scan",
    operation_id = "triggerScan",
    summary = "Start a discovery scan",
    description = "Starts a discovery window in the background and returns at once. \
        While a scan runs, further triggers are absorbed and return the running scan's id \
        with `started: false`.",
    responses(
        (status = 200, description = "Scan running", body = ScanResponse)
    )
)]
pub async fn trigger_scan(State(state): State<SharedState>) -> Json<ScanResponse> {
    let ticket = state.bluetooth.begin_scan();
    Json(ScanResponse {
        status: "scanning".to_string(),
        scan_id: ticket.scan_id,
        started: ticket.started,
    })
}

/// Report whether a scan is running and how the last one ended.
#[utoipa::path(
    get,
    path = "/api/scan/status",
    tag = "scan",
    operation_id = "getScanStatus",
    summary = "Get scan status",
    responses(
        (status = 200, description = "Current scan status", body = ScanStatus)
    )
)]
pub async fn scan_status(State(state): State<SharedState>) -> Json<ScanStatus> {
    Json(state.bluetooth.scan_status())
}

/// List the devices found by the last completed scan.
#[utoipa::path(
    get,
    path = "/api/devices",
    tag = "devices",
    operation_id = "listDevices",
    summary = "List discovered devices",
    description = "Returns the device set of the most recently completed scan, \
        or an empty list before the first one finishes. Pairing and connection \
        state is as of that scan.",
    responses(
        (status = 200, description = "Known devices", body = [Device])
    )
)]
pub async fn list_devices(State(state): State<SharedState>) -> Json<Vec<Device>> {
    Json(state.bluetooth.list_devices().as_ref().clone())
}

/// Pair with a device.
#[utoipa::path(
    post,
    path = "/api/pair/{address}",
    tag = "devices",
    operation_id = "pairDevice",
    summary = "Pair with a device",
    params(("address" = String, Path, description = "Device address, e.g. AA:BB:CC:DD:EE:FF")),
    responses(
        (status = 200, description = "Paired", body = OperationResponse),
        (status = 500, description = "The device or BlueZ rejected the request", body = ErrorResponse)
    )
)]
pub async fn pair_device(
    State(state): State<SharedState>,
    Path(address): Path<String>,
) -> ApiResult<Json<OperationResponse>> {
    run_operation(&state, DeviceOperation::Pair, &address).await
}

/// Connect a device.
#[utoipa::path(
    post,
    path = "/api/connect/{address}",
    tag = "devices",
    operation_id = "connectDevice",
    summary = "Connect a device",
    params(("address" = String, Path, description = "Device address, e.g. AA:BB:CC:DD:EE:FF")),
    responses(
        (status = 200, description = "Connected", body = OperationResponse),
        (status = 500, description = "The device or BlueZ rejected the request", body = ErrorResponse)
    )
)]
pub async fn connect_device(
    State(state): State<SharedState>,
    Path(address): Path<String>,
) -> ApiResult<Json<OperationResponse>> {
    run_operation(&state, DeviceOperation::Connect, &address).await
}

/// Disconnect a device.
#[utoipa::path(
    post,
    path = "/api/disconnect/{address}",
    tag = "devices",
    operation_id = "disconnectDevice",
    summary = "Disconnect a device",
    params(("address" = String, Path, description = "Device address, e.g. AA:BB:CC:DD:EE:FF")),
    responses(
        (status = 200, description = "Disconnected", body = OperationResponse),
        (status = 500, description = "The device or BlueZ rejected the request", body = ErrorResponse)
    )
)]
pub async fn disconnect_device(
    State(state): State<SharedState>,
    Path(address): Path<String>,
) -> ApiResult<Json<OperationResponse>> {
    run_operation(&state, DeviceOperation::Disconnect, &address).await
}

/// List a device's GATT services.
#[utoipa::path(
    get,
    path = "/api/services/{address}",
    tag = "devices",
    operation_id = "listServices",
    summary = "List GATT services of a device",
    description = "Reads the services BlueZ has resolved for the device, in object path order. \
        An unknown device yields an empty list.",
    params(("address" = String, Path, description = "Device address, e.g. AA:BB:CC:DD:EE:FF")),
    responses(
        (status = 200, description = "Services", body = [GattServiceEntry]),
        (status = 503, description = "BlueZ unreachable", body = ErrorResponse)
    )
)]
pub async fn list_services(
    State(state): State<SharedState>,
    Path(address): Path<String>,
) -> ApiResult<Json<Vec<GattServiceEntry>>> {
    Ok(Json(state.bluetooth.list_services(&address).await?))
}

async fn run_operation(
    state: &SharedState,
    operation: DeviceOperation,
    address: &str,
) -> ApiResult<Json<OperationResponse>> {
    state.bluetooth.operate(operation, address).await?;

    Ok(Json(OperationResponse {
        status: "success".to_string(),
        message: format!("{} {address}", operation.done_phrase()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_response_serialization() {
        let response = ScanResponse {
            status: "scanning".to_string(),
            scan_id: Uuid::nil(),
            started: false,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"scanning\""));
        assert!(json.contains("\"started\":false"));
    }
}
