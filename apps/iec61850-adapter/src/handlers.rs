//! HTTP handlers
//!
//! - GET /health
//! - GET /metrics
//! - POST /devices/:device_id/registered

use crate::AppState;
use api_contract::{ApiResponse, DeviceRegisteredDto, HealthDto, MetricsSnapshotDto};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use iec61850_telemetry::metrics;
use tracing::{info, warn};

pub async fn health(State(state): State<AppState>) -> Response {
    let devices = state
        .registry
        .list_devices()
        .await
        .map(|devices| devices.len())
        .unwrap_or_default();
    let dto = HealthDto {
        status: "ok".to_string(),
        mqtt_enabled: state.mqtt_enabled,
        devices,
    };
    (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
}

pub async fn get_metrics() -> Response {
    let snapshot = metrics().snapshot();
    (
        StatusCode::OK,
        Json(ApiResponse::success(MetricsSnapshotDto {
            sessions_opened: snapshot.sessions_opened,
            connection_failures: snapshot.connection_failures,
            commands_executed: snapshot.commands_executed,
            command_failures: snapshot.command_failures,
            command_retries: snapshot.command_retries,
            filters_skipped: snapshot.filters_skipped,
            reports_received: snapshot.reports_received,
            reports_skipped_stale: snapshot.reports_skipped_stale,
            notifications_flushed: snapshot.notifications_flushed,
            notification_flush_failures: snapshot.notification_flush_failures,
            responses_sent: snapshot.responses_sent,
        })),
    )
        .into_response()
}

/// 设备注册回调：开启注册后上报时，延迟使能设备事件上报。
pub async fn device_registered(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Response {
    match state.registry.find_device(&device_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found_error(&device_id),
        Err(err) => return internal_error(err.to_string()),
    }

    match state.orchestrator.on_device_registered(&device_id).await {
        Ok(scheduled) => {
            info!(
                target: "iec61850.adapter",
                device_id = %device_id,
                reporting_scheduled = scheduled.is_some(),
                "device_registered"
            );
            let dto = DeviceRegisteredDto {
                reporting_scheduled: scheduled.is_some(),
                delay_ms: state.orchestrator.config().registration_reporting_delay_ms,
                device_id,
            };
            (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
        }
        Err(err) => {
            warn!(
                target: "iec61850.adapter",
                device_id = %device_id,
                error = %err,
                "device_registration_failed"
            );
            internal_error(err.to_string())
        }
    }
}

fn not_found_error(device_id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error(
            "DEVICE.NOT_FOUND",
            format!("unknown device: {}", device_id),
        )),
    )
        .into_response()
}

fn internal_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::error("INTERNAL.ERROR", message)),
    )
        .into_response()
}
