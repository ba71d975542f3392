//! 稳定的消息信封与 HTTP 响应契约。
//!
//! - MQTT：请求信封（入）、响应 / 事件通知 / 测量值信封（出）
//! - HTTP：`ApiResponse`、健康检查、计数器快照、设备注册回执

use domain::{
    DeviceOperation, DeviceOutcome, DeviceRequest, DeviceResponse, EventNotification,
    SystemMeasurements,
};
use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 信封解析错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error("missing device id")]
    MissingDeviceId,
    #[error("device id mismatch: topic {topic}, payload {payload}")]
    DeviceIdMismatch { topic: String, payload: String },
}

/// MQTT 请求信封。
///
/// 设备标识可以只出现在 topic 中；关联 ID 缺失时由接入侧生成。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    #[serde(default, alias = "correlation_uid")]
    pub correlation_uid: Option<String>,
    #[serde(default, alias = "organisation_id")]
    pub organisation_id: Option<String>,
    #[serde(default, alias = "device_id")]
    pub device_id: Option<String>,
    pub operation: DeviceOperation,
}

impl RequestEnvelope {
    pub fn into_request(
        self,
        topic_device_id: Option<&str>,
        new_correlation_uid: impl FnOnce() -> String,
    ) -> Result<DeviceRequest, ContractError> {
        let device_id = match (topic_device_id, self.device_id) {
            (Some(topic), Some(payload)) if topic != payload => {
                return Err(ContractError::DeviceIdMismatch {
                    topic: topic.to_string(),
                    payload,
                });
            }
            (_, Some(payload)) => payload,
            (Some(topic), None) => topic.to_string(),
            (None, None) => return Err(ContractError::MissingDeviceId),
        };
        let correlation_uid = self
            .correlation_uid
            .filter(|uid| !uid.trim().is_empty())
            .unwrap_or_else(new_correlation_uid);
        Ok(DeviceRequest {
            correlation_uid,
            organisation_id: self.organisation_id.unwrap_or_default(),
            device_id,
            operation: self.operation,
        })
    }
}

/// MQTT 响应信封（每个请求恰好一条）。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub correlation_uid: String,
    pub organisation_id: String,
    pub device_id: String,
    pub operation: String,
    pub outcome: DeviceOutcome,
    pub ts_ms: i64,
}

impl ResponseEnvelope {
    pub fn new(response: &DeviceResponse, ts_ms: i64) -> Self {
        Self {
            correlation_uid: response.correlation_uid.clone(),
            organisation_id: response.organisation_id.clone(),
            device_id: response.device_id.clone(),
            operation: response.operation.clone(),
            outcome: response.outcome.clone(),
            ts_ms,
        }
    }
}

/// 事件通知信封（已按时间排序的一批）。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventNotificationEnvelope {
    pub device_id: String,
    pub notifications: Vec<EventNotification>,
}

/// 测量值信封（一个报告一条）。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementEnvelope {
    pub device_id: String,
    pub systems: Vec<SystemMeasurements>,
    pub ts_ms: i64,
}

/// 健康检查返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDto {
    pub status: String,
    pub mqtt_enabled: bool,
    pub devices: usize,
}

/// 计数器快照返回结构。
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
    pub sessions_opened: u64,
    pub connection_failures: u64,
    pub commands_executed: u64,
    pub command_failures: u64,
    pub command_retries: u64,
    pub filters_skipped: u64,
    pub reports_received: u64,
    pub reports_skipped_stale: u64,
    pub notifications_flushed: u64,
    pub notification_flush_failures: u64,
    pub responses_sent: u64,
}

/// 设备注册回执。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegisteredDto {
    pub device_id: String,
    /// 是否已调度延迟使能上报。
    pub reporting_scheduled: bool,
    pub delay_ms: u64,
}
