//! 设备请求与结果。
//!
//! 请求统一为 `DeviceRequest` + `DeviceOperation` 标签枚举；
//! 结果统一为 `DeviceOutcome`（成功 / 操作失败 / 连接失败）。

use crate::device::DeviceFamily;
use serde::{Deserialize, Serialize};

/// 设备请求。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRequest {
    pub correlation_uid: String,
    pub organisation_id: String,
    pub device_id: String,
    pub operation: DeviceOperation,
}

/// 请求的操作类型与载荷。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceOperation {
    /// 读取 RTU 系统测量值。
    GetData { systems: Vec<SystemFilter> },
    /// 写入 RTU 系统设定值。
    SetData { systems: Vec<SetDataSystem> },
    /// 路灯开关。
    SetLight { values: Vec<LightValue> },
    /// 路灯状态。
    GetStatus,
    /// 使能设备事件上报。
    EnableReporting,
}

impl DeviceOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetData { .. } => "GetData",
            Self::SetData { .. } => "SetData",
            Self::SetLight { .. } => "SetLight",
            Self::GetStatus => "GetStatus",
            Self::EnableReporting => "EnableReporting",
        }
    }
}

/// 测量值过滤条件（数据属性 + 可选子索引）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementFilter {
    pub node: String,
    #[serde(default)]
    pub index: Option<u8>,
}

/// 单个系统的读取请求。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemFilter {
    /// 系统实例号（从 1 开始）。
    pub id: u8,
    pub family: DeviceFamily,
    pub filters: Vec<MeasurementFilter>,
}

/// 设定值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPoint {
    pub node: String,
    #[serde(default)]
    pub index: Option<u8>,
    pub value: f64,
}

/// 单个系统的写入请求。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDataSystem {
    pub id: u8,
    pub family: DeviceFamily,
    pub set_points: Vec<SetPoint>,
}

/// 灯光开关值（对外编号，0 表示全部灯光继电器）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightValue {
    pub index: u8,
    pub on: bool,
}

/// 测量值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub node: String,
    #[serde(default)]
    pub index: Option<u8>,
    pub qualifier: i32,
    pub time_ms: i64,
    pub value: f64,
}

/// 单个系统的测量结果。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMeasurements {
    pub id: u8,
    pub family: DeviceFamily,
    pub measurements: Vec<Measurement>,
}

/// 路灯状态。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub light_values: Vec<LightValue>,
    pub event_buffer_filter: String,
    pub light_type: String,
}

/// 成功结果载荷。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponsePayload {
    Empty,
    Data {
        systems: Vec<SystemMeasurements>,
        /// 不支持而被跳过的过滤条件 / 设定值。
        skipped: Vec<String>,
    },
    Status(DeviceStatus),
}

/// 单次请求的唯一结果。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceOutcome {
    Success { payload: ResponsePayload },
    OperationFailure { reason: String },
    ConnectionFailure { reason: String },
}

impl DeviceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::OperationFailure { .. } => "operation_failure",
            Self::ConnectionFailure { .. } => "connection_failure",
        }
    }
}

/// 带关联 ID 的设备响应。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceResponse {
    pub correlation_uid: String,
    pub organisation_id: String,
    pub device_id: String,
    pub operation: String,
    pub outcome: DeviceOutcome,
}

impl DeviceResponse {
    pub fn for_request(request: &DeviceRequest, outcome: DeviceOutcome) -> Self {
        Self {
            correlation_uid: request.correlation_uid.clone(),
            organisation_id: request.organisation_id.clone(),
            device_id: request.device_id.clone(),
            operation: request.operation.name().to_string(),
            outcome,
        }
    }
}
