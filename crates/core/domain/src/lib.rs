//! 适配器共享领域模型：设备身份、请求/结果、事件通知与测量值。

pub mod device;
pub mod event;
pub mod request;

pub use device::{
    DeviceFamily, DeviceIdentity, DeviceRecord, OutputSetting, RelayType, ReportSelection,
};
pub use event::{EventNotification, EventType, FirmwareKind};
pub use request::{
    DeviceOperation, DeviceOutcome, DeviceRequest, DeviceResponse, DeviceStatus, LightValue,
    Measurement, MeasurementFilter, ResponsePayload, SetDataSystem, SetPoint, SystemFilter,
    SystemMeasurements,
};

/// 当前时间（Unix 毫秒）。
pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
