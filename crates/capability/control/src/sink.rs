use async_trait::async_trait;
use domain::{DeviceResponse, EventNotification, SystemMeasurements};
use iec61850_reporting::{EventNotificationSink, MeasurementSink, ReportingError};
use tracing::info;

/// 控制链路错误。
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("registry error: {0}")]
    Registry(String),
    #[error("publish error: {0}")]
    Publish(String),
    #[error("payload error: {0}")]
    Payload(String),
}

/// 上行响应 sink（每个请求恰好一条带关联 ID 的结果）。
#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn send_response(&self, response: &DeviceResponse) -> Result<(), ControlError>;
}

/// 只记日志的 sink（未启用 MQTT 时使用）。
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl ResponseSink for LogSink {
    async fn send_response(&self, response: &DeviceResponse) -> Result<(), ControlError> {
        info!(
            target: "iec61850.control",
            correlation_uid = %response.correlation_uid,
            device_id = %response.device_id,
            operation = %response.operation,
            result = response.outcome.label(),
            "response_logged"
        );
        Ok(())
    }
}

#[async_trait]
impl EventNotificationSink for LogSink {
    async fn add_event_notifications(
        &self,
        device_id: &str,
        notifications: Vec<EventNotification>,
    ) -> Result<(), ReportingError> {
        info!(
            target: "iec61850.control",
            device_id = %device_id,
            count = notifications.len(),
            "event_notifications_logged"
        );
        Ok(())
    }
}

#[async_trait]
impl MeasurementSink for LogSink {
    async fn send_measurements(
        &self,
        device_id: &str,
        systems: Vec<SystemMeasurements>,
    ) -> Result<(), ReportingError> {
        let count: usize = systems.iter().map(|system| system.measurements.len()).sum();
        info!(
            target: "iec61850.control",
            device_id = %device_id,
            systems = systems.len(),
            measurements = count,
            "measurements_logged"
        );
        Ok(())
    }
}
