//! 上行 sink 与报告错误

use async_trait::async_trait;
use domain::{EventNotification, SystemMeasurements};

/// 报告处理错误
#[derive(Debug, thiserror::Error)]
pub enum ReportingError {
    /// 数据集成员缺少必需的子节点
    #[error("no '{child}' child in data set member {member}")]
    MissingChild { member: String, child: &'static str },

    #[error("unknown event type code: {0}")]
    UnknownEventType(i64),

    /// 上送失败
    #[error("sink error: {0}")]
    Sink(String),
}

/// 事件通知上送（按设备，一次一批，已排序）
#[async_trait]
pub trait EventNotificationSink: Send + Sync {
    async fn add_event_notifications(
        &self,
        device_id: &str,
        notifications: Vec<EventNotification>,
    ) -> Result<(), ReportingError>;
}

/// 测量值上送
#[async_trait]
pub trait MeasurementSink: Send + Sync {
    async fn send_measurements(
        &self,
        device_id: &str,
        systems: Vec<SystemMeasurements>,
    ) -> Result<(), ReportingError>;
}
