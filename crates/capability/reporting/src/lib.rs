//! # 报告能力模块
//!
//! - `ReportAggregator`：路灯事件报告缓冲、序号过滤、关闭时排序上送
//! - `RtuReportHandler`：RTU 报告成员 → 测量值
//! - `ReportingEnabler`：会话建立后使能报告控制块
//! - 设备时钟（1984 纪元）换算与上行 sink 抽象

mod aggregator;
mod enabler;
mod rtu;
mod sink;
mod time;

pub use aggregator::{AggregatorState, ReportAggregator, event_description};
pub use enabler::{EnableSummary, ReportingEnabler};
pub use rtu::RtuReportHandler;
pub use sink::{EventNotificationSink, MeasurementSink, ReportingError};
pub use time::{ENTRY_TIME_OFFSET_MS, entry_time_to_epoch_ms, epoch_ms_to_entry_time};
