//! # 控制能力模块
//!
//! - `SessionOrchestrator`：单请求编排（连接、重试执行、报告使能、延迟断开、结果归并）
//! - 设备注册触发的延迟上报使能
//! - MQTT 接入：请求监听与响应 / 事件通知 / 测量值发布
//! - `LogSink`：未启用 MQTT 时的日志 sink

mod mqtt;
mod orchestrator;
mod sink;

pub use mqtt::{MqttConfig, MqttPublisher, spawn_request_listener};
pub use orchestrator::{OrchestratorConfig, SessionOrchestrator};
pub use sink::{ControlError, LogSink, ResponseSink};
