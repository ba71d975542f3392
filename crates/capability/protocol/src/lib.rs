//! # IEC 61850 协议通信能力模块
//!
//! 提供到 IED 的会话与命令执行能力：
//! - **寻址**：逻辑设备 / 逻辑节点 / 数据属性 / 功能约束 → 对象引用
//! - **模型快照**：从设备读取或由 JSON 模板加载
//! - **设备会话**：关联生命周期、读写、报告使能、延迟断开
//! - **重试执行**：只对设备协议错误重试，连接断开立即失败
//!
//! ## 架构设计
//!
//! ```text
//! SessionOrchestrator
//!       │
//!       ▼
//! RetryingCommandExecutor ── Command
//!       │
//!       ▼
//! DeviceSession ── AddressResolver
//!       │
//!       ▼
//! Iec61850Transport / Association ──(报告)──▶ ReportListener
//! ```
//!
//! ## 对象引用格式
//!
//! ```text
//! <serverName><LD>[index]/<LN>.<DA>     例如 SWDeviceGenericIO/XSWC1.Pos
//! <serverName><LD><index>/<LN>          报告控制块扫描
//! ```

mod address;
mod error;
mod model;
mod retry;
mod session;
mod transport;

pub use address::{
    logical_node, AddressResolver, DataAttribute, Fc, LogicalDevice, ModelAddress, ReferenceParts,
};
pub use error::{ErrorClass, ProtocolError, TransportError};
pub use model::{BasicValue, ModelNode, ReportControlBlock, ServerModel};
pub use retry::{RetryPolicy, RetryingCommandExecutor};
pub use session::{ConnectOptions, DelayedDisconnect, DeviceSession};
pub use transport::{
    Association, DataSet, Iec61850Transport, NoopReportListener, Report, ReportListener,
};
