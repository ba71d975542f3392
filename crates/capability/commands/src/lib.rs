//! # 命令能力模块
//!
//! - `Command`：单个数据属性的读 / 写 / 报告成员转换
//! - `CommandCatalog`：(设备族, 数据属性, 子索引) → 命令，启动时构建后显式传入编排器
//! - 路灯控制器专用命令：`SetLightCommand`、`GetStatusCommand`

mod catalog;
mod command;
mod ssld;

pub use catalog::{CommandCatalog, CommandNotFound, RELAY_INDEXES, SCHEDULE_INDEXES};
pub use command::{Command, NodeValueCommand, ValueKind};
pub use ssld::{GetStatusCommand, SetLightCommand, resolve_light_relays};
