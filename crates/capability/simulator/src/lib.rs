//! # 模拟 IED
//!
//! 进程内实现 `Iec61850Transport`，供集成测试与本地演示使用：
//! - 路灯控制器 / RTU（RTU、PV、电池）预置模型
//! - 可注入的服务错误与 IO 错误
//! - 主动推送报告到已关联的监听器
//! - `SimulatedNetwork`：按 IP 路由的多设备网络（适配器进程使用）

mod ied;
mod models;
mod network;

pub use ied::SimulatedIed;
pub use models::{
    EventMember, SSLD_SERVER_NAME, rtu_model, ssld_event_report, ssld_event_rcb, ssld_model,
};
pub use network::SimulatedNetwork;

impl SimulatedIed {
    /// 路灯控制器
    pub fn ssld() -> Self {
        Self::new(ssld_model())
    }

    /// RTU（RTU1 / PV1 / BATTERY1）
    pub fn rtu(server_name: &str) -> Self {
        Self::new(rtu_model(server_name))
    }
}
