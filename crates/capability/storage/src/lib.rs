//! # 设备注册表存储模块
//!
//! 提供设备配置查找能力：IP 地址、设备族、IED 名称、输出设置与报告配置。
//!
//! ## 模块说明
//!
//! - [`traits`]：`DeviceRegistry` 接口
//! - [`error`]：存储错误类型定义
//! - [`in_memory`]：内存实现，可由 JSON 文件预置
//!
//! ## 注册表文件格式
//!
//! ```json
//! [
//!   {
//!     "deviceId": "SSLD-1",
//!     "ipAddress": "10.0.0.10",
//!     "family": "STREETLIGHT_CONTROLLER",
//!     "outputSettings": [
//!       { "internalId": 1, "externalId": 1, "relayType": "LIGHT" }
//!     ]
//!   },
//!   {
//!     "deviceId": "RTU-1",
//!     "ipAddress": "10.0.0.20",
//!     "family": "GENERIC_RTU",
//!     "serverName": "ZOWN_POC",
//!     "enableAllReportsOnConnect": true
//!   }
//! ]
//! ```

pub mod error;
pub mod in_memory;
pub mod traits;

pub use error::StorageError;
pub use in_memory::*;
pub use traits::*;
