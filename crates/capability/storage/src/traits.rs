//! 存储接口 Trait 定义
//!
//! - DeviceRegistry：设备注册表（IP、设备族、输出设置、报告配置）
//!
//! 设计原则：
//! - 所有接口返回 StorageError
//! - 使用 async_trait 支持动态分发

use crate::error::StorageError;
use async_trait::async_trait;
use domain::DeviceRecord;

/// 设备注册表接口
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// 按设备标识查找
    async fn find_device(&self, device_id: &str) -> Result<Option<DeviceRecord>, StorageError>;

    /// 新增或覆盖设备配置
    async fn upsert_device(&self, record: DeviceRecord) -> Result<DeviceRecord, StorageError>;

    /// 列出全部设备（按设备标识排序）
    async fn list_devices(&self) -> Result<Vec<DeviceRecord>, StorageError>;
}
