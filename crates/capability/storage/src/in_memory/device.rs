//! 设备注册表内存实现
//!
//! 启动时可由 JSON 文件（`DeviceRecord` 数组）预置。

use crate::error::StorageError;
use crate::traits::DeviceRegistry;
use domain::DeviceRecord;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use tracing::info;

/// 设备注册表内存存储
///
/// 使用 RwLock + HashMap 提供线程安全的内存存储。
#[derive(Default)]
pub struct InMemoryDeviceRegistry {
    devices: RwLock<HashMap<String, DeviceRecord>>,
}

impl InMemoryDeviceRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 由设备列表构建
    pub fn with_devices(records: impl IntoIterator<Item = DeviceRecord>) -> Self {
        let devices = records
            .into_iter()
            .map(|record| (record.device_id().to_string(), record))
            .collect();
        Self {
            devices: RwLock::new(devices),
        }
    }

    /// 解析 JSON 数组
    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        let records: Vec<DeviceRecord> = serde_json::from_str(json)?;
        Ok(Self::with_devices(records))
    }

    /// 从 JSON 文件加载
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|source| StorageError::Read {
                path: path.display().to_string(),
                source,
            })?;
        let registry = Self::from_json(&json)?;
        info!(
            target: "iec61850.storage",
            path = %path.display(),
            devices = registry.len(),
            "device_registry_loaded"
        );
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.devices.read().map(|map| map.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl DeviceRegistry for InMemoryDeviceRegistry {
    async fn find_device(&self, device_id: &str) -> Result<Option<DeviceRecord>, StorageError> {
        let map = self
            .devices
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(map.get(device_id).cloned())
    }

    async fn upsert_device(&self, record: DeviceRecord) -> Result<DeviceRecord, StorageError> {
        let mut map = self
            .devices
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        map.insert(record.device_id().to_string(), record.clone());
        Ok(record)
    }

    async fn list_devices(&self) -> Result<Vec<DeviceRecord>, StorageError> {
        let mut items: Vec<DeviceRecord> = self
            .devices
            .read()
            .map_err(|_| StorageError::LockPoisoned)?
            .values()
            .cloned()
            .collect();
        items.sort_by(|a, b| a.device_id().cmp(b.device_id()));
        Ok(items)
    }
}
