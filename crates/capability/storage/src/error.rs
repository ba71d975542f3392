//! 存储层错误类型

use thiserror::Error;

/// 设备注册表错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// 注册表文件不可读
    #[error("cannot read device registry {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid device registry: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("device registry lock poisoned")]
    LockPoisoned,
}
