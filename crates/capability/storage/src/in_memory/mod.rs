//! 内存存储实现模块
//!
//! 包含以下实现：
//! - DeviceRegistry: InMemoryDeviceRegistry

pub mod device;

pub use device::*;
