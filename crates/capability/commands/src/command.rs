//! 命令抽象与节点取值命令

use async_trait::async_trait;
use domain::{Measurement, now_epoch_ms};
use iec61850_protocol::{
    BasicValue, DataAttribute, DeviceSession, Fc, LogicalDevice, ModelAddress, ModelNode,
    ProtocolError, logical_node,
};

/// 单个数据属性的读写命令（构造后无状态）
#[async_trait]
pub trait Command: Send + Sync {
    fn data_attribute(&self) -> DataAttribute;

    /// 子索引（调度编号、继电器编号）
    fn index(&self) -> Option<u8>;

    /// 读取 `logical_device` 第 `instance` 个实例上的值
    async fn execute_read(
        &self,
        session: &DeviceSession,
        logical_device: &LogicalDevice,
        instance: u8,
    ) -> Result<Measurement, ProtocolError>;

    async fn execute_write(
        &self,
        _session: &DeviceSession,
        _logical_device: &LogicalDevice,
        _instance: u8,
        _value: f64,
    ) -> Result<(), ProtocolError> {
        Err(ProtocolError::Configuration(format!(
            "data attribute {} is not writable",
            self.data_attribute()
        )))
    }

    /// 把已读取（或报告中携带）的节点转换为测量值
    fn translate(&self, node: &ModelNode) -> Result<Measurement, ProtocolError>;
}

/// 取值类型（写入时决定编码）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
}

impl ValueKind {
    fn encode(&self, value: f64) -> BasicValue {
        match self {
            Self::Bool => BasicValue::Bool(value != 0.0),
            Self::Int => BasicValue::Int(value.round() as i64),
            Self::Float => BasicValue::Float(value),
        }
    }
}

const QUALITY: &str = "q";
const TIME: &str = "t";

/// 读取节点下单个值路径的通用命令
#[derive(Debug, Clone)]
pub struct NodeValueCommand {
    attribute: DataAttribute,
    index: Option<u8>,
    logical_node: String,
    fc: Fc,
    value_path: &'static str,
    kind: ValueKind,
    writable: bool,
}

impl NodeValueCommand {
    pub fn new(
        attribute: DataAttribute,
        logical_node: impl Into<String>,
        fc: Fc,
        value_path: &'static str,
        kind: ValueKind,
    ) -> Self {
        Self {
            attribute,
            index: None,
            logical_node: logical_node.into(),
            fc,
            value_path,
            kind,
            writable: false,
        }
    }

    pub fn with_index(mut self, index: u8) -> Self {
        self.index = Some(index);
        self
    }

    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    /// LLN0 上的状态量（Beh / Health / Mod）
    pub fn status(attribute: DataAttribute) -> Self {
        Self::new(
            attribute,
            logical_node::LOGICAL_NODE_ZERO,
            Fc::St,
            "stVal",
            ValueKind::Int,
        )
    }

    /// GGIO1 上的告警 / 警告
    pub fn generic_io(attribute: DataAttribute) -> Self {
        Self::new(
            attribute,
            logical_node::GENERIC_IO,
            Fc::St,
            "stVal",
            ValueKind::Int,
        )
    }

    /// DSCHn 上的调度设定值（可写）
    pub fn schedule(attribute: DataAttribute, index: u8) -> Self {
        Self::new(
            attribute,
            logical_node::schedule(index),
            Fc::Sp,
            "setVal",
            ValueKind::Int,
        )
        .with_index(index)
        .writable()
    }

    /// XSWCn 的开关位置
    pub fn switch_position(index: u8) -> Self {
        Self::new(
            DataAttribute::Position,
            logical_node::switch_component(index),
            Fc::St,
            "stVal",
            ValueKind::Bool,
        )
        .with_index(index)
    }

    pub fn logical_node(&self) -> &str {
        &self.logical_node
    }

    pub fn fc(&self) -> Fc {
        self.fc
    }

    fn address(&self, logical_device: &LogicalDevice, instance: u8) -> ModelAddress {
        ModelAddress::new(
            logical_device.clone(),
            Some(instance),
            self.logical_node.clone(),
            self.attribute,
            self.fc,
        )
    }
}

#[async_trait]
impl Command for NodeValueCommand {
    fn data_attribute(&self) -> DataAttribute {
        self.attribute
    }

    fn index(&self) -> Option<u8> {
        self.index
    }

    async fn execute_read(
        &self,
        session: &DeviceSession,
        logical_device: &LogicalDevice,
        instance: u8,
    ) -> Result<Measurement, ProtocolError> {
        let node = session
            .read_node(&self.address(logical_device, instance))
            .await?;
        self.translate(&node)
    }

    async fn execute_write(
        &self,
        session: &DeviceSession,
        logical_device: &LogicalDevice,
        instance: u8,
        value: f64,
    ) -> Result<(), ProtocolError> {
        if !self.writable {
            return Err(ProtocolError::Configuration(format!(
                "data attribute {} is not writable",
                self.attribute
            )));
        }
        session
            .write_node(
                &self.address(logical_device, instance),
                self.value_path,
                self.kind.encode(value),
            )
            .await
    }

    fn translate(&self, node: &ModelNode) -> Result<Measurement, ProtocolError> {
        let value = node
            .get(self.value_path)
            .and_then(BasicValue::as_f64)
            .ok_or_else(|| {
                ProtocolError::Unexpected(format!(
                    "{} has no numeric {}",
                    node.reference, self.value_path
                ))
            })?;
        let qualifier = node
            .get(QUALITY)
            .and_then(BasicValue::as_i64)
            .unwrap_or_default() as i32;
        let time_ms = node
            .get(TIME)
            .and_then(BasicValue::as_timestamp)
            .unwrap_or_else(now_epoch_ms);
        Ok(Measurement {
            node: self.attribute.measurement_name().to_string(),
            index: self.index,
            qualifier,
            time_ms,
            value,
        })
    }
}
