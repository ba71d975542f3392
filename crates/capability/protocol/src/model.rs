//! 设备数据模型快照
//!
//! 节点按 (对象引用, 功能约束) 定位，节点下的数据属性以扁平路径存放，
//! 例如 `Oper.ctlVal`、`mag.f`、`stVal`。
//!
//! ## 模板格式
//!
//! ```json
//! {
//!   "nodes": [
//!     { "reference": "SWDeviceGenericIO/XSWC1.Pos", "fc": "ST",
//!       "attributes": { "stVal": { "type": "bool", "value": true } } }
//!   ],
//!   "brcbs": [ { "reference": "SWDeviceGenericIO/LLN0.evn_rpn01", "buffered": true } ],
//!   "urcbs": []
//! }
//! ```

use crate::address::Fc;
use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// 基础数据值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum BasicValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Unix 毫秒
    Timestamp(i64),
}

impl BasicValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Int(value) => Some(*value != 0),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Bool(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            Self::Bool(value) => Some(if *value { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            Self::Timestamp(value) => Some(*value),
            _ => None,
        }
    }
}

/// 带功能约束的模型节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelNode {
    pub reference: String,
    pub fc: Fc,
    #[serde(default)]
    pub attributes: BTreeMap<String, BasicValue>,
}

impl ModelNode {
    pub fn new(reference: impl Into<String>, fc: Fc) -> Self {
        Self {
            reference: reference.into(),
            fc,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with(mut self, attribute: impl Into<String>, value: BasicValue) -> Self {
        self.attributes.insert(attribute.into(), value);
        self
    }

    pub fn get(&self, attribute: &str) -> Option<&BasicValue> {
        self.attributes.get(attribute)
    }

    pub fn set(&mut self, attribute: impl Into<String>, value: BasicValue) {
        self.attributes.insert(attribute.into(), value);
    }

    /// 节点名（引用最后一段），例如 `XSWC1.Pos` → `Pos`。
    pub fn name(&self) -> &str {
        self.reference
            .rsplit(['.', '/'])
            .next()
            .unwrap_or(self.reference.as_str())
    }
}

/// 报告控制块
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportControlBlock {
    pub reference: String,
    pub buffered: bool,
    #[serde(default)]
    pub enabled: bool,
    /// 当前序号
    #[serde(default)]
    pub sq_num: u32,
}

impl ReportControlBlock {
    pub fn new(reference: impl Into<String>, buffered: bool) -> Self {
        Self {
            reference: reference.into(),
            buffered,
            enabled: false,
            sq_num: 0,
        }
    }
}

/// 服务端模型快照
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerModel {
    #[serde(default)]
    nodes: Vec<ModelNode>,
    #[serde(default)]
    brcbs: Vec<ReportControlBlock>,
    #[serde(default)]
    urcbs: Vec<ReportControlBlock>,
}

impl ServerModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 JSON 模板解析
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(json).map_err(|e| ProtocolError::Configuration(e.to_string()))
    }

    /// 从模板文件加载
    pub fn load_template(path: impl AsRef<Path>) -> Result<Self, ProtocolError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ProtocolError::Configuration(format!("model template {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn find_node(&self, reference: &str, fc: Fc) -> Option<&ModelNode> {
        self.nodes
            .iter()
            .find(|node| node.fc == fc && node.reference == reference)
    }

    pub fn find_node_mut(&mut self, reference: &str, fc: Fc) -> Option<&mut ModelNode> {
        self.nodes
            .iter_mut()
            .find(|node| node.fc == fc && node.reference == reference)
    }

    /// 插入节点（同引用同约束时覆盖）
    pub fn insert_node(&mut self, node: ModelNode) {
        match self.find_node_mut(&node.reference, node.fc) {
            Some(existing) => *existing = node,
            None => self.nodes.push(node),
        }
    }

    pub fn nodes(&self) -> &[ModelNode] {
        &self.nodes
    }

    pub fn add_rcb(&mut self, rcb: ReportControlBlock) {
        if rcb.buffered {
            self.brcbs.push(rcb);
        } else {
            self.urcbs.push(rcb);
        }
    }

    pub fn brcb(&self, reference: &str) -> Option<&ReportControlBlock> {
        self.brcbs.iter().find(|rcb| rcb.reference == reference)
    }

    pub fn urcb(&self, reference: &str) -> Option<&ReportControlBlock> {
        self.urcbs.iter().find(|rcb| rcb.reference == reference)
    }

    /// 先查缓存报告，再查非缓存报告
    pub fn rcb(&self, reference: &str) -> Option<&ReportControlBlock> {
        self.brcb(reference).or_else(|| self.urcb(reference))
    }

    pub fn rcb_mut(&mut self, reference: &str) -> Option<&mut ReportControlBlock> {
        self.brcbs
            .iter_mut()
            .chain(self.urcbs.iter_mut())
            .find(|rcb| rcb.reference == reference)
    }

    pub fn brcbs(&self) -> &[ReportControlBlock] {
        &self.brcbs
    }

    pub fn urcbs(&self) -> &[ReportControlBlock] {
        &self.urcbs
    }
}
