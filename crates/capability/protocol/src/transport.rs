//! 传输抽象
//!
//! MMS/ACSI 编解码由底层协议栈负责，这里只约定会话层依赖的原语：
//! 建立关联、读取模型、读写节点、使能/关闭报告、断开。

use crate::address::Fc;
use crate::error::TransportError;
use crate::model::{ModelNode, ReportControlBlock, ServerModel};
use async_trait::async_trait;
use std::sync::Arc;

/// 报告数据集
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    pub reference: String,
    pub members: Vec<ModelNode>,
}

/// 设备主动上报的报告
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub rpt_id: String,
    pub rcb_reference: String,
    pub sq_num: Option<u32>,
    pub sub_sq_num: Option<u32>,
    pub more_segments_follow: bool,
    /// 设备缓冲区溢出，溢出前的条目可能已丢失
    pub buffer_overflow: bool,
    /// 设备时钟下的条目时间（1984-01-01 起的毫秒）
    pub time_of_entry: Option<i64>,
    pub data_set: Option<DataSet>,
}

impl Report {
    pub fn new(rpt_id: impl Into<String>, rcb_reference: impl Into<String>) -> Self {
        Self {
            rpt_id: rpt_id.into(),
            rcb_reference: rcb_reference.into(),
            sq_num: None,
            sub_sq_num: None,
            more_segments_follow: false,
            buffer_overflow: false,
            time_of_entry: None,
            data_set: None,
        }
    }
}

/// 报告监听器
///
/// 报告由传输层任务回调，与请求处理任务并发访问监听器状态。
#[async_trait]
pub trait ReportListener: Send + Sync {
    async fn new_report(&self, report: Report);

    /// 关联关闭（正常断开时 reason 为 None）
    async fn association_closed(&self, reason: Option<String>);
}

/// 不处理报告的监听器
#[derive(Debug, Default)]
pub struct NoopReportListener;

#[async_trait]
impl ReportListener for NoopReportListener {
    async fn new_report(&self, _report: Report) {}

    async fn association_closed(&self, _reason: Option<String>) {}
}

/// 传输层：建立到 IED 的关联
#[async_trait]
pub trait Iec61850Transport: Send + Sync {
    async fn associate(
        &self,
        ip_address: &str,
        port: u16,
        listener: Arc<dyn ReportListener>,
    ) -> Result<Box<dyn Association>, TransportError>;
}

/// 已建立的关联
#[async_trait]
pub trait Association: Send + Sync {
    async fn retrieve_model(&self) -> Result<ServerModel, TransportError>;

    /// 读取节点下全部数据属性
    async fn read(&self, reference: &str, fc: Fc) -> Result<ModelNode, TransportError>;

    async fn write(&self, node: &ModelNode) -> Result<(), TransportError>;

    /// 使能报告，返回使能后的控制块（含当前序号）
    async fn enable_reporting(
        &self,
        rcb_reference: &str,
    ) -> Result<ReportControlBlock, TransportError>;

    async fn disable_reporting(&self, rcb_reference: &str) -> Result<(), TransportError>;

    async fn close(&self);
}
