//! 模拟 IED
//!
//! 持有一份共享模型，所有关联读写同一份状态。失败注入按 FIFO 消费：
//! 每次读 / 写先取出一个待注入错误，取空后恢复正常。

use async_trait::async_trait;
use iec61850_protocol::{
    Association, Fc, Iec61850Transport, ModelNode, Report, ReportControlBlock, ReportListener,
    ServerModel, TransportError,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const CONTROL_VALUE: &str = "Oper.ctlVal";
const STATUS_VALUE: &str = "stVal";

#[derive(Default)]
struct IedState {
    model: Mutex<ServerModel>,
    refuse_connections: AtomicBool,
    read_failures: Mutex<VecDeque<TransportError>>,
    write_failures: Mutex<VecDeque<TransportError>>,
    writes: Mutex<Vec<ModelNode>>,
    listener: Mutex<Option<Arc<dyn ReportListener>>>,
    associations: AtomicUsize,
    closes: AtomicUsize,
    reads: AtomicUsize,
    enabled_reports: Mutex<Vec<String>>,
    disabled_reports: Mutex<Vec<String>>,
}

/// 模拟 IED（克隆共享同一状态）
#[derive(Clone, Default)]
pub struct SimulatedIed {
    state: Arc<IedState>,
}

impl SimulatedIed {
    pub fn new(model: ServerModel) -> Self {
        let ied = Self::default();
        if let Ok(mut current) = ied.state.model.lock() {
            *current = model;
        }
        ied
    }

    /// 拒绝后续连接（IO 失败）
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.refuse_connections.store(refuse, Ordering::Release);
    }

    /// 接下来的 `count` 次读取返回 `error`
    pub fn fail_reads(&self, count: usize, error: TransportError) {
        if let Ok(mut failures) = self.state.read_failures.lock() {
            failures.extend(std::iter::repeat_n(error, count));
        }
    }

    /// 接下来的 `count` 次写入返回 `error`
    pub fn fail_writes(&self, count: usize, error: TransportError) {
        if let Ok(mut failures) = self.state.write_failures.lock() {
            failures.extend(std::iter::repeat_n(error, count));
        }
    }

    /// 修改模型中的节点（不存在时插入）
    pub fn set_node(&self, node: ModelNode) {
        if let Ok(mut model) = self.state.model.lock() {
            model.insert_node(node);
        }
    }

    pub fn node(&self, reference: &str, fc: Fc) -> Option<ModelNode> {
        self.state
            .model
            .lock()
            .ok()
            .and_then(|model| model.find_node(reference, fc).cloned())
    }

    pub fn rcb(&self, reference: &str) -> Option<ReportControlBlock> {
        self.state
            .model
            .lock()
            .ok()
            .and_then(|model| model.rcb(reference).cloned())
    }

    /// 设置报告控制块当前序号
    pub fn set_sq_num(&self, reference: &str, sq_num: u32) {
        if let Ok(mut model) = self.state.model.lock() {
            if let Some(rcb) = model.rcb_mut(reference) {
                rcb.sq_num = sq_num;
            }
        }
    }

    pub fn model(&self) -> ServerModel {
        self.state
            .model
            .lock()
            .map(|model| model.clone())
            .unwrap_or_default()
    }

    pub fn writes(&self) -> Vec<ModelNode> {
        self.state
            .writes
            .lock()
            .map(|writes| writes.clone())
            .unwrap_or_default()
    }

    pub fn read_count(&self) -> usize {
        self.state.reads.load(Ordering::Acquire)
    }

    pub fn association_count(&self) -> usize {
        self.state.associations.load(Ordering::Acquire)
    }

    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::Acquire)
    }

    pub fn enabled_reports(&self) -> Vec<String> {
        self.state
            .enabled_reports
            .lock()
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    pub fn disabled_reports(&self) -> Vec<String> {
        self.state
            .disabled_reports
            .lock()
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    /// 向最近一次关联的监听器推送报告；没有监听器时返回 false
    pub async fn push_report(&self, report: Report) -> bool {
        let listener = self
            .state
            .listener
            .lock()
            .ok()
            .and_then(|listener| listener.clone());
        match listener {
            Some(listener) => {
                listener.new_report(report).await;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl Iec61850Transport for SimulatedIed {
    async fn associate(
        &self,
        ip_address: &str,
        port: u16,
        listener: Arc<dyn ReportListener>,
    ) -> Result<Box<dyn Association>, TransportError> {
        if self.state.refuse_connections.load(Ordering::Acquire) {
            return Err(TransportError::Io(format!(
                "connection refused by {}:{}",
                ip_address, port
            )));
        }
        if let Ok(mut current) = self.state.listener.lock() {
            *current = Some(listener);
        }
        self.state.associations.fetch_add(1, Ordering::AcqRel);
        info!(
            target: "iec61850.simulator",
            ip_address = %ip_address,
            port = port,
            "simulator_associated"
        );
        Ok(Box::new(SimulatedAssociation {
            state: self.state.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct SimulatedAssociation {
    state: Arc<IedState>,
    closed: AtomicBool,
}

impl SimulatedAssociation {
    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            Err(TransportError::Io("association closed".to_string()))
        } else {
            Ok(())
        }
    }

    fn injected(failures: &Mutex<VecDeque<TransportError>>) -> Result<(), TransportError> {
        let next = failures.lock().ok().and_then(|mut items| items.pop_front());
        match next {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn model(&self) -> Result<std::sync::MutexGuard<'_, ServerModel>, TransportError> {
        self.state
            .model
            .lock()
            .map_err(|_| TransportError::Io("simulator state poisoned".to_string()))
    }
}

#[async_trait]
impl Association for SimulatedAssociation {
    async fn retrieve_model(&self) -> Result<ServerModel, TransportError> {
        self.ensure_open()?;
        Ok(self.model()?.clone())
    }

    async fn read(&self, reference: &str, fc: Fc) -> Result<ModelNode, TransportError> {
        self.ensure_open()?;
        self.state.reads.fetch_add(1, Ordering::AcqRel);
        Self::injected(&self.state.read_failures)?;
        self.model()?
            .find_node(reference, fc)
            .cloned()
            .ok_or_else(|| TransportError::Service(format!("object {} [{}] not found", reference, fc)))
    }

    async fn write(&self, node: &ModelNode) -> Result<(), TransportError> {
        self.ensure_open()?;
        Self::injected(&self.state.write_failures)?;
        {
            let mut model = self.model()?;
            let target = model.find_node_mut(&node.reference, node.fc).ok_or_else(|| {
                TransportError::Service(format!(
                    "object {} [{}] not found",
                    node.reference, node.fc
                ))
            })?;
            for (attribute, value) in &node.attributes {
                target.set(attribute.clone(), value.clone());
            }
            // 控制命令生效后反映到状态值
            if node.fc == Fc::Co {
                if let Some(value) = node.get(CONTROL_VALUE).cloned() {
                    if let Some(status) = model.find_node_mut(&node.reference, Fc::St) {
                        status.set(STATUS_VALUE, value);
                    }
                }
            }
        }
        if let Ok(mut writes) = self.state.writes.lock() {
            writes.push(node.clone());
        }
        debug!(target: "iec61850.simulator", reference = %node.reference, fc = %node.fc, "simulator_write");
        Ok(())
    }

    async fn enable_reporting(
        &self,
        rcb_reference: &str,
    ) -> Result<ReportControlBlock, TransportError> {
        self.ensure_open()?;
        let rcb = {
            let mut model = self.model()?;
            let rcb = model.rcb_mut(rcb_reference).ok_or_else(|| {
                TransportError::Service(format!("report control block {} not found", rcb_reference))
            })?;
            rcb.enabled = true;
            rcb.clone()
        };
        if let Ok(mut enabled) = self.state.enabled_reports.lock() {
            enabled.push(rcb_reference.to_string());
        }
        Ok(rcb)
    }

    async fn disable_reporting(&self, rcb_reference: &str) -> Result<(), TransportError> {
        self.ensure_open()?;
        {
            let mut model = self.model()?;
            let rcb = model.rcb_mut(rcb_reference).ok_or_else(|| {
                TransportError::Service(format!("report control block {} not found", rcb_reference))
            })?;
            rcb.enabled = false;
        }
        if let Ok(mut disabled) = self.state.disabled_reports.lock() {
            disabled.push(rcb_reference.to_string());
        }
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.state.closes.fetch_add(1, Ordering::AcqRel);
        }
    }
}
